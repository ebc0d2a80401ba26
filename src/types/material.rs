/// Raw texture image data.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// PBR metallic-roughness material.
#[derive(Debug, Clone)]
pub struct PBRMaterial {
    pub name: String,
    /// Base color factor [r, g, b, a].
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Index into `MaterialLibrary::textures`.
    pub base_color_texture: Option<usize>,
}

impl Default for PBRMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            base_color_texture: None,
        }
    }
}

/// Collection of materials and their associated textures.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    pub materials: Vec<PBRMaterial>,
    pub textures: Vec<TextureData>,
}
