use std::path::Path;

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{PhotoTilerError, Result};
use crate::types::{IndexedMesh, MaterialLibrary, PBRMaterial, TextureData};

/// Load an OBJ file (+ associated MTL and textures) into our internal types.
pub fn load_obj(path: &Path, config: &PipelineConfig) -> Result<(Vec<IndexedMesh>, MaterialLibrary)> {
    let (models, materials_result) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
        .map_err(|e| PhotoTilerError::Input(format!("Failed to load OBJ: {e}")))?;

    debug!(model_count = models.len(), "Loaded OBJ models");

    let obj_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let tobj_materials = match materials_result {
        Ok(mats) => mats,
        Err(e) => {
            warn!("Failed to load MTL: {e}");
            Vec::new()
        }
    };

    let material_lib = convert_materials(&tobj_materials, obj_dir, config)?;

    let meshes: Vec<IndexedMesh> = models
        .into_iter()
        .map(|model| convert_mesh(model.mesh))
        .collect();

    Ok((meshes, material_lib))
}

/// Convert a `tobj::Mesh` into our `IndexedMesh`.
fn convert_mesh(mesh: tobj::Mesh) -> IndexedMesh {
    let positions = mesh.positions;
    let normals = mesh.normals;

    // UV V-flip: OBJ uses bottom-left origin, glTF uses top-left
    let uvs: Vec<f32> = mesh
        .texcoords
        .chunks_exact(2)
        .flat_map(|uv| [uv[0], 1.0 - uv[1]])
        .collect();

    // Vertex colors: expand RGB (3 components) to RGBA (4 components, alpha=1.0)
    let colors: Vec<f32> = mesh
        .vertex_color
        .chunks_exact(3)
        .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 1.0])
        .collect();

    let material_index = mesh.material_id;

    IndexedMesh {
        positions,
        normals,
        uvs,
        colors,
        indices: mesh.indices,
        material_index,
    }
}

/// Convert tobj materials into our `MaterialLibrary`.
fn convert_materials(
    tobj_mats: &[tobj::Material],
    obj_dir: &Path,
    config: &PipelineConfig,
) -> Result<MaterialLibrary> {
    let mut lib = MaterialLibrary::default();

    for mat in tobj_mats {
        let mut pbr = PBRMaterial {
            name: mat.name.clone(),
            metallic: 0.0,
            roughness: 1.0,
            ..Default::default()
        };

        // Kd -> base_color
        if let Some(diffuse) = mat.diffuse {
            pbr.base_color = [
                diffuse[0],
                diffuse[1],
                diffuse[2],
                mat.dissolve.unwrap_or(1.0),
            ];
        }

        // Load diffuse texture (map_Kd)
        if config.texture.enabled {
            if let Some(ref tex_name) = mat.diffuse_texture {
                let tex_path = obj_dir.join(tex_name);
                match load_texture(&tex_path) {
                    Ok(tex) => {
                        let tex_idx = lib.textures.len();
                        lib.textures.push(tex);
                        pbr.base_color_texture = Some(tex_idx);
                    }
                    Err(e) => {
                        warn!(texture = %tex_name, "Failed to load texture: {e}");
                    }
                }
            }
        }

        lib.materials.push(pbr);
    }

    Ok(lib)
}

/// Load a texture file: read raw bytes and decode for width/height.
fn load_texture(path: &Path) -> Result<TextureData> {
    let data = std::fs::read(path).map_err(|e| {
        PhotoTilerError::Input(format!("Failed to read texture {}: {e}", path.display()))
    })?;

    let img = image::load_from_memory(&data).map_err(|e| {
        PhotoTilerError::Input(format!(
            "Failed to decode texture {}: {e}",
            path.display()
        ))
    })?;

    let mime_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };

    debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "Loaded texture"
    );

    Ok(TextureData {
        data,
        mime_type: mime_type.to_string(),
        width: img.width(),
        height: img.height(),
    })
}
