/// The fundamental geometry container.
///
/// All buffers are contiguous `Vec<f32>` / `Vec<u32>` for zero-copy interop
/// with meshoptimizer and glTF writers.
#[derive(Debug, Clone, Default)]
pub struct IndexedMesh {
    /// Interleaved positions: [x, y, z, x, y, z, ...]
    pub positions: Vec<f32>,
    /// Interleaved normals: [nx, ny, nz, ...] or empty
    pub normals: Vec<f32>,
    /// Interleaved UVs: [u, v, u, v, ...] or empty
    pub uvs: Vec<f32>,
    /// Interleaved vertex colors: [r, g, b, a, ...] or empty
    pub colors: Vec<f32>,
    /// Triangle indices into the vertex buffers
    pub indices: Vec<u32>,
    /// Index into the associated `MaterialLibrary`
    pub material_index: Option<usize>,
}

impl IndexedMesh {
    /// Number of vertices (positions / 3).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles (indices / 3).
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether normals are present.
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Whether UV coordinates are present.
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Whether vertex colors are present.
    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// Whether the mesh contains no geometry.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
