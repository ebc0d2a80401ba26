pub mod material;
pub mod mesh;
pub mod tile;

pub use material::{MaterialLibrary, PBRMaterial, TextureData};
pub use mesh::IndexedMesh;
pub use tile::{BoundingBox, TileContent, TileNode};
