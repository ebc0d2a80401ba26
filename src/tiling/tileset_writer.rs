use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde_json::json;
use tracing::info;

use crate::config::{TextureConfig, TilingConfig};
use crate::error::{PhotoTilerError, Result};
use crate::tiling::atlas_repacker;
use crate::tiling::glb_writer::write_glb_compressed;
use crate::tiling::lod::LodChain;
use crate::tiling::octree::{child_bounds, split_mesh};
use crate::tiling::simplifier::simplify_mesh;
use crate::types::{BoundingBox, IndexedMesh, MaterialLibrary, TileContent, TileNode};

/// Intermediate output of tile hierarchy construction.
pub struct TilesetOutput {
    pub root: TileNode,
    pub root_transform: [f64; 16],
}

/// Convert a tile address to a hierarchical URI path.
///
/// - `"root"` → `"tiles/root.glb"`
/// - `"0"` → `"tiles/0/tile.glb"`
/// - `"0_3"` → `"tiles/0/0_3/tile.glb"`
/// - `"0_3_1"` → `"tiles/0/0_3/0_3_1/tile.glb"`
fn address_to_uri(address: &str) -> String {
    if address == "root" {
        return "tiles/root.glb".into();
    }

    // Build hierarchical path from address segments
    // Address "0_3_1" → path components: ["0", "0_3", "0_3_1"]
    let parts: Vec<&str> = address.split('_').collect();
    let mut path_segments = Vec::with_capacity(parts.len());
    let mut accum = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            accum.push_str(part);
        } else {
            accum.push('_');
            accum.push_str(part);
        }
        path_segments.push(accum.clone());
    }

    let dir_path = path_segments.join("/");
    format!("tiles/{dir_path}/tile.glb")
}

/// Write a tile's GLB using atlas repacking when textures are enabled,
/// then eagerly flush to disk and free the data.
///
/// Applies vertex cache optimization before writing to improve GPU
/// rendering performance and meshopt compression ratios.
fn write_tile_glb_to_disk(
    mesh: &IndexedMesh,
    materials: &MaterialLibrary,
    texture_config: &TextureConfig,
    out_dir: &Path,
    address: &str,
) -> TileContent {
    // Vertex cache optimization: improves GPU rendering perf and compression ratios
    let mesh = if !mesh.is_empty() {
        let optimized_indices = meshopt::optimize_vertex_cache(&mesh.indices, mesh.vertex_count());
        &IndexedMesh {
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            uvs: mesh.uvs.clone(),
            colors: mesh.colors.clone(),
            indices: optimized_indices,
            material_index: mesh.material_index,
        }
    } else {
        mesh
    };

    let glb_data = if texture_config.enabled && mesh.has_uvs() {
        if let Some(result) = atlas_repacker::repack_atlas(mesh, materials, texture_config) {
            write_glb_compressed(&result.mesh, materials, Some(&result.atlas_texture))
        } else {
            write_glb_compressed(mesh, materials, None)
        }
    } else {
        write_glb_compressed(mesh, materials, None)
    };

    let uri = address_to_uri(address);
    let glb_path = out_dir.join(&uri);

    // Write to disk immediately
    if let Some(parent) = glb_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(e) = fs::write(&glb_path, &glb_data) {
        tracing::error!("Failed to write {}: {e}", glb_path.display());
    }

    // Return content with empty data (already on disk)
    TileContent {
        glb_data: vec![],
        uri,
    }
}

/// Build a tile hierarchy from LOD chains, writing GLBs eagerly to disk.
///
/// Merges all LOD-0 meshes into a single mesh, then builds a unified
/// spatial-LOD hierarchy where every internal node has content (a simplified
/// mesh of its spatial region) and children are spatial subdivisions.
pub fn build_tileset(
    lod_chains: Vec<LodChain>,
    bounds: &BoundingBox,
    config: &TilingConfig,
    materials: &MaterialLibrary,
    texture_config: &TextureConfig,
    out_dir: &Path,
) -> TilesetOutput {
    // Merge all LOD-0 (finest) meshes into a single mesh
    let mut merged = IndexedMesh::default();
    for chain in &lod_chains {
        if let Some(level) = chain.levels.iter().find(|l| l.level == 0) {
            merged = merge_meshes(merged, &level.mesh);
        }
    }

    drop(lod_chains);

    let identity = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    let root = build_tile_recursive(
        merged,
        bounds,
        0,
        config.max_depth,
        config.max_triangles_per_tile,
        "root",
        materials,
        texture_config,
        out_dir,
    );

    TilesetOutput {
        root,
        root_transform: identity,
    }
}

/// Recursively build a unified spatial-LOD tile hierarchy.
///
/// Each node gets a simplified version of its mesh as display content, while
/// the original (unsimplified) mesh is spatially subdivided into octant children.
/// This ensures every internal node has renderable content and the tree combines
/// both spatial subdivision and LOD at every level.
///
/// Leaf condition: `triangle_count <= max_tris` OR `depth >= max_depth`.
fn build_tile_recursive(
    mesh: IndexedMesh,
    bounds: &BoundingBox,
    depth: u32,
    max_depth: u32,
    max_tris: usize,
    address: &str,
    materials: &MaterialLibrary,
    texture_config: &TextureConfig,
    out_dir: &Path,
) -> TileNode {
    let is_leaf = mesh.triangle_count() <= max_tris || depth >= max_depth;

    let geometric_error = if is_leaf {
        0.0
    } else {
        bounds.diagonal() * 0.5_f64.powi(depth as i32)
    };

    if is_leaf {
        // Leaf: write the full-detail mesh as content, no children
        let content = if !mesh.is_empty() {
            Some(write_tile_glb_to_disk(
                &mesh, materials, texture_config, out_dir, address,
            ))
        } else {
            None
        };

        return TileNode {
            address: address.into(),
            level: depth,
            bounds: *bounds,
            geometric_error,
            content,
            children: vec![],
        };
    }

    // Internal node: simplify the mesh for this node's display content,
    // then spatially split the ORIGINAL mesh for children.
    // Deeper levels use relaxed simplification (less aggressive, faster).
    let content_mesh = if mesh.triangle_count() < 64 {
        // Too few triangles to simplify meaningfully -- use as-is
        mesh.clone()
    } else {
        let (ratio, lock_border) = if depth >= 3 {
            (0.5, false) // Faster, less aggressive for deep/coarse nodes
        } else {
            (0.25, true) // More aggressive for top-level nodes
        };
        simplify_mesh(&mesh, ratio, lock_border).mesh
    };

    let content = if !content_mesh.is_empty() {
        Some(write_tile_glb_to_disk(
            &content_mesh, materials, texture_config, out_dir, address,
        ))
    } else {
        None
    };
    drop(content_mesh);

    // Split the ORIGINAL mesh spatially into 8 octants
    let sub_meshes = split_mesh(&mesh, bounds);
    drop(mesh);

    // Recurse into non-empty octants in parallel
    let child_tasks: Vec<_> = sub_meshes
        .into_iter()
        .enumerate()
        .filter_map(|(i, sub)| {
            if sub.is_empty() {
                return None;
            }
            let child_addr = if address == "root" {
                format!("{i}")
            } else {
                format!("{address}_{i}")
            };
            let cb = child_bounds(bounds, i);
            Some((child_addr, sub, cb))
        })
        .collect();

    let children: Vec<TileNode> = child_tasks
        .into_par_iter()
        .map(|(child_addr, sub, cb)| {
            build_tile_recursive(
                sub,
                &cb,
                depth + 1,
                max_depth,
                max_tris,
                &child_addr,
                materials,
                texture_config,
                out_dir,
            )
        })
        .collect();

    TileNode {
        address: address.into(),
        level: depth,
        bounds: *bounds,
        geometric_error,
        content,
        children,
    }
}

/// Write the tileset.json to disk.
///
/// GLB files have already been written eagerly during `build_tileset`.
/// Returns the total number of tiles (content nodes).
pub fn write_tileset(
    output: &TilesetOutput,
    transform: &[f64; 16],
    out_dir: &Path,
) -> Result<usize> {
    let tile_count = count_content_nodes(&output.root);

    // Build tileset.json
    let tileset_json = build_tileset_json(&output.root, transform);

    let tileset_path = out_dir.join("tileset.json");
    let json_string = serde_json::to_string_pretty(&tileset_json)
        .map_err(|e| PhotoTilerError::Output(format!("Failed to serialize tileset.json: {e}")))?;

    fs::write(&tileset_path, &json_string)
        .map_err(|e| PhotoTilerError::Output(format!("Failed to write tileset.json: {e}")))?;

    info!(
        tiles = tile_count,
        path = %tileset_path.display(),
        "Wrote tileset.json"
    );

    Ok(tile_count)
}

/// Count nodes that have content (i.e., GLB tiles).
fn count_content_nodes(node: &TileNode) -> usize {
    let self_count = if node.content.is_some() { 1 } else { 0 };
    self_count + node.children.iter().map(count_content_nodes).sum::<usize>()
}

/// Build the tileset.json as a serde_json::Value.
fn build_tileset_json(root: &TileNode, transform: &[f64; 16]) -> serde_json::Value {
    let root_tile = tile_node_to_json(root, Some(transform));

    json!({
        "asset": {
            "version": "1.1",
            "generator": "photo-tiler"
        },
        "geometricError": root.geometric_error,
        "root": root_tile
    })
}

/// Convert a TileNode to its tileset.json representation.
fn tile_node_to_json(node: &TileNode, transform: Option<&[f64; 16]>) -> serde_json::Value {
    let bv = bounding_volume_box(&node.bounds);

    let mut tile = json!({
        "boundingVolume": {
            "box": bv
        },
        "geometricError": node.geometric_error,
        "refine": "REPLACE"
    });

    if let Some(t) = transform {
        tile["transform"] = json!(t);
    }

    if let Some(content) = &node.content {
        tile["content"] = json!({
            "uri": content.uri
        });
    }

    if !node.children.is_empty() {
        let children: Vec<serde_json::Value> = node
            .children
            .iter()
            .map(|c| tile_node_to_json(c, None))
            .collect();
        tile["children"] = json!(children);
    }

    tile
}

/// Convert a BoundingBox to the 12-float `boundingVolume.box` format.
///
/// Format: `[cx, cy, cz, hx, 0, 0, 0, hy, 0, 0, 0, hz]`
/// (center + axis-aligned half-extents as 3 column vectors)
fn bounding_volume_box(bounds: &BoundingBox) -> [f64; 12] {
    let c = bounds.center();
    let he = bounds.half_extents();
    [
        c[0], c[1], c[2], // center
        he[0], 0.0, 0.0, // x half-axis
        0.0, he[1], 0.0, // y half-axis
        0.0, 0.0, he[2], // z half-axis
    ]
}

/// Merge two IndexedMeshes by extending `a` with `b`'s data and offsetting indices.
/// Takes ownership of `a` to avoid cloning it.
fn merge_meshes(mut a: IndexedMesh, b: &IndexedMesh) -> IndexedMesh {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a;
    }

    let a_vertex_count = a.vertex_count() as u32;

    a.positions.extend_from_slice(&b.positions);

    if a.has_normals() && b.has_normals() {
        a.normals.extend_from_slice(&b.normals);
    } else {
        a.normals.clear();
    }

    if a.has_uvs() && b.has_uvs() {
        a.uvs.extend_from_slice(&b.uvs);
    } else {
        a.uvs.clear();
    }

    if a.has_colors() && b.has_colors() {
        a.colors.extend_from_slice(&b.colors);
    } else {
        a.colors.clear();
    }

    a.indices.extend(b.indices.iter().map(|&i| i + a_vertex_count));

    if a.material_index.is_none() {
        a.material_index = b.material_index;
    }

    a
}
