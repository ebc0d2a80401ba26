use rayon::prelude::*;

use crate::types::{BoundingBox, IndexedMesh};

/// A node in the octree spatial hierarchy.
#[derive(Debug, Clone)]
pub struct OctreeNode {
    pub bounds: BoundingBox,
    pub mesh: IndexedMesh,
    pub children: [Option<Box<OctreeNode>>; 8],
}

impl OctreeNode {
    /// Whether this node is a leaf (no children).
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }

    /// Count total nodes in the subtree (including self).
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .filter_map(|c| c.as_ref())
            .map(|c| c.node_count())
            .sum::<usize>()
    }

    /// Count total triangles in the subtree.
    pub fn total_triangles(&self) -> usize {
        self.mesh.triangle_count()
            + self
                .children
                .iter()
                .filter_map(|c| c.as_ref())
                .map(|c| c.total_triangles())
                .sum::<usize>()
    }
}

/// Compute the octant index (0..7) for a point relative to the center of a bounding box.
///
/// Octant layout (bit pattern: z_hi | y_hi | x_hi):
///   0 = (lo, lo, lo), 1 = (hi, lo, lo), 2 = (lo, hi, lo), 3 = (hi, hi, lo)
///   4 = (lo, lo, hi), 5 = (hi, lo, hi), 6 = (lo, hi, hi), 7 = (hi, hi, hi)
pub(crate) fn octant_index(center: [f64; 3], point: [f64; 3]) -> usize {
    let mut idx = 0;
    if point[0] >= center[0] {
        idx |= 1;
    }
    if point[1] >= center[1] {
        idx |= 2;
    }
    if point[2] >= center[2] {
        idx |= 4;
    }
    idx
}

/// Compute the child bounding box for a given octant index.
pub(crate) fn child_bounds(parent: &BoundingBox, octant: usize) -> BoundingBox {
    let c = parent.center();
    let min_x = if octant & 1 != 0 { c[0] } else { parent.min[0] };
    let max_x = if octant & 1 != 0 { parent.max[0] } else { c[0] };
    let min_y = if octant & 2 != 0 { c[1] } else { parent.min[1] };
    let max_y = if octant & 2 != 0 { parent.max[1] } else { c[1] };
    let min_z = if octant & 4 != 0 { c[2] } else { parent.min[2] };
    let max_z = if octant & 4 != 0 { parent.max[2] } else { c[2] };

    BoundingBox {
        min: [min_x, min_y, min_z],
        max: [max_x, max_y, max_z],
    }
}

/// Split a mesh into 8 octant sub-meshes using Sutherland-Hodgman clipping.
///
/// Triangles straddling octant boundaries are clipped at the boundary planes
/// and the resulting sub-polygons are fan-triangulated into the appropriate
/// octant. Interior triangles (all vertices in one octant) take a fast path.
pub fn split_mesh(mesh: &IndexedMesh, bounds: &BoundingBox) -> [IndexedMesh; 8] {
    crate::tiling::triangle_clipper::split_mesh_clipping(mesh, bounds)
}

/// Recursively build an octree from a mesh.
///
/// Takes ownership of the mesh to avoid unnecessary clones of large buffers.
/// Subdivides if `triangle_count > max_triangles` AND `depth < max_depth`.
/// Otherwise the node becomes a leaf containing its mesh.
pub fn build_octree(
    mesh: IndexedMesh,
    bounds: &BoundingBox,
    max_depth: u32,
    max_triangles: usize,
) -> OctreeNode {
    build_octree_recursive(mesh, bounds, 0, max_depth, max_triangles)
}

fn build_octree_recursive(
    mesh: IndexedMesh,
    bounds: &BoundingBox,
    depth: u32,
    max_depth: u32,
    max_triangles: usize,
) -> OctreeNode {
    // Leaf condition: few enough triangles or at max depth
    if mesh.triangle_count() <= max_triangles || depth >= max_depth {
        return OctreeNode {
            bounds: *bounds,
            mesh, // move, no clone
            children: Default::default(),
        };
    }

    let sub_meshes = split_mesh(&mesh, bounds);
    drop(mesh); // free parent mesh before recursing into children

    // Convert [IndexedMesh; 8] to Vec of (index, mesh) pairs for parallel processing
    let bounds_copy = *bounds;
    let child_vec: Vec<Option<Box<OctreeNode>>> = sub_meshes
        .into_iter()
        .enumerate()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(i, sub)| {
            if sub.is_empty() {
                None
            } else {
                let cb = child_bounds(&bounds_copy, i);
                Some(Box::new(build_octree_recursive(
                    sub,
                    &cb,
                    depth + 1,
                    max_depth,
                    max_triangles,
                )))
            }
        })
        .collect();

    let children: [Option<Box<OctreeNode>>; 8] = child_vec
        .try_into()
        .expect("parallel octree should produce exactly 8 children");

    OctreeNode {
        bounds: *bounds,
        mesh: IndexedMesh::default(), // internal nodes have no mesh
        children,
    }
}
