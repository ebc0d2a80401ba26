use std::collections::HashMap;

use crate::tiling::octree::{child_bounds, octant_index};
use crate::types::{BoundingBox, IndexedMesh};

/// Working vertex for clipping (f64 precision for math, cast to f32 at output).
#[derive(Debug, Clone)]
struct ClipVertex {
    pos: [f64; 3],
    normal: [f64; 3],
    uv: [f64; 2],
    color: [f64; 4],
}

/// Axis-aligned clipping half-plane.
struct ClipPlane {
    axis: usize,  // 0=X, 1=Y, 2=Z
    value: f64,
    positive: bool, // true = keep where pos[axis] >= value
}

/// Quantized position key for deduplication at boundaries (1µm precision).
#[derive(Hash, Eq, PartialEq)]
struct PositionKey([i64; 3]);

impl PositionKey {
    fn from_pos(pos: [f64; 3]) -> Self {
        Self([
            (pos[0] * 1e6).round() as i64,
            (pos[1] * 1e6).round() as i64,
            (pos[2] * 1e6).round() as i64,
        ])
    }
}

/// Extract a ClipVertex from an IndexedMesh at a given vertex index, promoting f32 → f64.
fn extract_clip_vertex(mesh: &IndexedMesh, vertex_index: usize) -> ClipVertex {
    let pos = [
        mesh.positions[vertex_index * 3] as f64,
        mesh.positions[vertex_index * 3 + 1] as f64,
        mesh.positions[vertex_index * 3 + 2] as f64,
    ];

    let normal = if mesh.has_normals() {
        [
            mesh.normals[vertex_index * 3] as f64,
            mesh.normals[vertex_index * 3 + 1] as f64,
            mesh.normals[vertex_index * 3 + 2] as f64,
        ]
    } else {
        [0.0; 3]
    };

    let uv = if mesh.has_uvs() {
        [
            mesh.uvs[vertex_index * 2] as f64,
            mesh.uvs[vertex_index * 2 + 1] as f64,
        ]
    } else {
        [0.0; 2]
    };

    let color = if mesh.has_colors() {
        [
            mesh.colors[vertex_index * 4] as f64,
            mesh.colors[vertex_index * 4 + 1] as f64,
            mesh.colors[vertex_index * 4 + 2] as f64,
            mesh.colors[vertex_index * 4 + 3] as f64,
        ]
    } else {
        [0.0; 4]
    };

    ClipVertex { pos, normal, uv, color }
}

/// Compute parametric intersection of edge (a→b) with a clipping plane, lerp ALL attributes.
fn intersect_edge(a: &ClipVertex, b: &ClipVertex, plane: &ClipPlane) -> ClipVertex {
    let da = a.pos[plane.axis] - plane.value;
    let db = b.pos[plane.axis] - plane.value;
    let denom = da - db;
    let t = if denom.abs() < 1e-15 { 0.5 } else { da / denom };

    let lerp = |a_val: f64, b_val: f64| a_val + t * (b_val - a_val);

    let pos = [
        lerp(a.pos[0], b.pos[0]),
        lerp(a.pos[1], b.pos[1]),
        lerp(a.pos[2], b.pos[2]),
    ];

    let normal = {
        let n = [
            lerp(a.normal[0], b.normal[0]),
            lerp(a.normal[1], b.normal[1]),
            lerp(a.normal[2], b.normal[2]),
        ];
        // Renormalize if non-zero
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 1e-12 {
            [n[0] / len, n[1] / len, n[2] / len]
        } else {
            n
        }
    };

    let uv = [
        lerp(a.uv[0], b.uv[0]),
        lerp(a.uv[1], b.uv[1]),
    ];

    let color = [
        lerp(a.color[0], b.color[0]),
        lerp(a.color[1], b.color[1]),
        lerp(a.color[2], b.color[2]),
        lerp(a.color[3], b.color[3]),
    ];

    ClipVertex { pos, normal, uv, color }
}

/// Sutherland-Hodgman: clip a polygon by a single half-plane.
fn clip_polygon_by_plane(polygon: &[ClipVertex], plane: &ClipPlane) -> Vec<ClipVertex> {
    if polygon.is_empty() {
        return Vec::new();
    }

    let is_inside = |v: &ClipVertex| {
        if plane.positive {
            v.pos[plane.axis] >= plane.value - 1e-10
        } else {
            v.pos[plane.axis] <= plane.value + 1e-10
        }
    };

    let mut output = Vec::new();
    let n = polygon.len();

    for i in 0..n {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % n];
        let cur_in = is_inside(current);
        let nxt_in = is_inside(next);

        match (cur_in, nxt_in) {
            (true, true) => {
                // Both inside: emit next
                output.push(next.clone());
            }
            (true, false) => {
                // Going out: emit intersection
                output.push(intersect_edge(current, next, plane));
            }
            (false, true) => {
                // Coming in: emit intersection + next
                output.push(intersect_edge(current, next, plane));
                output.push(next.clone());
            }
            (false, false) => {
                // Both outside: emit nothing
            }
        }
    }

    output
}

/// Clip a triangle against the 6 AABB planes of one octant.
fn clip_triangle_to_octant(tri: [ClipVertex; 3], octant_bounds: &BoundingBox) -> Vec<ClipVertex> {
    let planes = [
        ClipPlane { axis: 0, value: octant_bounds.min[0], positive: true },
        ClipPlane { axis: 0, value: octant_bounds.max[0], positive: false },
        ClipPlane { axis: 1, value: octant_bounds.min[1], positive: true },
        ClipPlane { axis: 1, value: octant_bounds.max[1], positive: false },
        ClipPlane { axis: 2, value: octant_bounds.min[2], positive: true },
        ClipPlane { axis: 2, value: octant_bounds.max[2], positive: false },
    ];

    let mut polygon: Vec<ClipVertex> = tri.into();

    for plane in &planes {
        polygon = clip_polygon_by_plane(&polygon, plane);
        if polygon.is_empty() {
            return polygon;
        }
    }

    polygon
}

/// Fan-triangulate a convex polygon from vertex 0. Skip degenerate (<3 verts).
fn fan_triangulate(polygon: &[ClipVertex]) -> Vec<[ClipVertex; 3]> {
    if polygon.len() < 3 {
        return Vec::new();
    }

    let mut tris = Vec::with_capacity(polygon.len() - 2);
    for i in 1..polygon.len() - 1 {
        tris.push([
            polygon[0].clone(),
            polygon[i].clone(),
            polygon[i + 1].clone(),
        ]);
    }
    tris
}

/// Accumulator for building an IndexedMesh per octant with vertex deduplication.
struct OctantMeshBuilder {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    colors: Vec<f32>,
    indices: Vec<u32>,
    dedup: HashMap<PositionKey, u32>,
    has_normals: bool,
    has_uvs: bool,
    has_colors: bool,
}

impl OctantMeshBuilder {
    fn new(has_normals: bool, has_uvs: bool, has_colors: bool) -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
            dedup: HashMap::new(),
            has_normals,
            has_uvs,
            has_colors,
        }
    }

    /// Add a vertex (dedup by quantized position), return its index.
    fn add_vertex(&mut self, v: &ClipVertex) -> u32 {
        let key = PositionKey::from_pos(v.pos);
        if let Some(&idx) = self.dedup.get(&key) {
            return idx;
        }

        let idx = (self.positions.len() / 3) as u32;
        self.positions.extend_from_slice(&[v.pos[0] as f32, v.pos[1] as f32, v.pos[2] as f32]);

        if self.has_normals {
            self.normals.extend_from_slice(&[v.normal[0] as f32, v.normal[1] as f32, v.normal[2] as f32]);
        }
        if self.has_uvs {
            self.uvs.extend_from_slice(&[v.uv[0] as f32, v.uv[1] as f32]);
        }
        if self.has_colors {
            self.colors.extend_from_slice(&[v.color[0] as f32, v.color[1] as f32, v.color[2] as f32, v.color[3] as f32]);
        }

        self.dedup.insert(key, idx);
        idx
    }

    /// Add a triangle from 3 ClipVertices. Skips degenerate (collapsed indices).
    fn add_triangle(&mut self, a: &ClipVertex, b: &ClipVertex, c: &ClipVertex) {
        let ia = self.add_vertex(a);
        let ib = self.add_vertex(b);
        let ic = self.add_vertex(c);
        // Skip degenerate triangles
        if ia != ib && ib != ic && ia != ic {
            self.indices.extend_from_slice(&[ia, ib, ic]);
        }
    }

    /// Build the final IndexedMesh.
    fn build(self, material_index: Option<usize>) -> IndexedMesh {
        IndexedMesh {
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            colors: self.colors,
            indices: self.indices,
            material_index,
        }
    }
}

/// Split a mesh into 8 octant sub-meshes using Sutherland-Hodgman clipping.
///
/// Triangles straddling octant boundaries are clipped and the resulting
/// sub-polygons are fan-triangulated into the appropriate octant. Interior
/// triangles (all 3 vertices in the same octant) take a fast path that skips
/// clipping entirely.
pub fn split_mesh_clipping(mesh: &IndexedMesh, bounds: &BoundingBox) -> [IndexedMesh; 8] {
    let center = bounds.center();
    let child_boxes: [BoundingBox; 8] = std::array::from_fn(|i| child_bounds(bounds, i));

    let mut builders: [OctantMeshBuilder; 8] = std::array::from_fn(|_| {
        OctantMeshBuilder::new(mesh.has_normals(), mesh.has_uvs(), mesh.has_colors())
    });

    for tri in mesh.indices.chunks_exact(3) {
        let i0 = tri[0] as usize;
        let i1 = tri[1] as usize;
        let i2 = tri[2] as usize;

        let p0 = [
            mesh.positions[i0 * 3] as f64,
            mesh.positions[i0 * 3 + 1] as f64,
            mesh.positions[i0 * 3 + 2] as f64,
        ];
        let p1 = [
            mesh.positions[i1 * 3] as f64,
            mesh.positions[i1 * 3 + 1] as f64,
            mesh.positions[i1 * 3 + 2] as f64,
        ];
        let p2 = [
            mesh.positions[i2 * 3] as f64,
            mesh.positions[i2 * 3 + 1] as f64,
            mesh.positions[i2 * 3 + 2] as f64,
        ];

        let oct0 = octant_index(center, p0);
        let oct1 = octant_index(center, p1);
        let oct2 = octant_index(center, p2);

        if oct0 == oct1 && oct1 == oct2 {
            // Fast path: all vertices in same octant — no clipping needed
            let v0 = extract_clip_vertex(mesh, i0);
            let v1 = extract_clip_vertex(mesh, i1);
            let v2 = extract_clip_vertex(mesh, i2);
            builders[oct0].add_triangle(&v0, &v1, &v2);
        } else {
            // Slow path: triangle straddles boundary — clip against each candidate octant
            let v0 = extract_clip_vertex(mesh, i0);
            let v1 = extract_clip_vertex(mesh, i1);
            let v2 = extract_clip_vertex(mesh, i2);

            // Only clip against octants that the triangle might touch.
            // The triangle can only be in octants covered by its vertices' octant indices.
            // For simplicity and correctness, test all 8 octants for boundary triangles.
            for (oct_idx, cb) in child_boxes.iter().enumerate() {
                let clipped = clip_triangle_to_octant(
                    [v0.clone(), v1.clone(), v2.clone()],
                    cb,
                );
                let sub_tris = fan_triangulate(&clipped);
                for sub_tri in &sub_tris {
                    builders[oct_idx].add_triangle(&sub_tri[0], &sub_tri[1], &sub_tri[2]);
                }
            }
        }
    }

    let material_index = mesh.material_index;
    std::array::from_fn(|i| {
        std::mem::replace(
            &mut builders[i],
            OctantMeshBuilder::new(false, false, false),
        )
        .build(material_index)
    })
}
