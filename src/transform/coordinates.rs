use crate::config::Units;
use crate::transform::coordinate_system::UpAxis;
use crate::transform::transformer::convert_up_axis;
use crate::types::{BoundingBox, IndexedMesh};

/// Return the multiplier to convert the given units to metres.
pub fn unit_scale_factor(units: Units) -> f64 {
    match units {
        Units::Millimeters => 0.001,
        Units::Centimeters => 0.01,
        Units::Meters => 1.0,
        Units::Feet => 0.3048,
        Units::Inches => 0.0254,
    }
}

/// Scale all vertex positions in-place (f64 math, write back f32).
pub fn apply_unit_scaling(meshes: &mut [IndexedMesh], factor: f64) {
    for mesh in meshes.iter_mut() {
        for pos in mesh.positions.iter_mut() {
            *pos = ((*pos as f64) * factor) as f32;
        }
    }
}

/// Convert from right-handed Y-up (OBJ/glTF) to right-handed Z-up (3D Tiles),
/// via the same `convert_up_axis` rotation the coordinate engine uses for a
/// `LocalCartesian` source -- the mesh formats this pipeline ingests are
/// always authored Y-up regardless of the georeferencing CRS, so this is a
/// fixed ingestion-format convention rather than a per-dataset choice.
pub fn swap_y_up_to_z_up(meshes: &mut [IndexedMesh]) {
    for mesh in meshes.iter_mut() {
        for tri in mesh.positions.chunks_exact_mut(3) {
            let p = convert_up_axis([tri[0] as f64, tri[1] as f64, tri[2] as f64], UpAxis::YUp, UpAxis::ZUp);
            tri[0] = p[0] as f32;
            tri[1] = p[1] as f32;
            tri[2] = p[2] as f32;
        }
        for tri in mesh.normals.chunks_exact_mut(3) {
            let n = convert_up_axis([tri[0] as f64, tri[1] as f64, tri[2] as f64], UpAxis::YUp, UpAxis::ZUp);
            tri[0] = n[0] as f32;
            tri[1] = n[1] as f32;
            tri[2] = n[2] as f32;
        }
    }
}

/// Rotate all vertex positions about the Z axis by the given angle in degrees.
pub fn apply_true_north_rotation(meshes: &mut [IndexedMesh], degrees: f64) {
    let radians = degrees.to_radians();
    let cos_a = radians.cos();
    let sin_a = radians.sin();

    for mesh in meshes.iter_mut() {
        for tri in mesh.positions.chunks_exact_mut(3) {
            let x = tri[0] as f64;
            let y = tri[1] as f64;
            tri[0] = (x * cos_a - y * sin_a) as f32;
            tri[1] = (x * sin_a + y * cos_a) as f32;
        }
        for tri in mesh.normals.chunks_exact_mut(3) {
            let x = tri[0] as f64;
            let y = tri[1] as f64;
            tri[0] = (x * cos_a - y * sin_a) as f32;
            tri[1] = (x * sin_a + y * cos_a) as f32;
        }
    }
}

/// Compute the centroid of all vertices, subtract it from every position,
/// and return the centroid offset `[cx, cy, cz]`.
pub fn center_meshes(meshes: &mut [IndexedMesh]) -> [f64; 3] {
    // Accumulate in f64
    let mut sum = [0.0_f64; 3];
    let mut count: usize = 0;

    for mesh in meshes.iter() {
        for tri in mesh.positions.chunks_exact(3) {
            sum[0] += tri[0] as f64;
            sum[1] += tri[1] as f64;
            sum[2] += tri[2] as f64;
            count += 1;
        }
    }

    if count == 0 {
        return [0.0; 3];
    }

    let centroid = [
        sum[0] / count as f64,
        sum[1] / count as f64,
        sum[2] / count as f64,
    ];

    for mesh in meshes.iter_mut() {
        for tri in mesh.positions.chunks_exact_mut(3) {
            tri[0] = ((tri[0] as f64) - centroid[0]) as f32;
            tri[1] = ((tri[1] as f64) - centroid[1]) as f32;
            tri[2] = ((tri[2] as f64) - centroid[2]) as f32;
        }
    }

    centroid
}

/// Scan all vertex positions and return the axis-aligned bounding box.
pub fn compute_bounding_box(meshes: &[IndexedMesh]) -> BoundingBox {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];

    for mesh in meshes {
        for tri in mesh.positions.chunks_exact(3) {
            let x = tri[0] as f64;
            let y = tri[1] as f64;
            let z = tri[2] as f64;
            if x < min[0] {
                min[0] = x;
            }
            if y < min[1] {
                min[1] = y;
            }
            if z < min[2] {
                min[2] = z;
            }
            if x > max[0] {
                max[0] = x;
            }
            if y > max[1] {
                max[1] = y;
            }
            if z > max[2] {
                max[2] = z;
            }
        }
    }

    // If no vertices, return a zero-size box at origin
    if min[0] == f64::INFINITY {
        return BoundingBox {
            min: [0.0; 3],
            max: [0.0; 3],
        };
    }

    BoundingBox { min, max }
}
