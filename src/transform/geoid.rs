//! Geoid undulation collaborator: returns `N(lat, lon)` in meters for a
//! named model, used to convert between orthometric and ellipsoidal
//! heights.
//!
//! No third-party EGM-grid crate exists in this crate's dependency
//! ecosystem, so the concrete implementation here is a small crate-local
//! binary grid reader, memory-mapped with `memmap2` the same way the
//! ingestion loaders map mesh files.

use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::warn;

use super::coordinate_system::GeoidModel;

/// Returns geoid undulation for a named model; read-mostly after
/// `initialize`, so a process-wide instance is fine -- the transform
/// engine takes a shared reference, not ownership.
pub trait GeoidService: Send + Sync {
    fn initialize(&mut self, model: GeoidModel, data_path: &Path) -> bool;
    fn is_initialized(&self) -> bool;
    /// `N(lat°, lon°)` in meters, or `None` on missing data / lookup failure.
    fn geoid_height(&self, lat: f64, lon: f64) -> Option<f64>;
}

/// `h_ellipsoidal = h_orthometric + N(lat, lon)`.
pub fn orthometric_to_ellipsoidal(h_orthometric: f64, undulation: f64) -> f64 {
    h_orthometric + undulation
}

/// `h_orthometric = h_ellipsoidal - N(lat, lon)`.
pub fn ellipsoidal_to_orthometric(h_ellipsoidal: f64, undulation: f64) -> f64 {
    h_ellipsoidal - undulation
}

/// Default service used when no geoid model is configured. Always
/// reports uninitialized, so the geoid policy in `transformer.rs` always
/// skips correction -- the same never-applied behavior as an absent model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGeoidService;

impl GeoidService for NullGeoidService {
    fn initialize(&mut self, _model: GeoidModel, _data_path: &Path) -> bool {
        false
    }
    fn is_initialized(&self) -> bool {
        false
    }
    fn geoid_height(&self, _lat: f64, _lon: f64) -> Option<f64> {
        None
    }
}

/// Fixed header for the crate-local grid file format: row/column counts,
/// geographic bounds, and spacing, followed by a row-major `f32`
/// undulation grid (rows south-to-north, columns west-to-east).
#[derive(Debug, Clone, Copy)]
struct GridHeader {
    rows: u32,
    cols: u32,
    lat_min: f64,
    lon_min: f64,
    lat_step: f64,
    lon_step: f64,
}

const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8 + 8;

impl GridHeader {
    fn parse(bytes: &[u8]) -> Option<GridHeader> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let rows = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let cols = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let lat_min = f64::from_le_bytes(bytes[8..16].try_into().ok()?);
        let lon_min = f64::from_le_bytes(bytes[16..24].try_into().ok()?);
        let lat_step = f64::from_le_bytes(bytes[24..32].try_into().ok()?);
        let lon_step = f64::from_le_bytes(bytes[32..40].try_into().ok()?);
        Some(GridHeader {
            rows,
            cols,
            lat_min,
            lon_min,
            lat_step,
            lon_step,
        })
    }
}

struct GeoidGrid {
    header: GridHeader,
    mmap: Mmap,
}

impl GeoidGrid {
    fn cell(&self, row: u32, col: u32) -> f32 {
        let idx = HEADER_LEN + (row as usize * self.header.cols as usize + col as usize) * 4;
        let bytes = &self.mmap[idx..idx + 4];
        f32::from_le_bytes(bytes.try_into().unwrap())
    }

    /// Bilinear interpolation; returns `None` when the point falls outside
    /// the grid's coverage.
    fn sample(&self, lat: f64, lon: f64) -> Option<f64> {
        let h = &self.header;
        let fr = (lat - h.lat_min) / h.lat_step;
        let fc = (lon - h.lon_min) / h.lon_step;
        if fr < 0.0 || fc < 0.0 || fr > (h.rows - 1) as f64 || fc > (h.cols - 1) as f64 {
            return None;
        }

        let r0 = fr.floor() as u32;
        let c0 = fc.floor() as u32;
        let r1 = (r0 + 1).min(h.rows - 1);
        let c1 = (c0 + 1).min(h.cols - 1);
        let tr = fr - r0 as f64;
        let tc = fc - c0 as f64;

        let v00 = self.cell(r0, c0) as f64;
        let v01 = self.cell(r0, c1) as f64;
        let v10 = self.cell(r1, c0) as f64;
        let v11 = self.cell(r1, c1) as f64;

        let top = v00 + (v01 - v00) * tc;
        let bottom = v10 + (v11 - v10) * tc;
        Some(top + (bottom - top) * tr)
    }
}

/// `GeoidService` backed by a memory-mapped crate-local grid file. The
/// on-disk format is documented in DESIGN.md; no upstream EGM binary
/// layout is assumed.
#[derive(Default)]
pub struct GridGeoidService {
    model: GeoidModel,
    grid: Option<Arc<GeoidGrid>>,
}

impl GridGeoidService {
    pub fn new() -> Self {
        GridGeoidService::default()
    }

    fn grid_file_name(model: GeoidModel) -> Option<&'static str> {
        match model {
            GeoidModel::Egm84 => Some("egm84.geoidgrid"),
            GeoidModel::Egm96 => Some("egm96.geoidgrid"),
            GeoidModel::Egm2008 => Some("egm2008.geoidgrid"),
            GeoidModel::None => None,
        }
    }
}

impl GeoidService for GridGeoidService {
    fn initialize(&mut self, model: GeoidModel, data_path: &Path) -> bool {
        self.grid = None;
        self.model = model;

        let Some(file_name) = Self::grid_file_name(model) else {
            return false;
        };

        let path = data_path.join(file_name);
        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open geoid grid file");
                return false;
            }
        };

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not memory-map geoid grid file");
                return false;
            }
        };

        let Some(header) = GridHeader::parse(&mmap) else {
            warn!(path = %path.display(), "Geoid grid file header is malformed");
            return false;
        };

        let expected_len = HEADER_LEN + header.rows as usize * header.cols as usize * 4;
        if mmap.len() < expected_len {
            warn!(path = %path.display(), "Geoid grid file is truncated");
            return false;
        }

        self.grid = Some(Arc::new(GeoidGrid { header, mmap }));
        true
    }

    fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    fn geoid_height(&self, lat: f64, lon: f64) -> Option<f64> {
        self.grid.as_ref()?.sample(lat, lon)
    }
}
