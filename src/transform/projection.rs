//! Geographic projection collaborator: transforms points from a source CRS
//! (identified by EPSG code or WKT text) to WGS84 geographic coordinates.
//!
//! This is the one I/O-bearing collaborator the transform engine depends
//! on, backed by the `proj` crate (PROJ C library bindings). It is
//! injected into `CoordinateTransformer` rather than looked up through a
//! process-global -- see DESIGN.md for the rationale.

use tracing::warn;

/// An owned, non-copyable projection from one source CRS to WGS84
/// geographic (lon°, lat°). Released on drop.
pub trait ProjectionHandle: Send + Sync {
    /// Transform a point in the source CRS to WGS84 `(lon°, lat°, h)` in
    /// "traditional GIS" axis order (longitude first), independent of the
    /// CRS's declared axis order. `None` signals a non-fatal lookup
    /// failure; callers treat it as pass-through, not a crash.
    fn transform(&self, x: f64, y: f64, z: f64) -> Option<(f64, f64, f64)>;
}

/// Builds `ProjectionHandle`s from an EPSG code or WKT string.
pub trait ProjectionService: Send + Sync {
    fn create_from_epsg(&self, code: u32) -> Option<Box<dyn ProjectionHandle>>;
    fn create_from_wkt(&self, wkt: &str) -> Option<Box<dyn ProjectionHandle>>;
}

/// `ProjectionService` backed by the `proj` crate / PROJ C library.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjCrateProjectionService;

impl ProjectionService for ProjCrateProjectionService {
    fn create_from_epsg(&self, code: u32) -> Option<Box<dyn ProjectionHandle>> {
        let from = format!("EPSG:{code}");
        match proj::Proj::new_known_crs(&from, "EPSG:4326", None) {
            Ok(p) => Some(Box::new(ProjCrateHandle(p))),
            Err(e) => {
                warn!(epsg = code, error = %e, "Failed to build projection handle from EPSG code");
                None
            }
        }
    }

    fn create_from_wkt(&self, wkt: &str) -> Option<Box<dyn ProjectionHandle>> {
        match proj::Proj::new_known_crs(wkt, "EPSG:4326", None) {
            Ok(p) => Some(Box::new(ProjCrateHandle(p))),
            Err(e) => {
                warn!(error = %e, "Failed to build projection handle from WKT");
                None
            }
        }
    }
}

struct ProjCrateHandle(proj::Proj);

// Each handle owns an independent PROJ context; no transformer shares one.
unsafe impl Send for ProjCrateHandle {}
unsafe impl Sync for ProjCrateHandle {}

impl ProjectionHandle for ProjCrateHandle {
    fn transform(&self, x: f64, y: f64, z: f64) -> Option<(f64, f64, f64)> {
        match self.0.convert((x, y)) {
            Ok((lon, lat)) => Some((lon, lat, z)),
            Err(e) => {
                warn!(error = %e, "Projection transform failed");
                None
            }
        }
    }
}
