//! `CoordinateTransformer`: the stateful engine built from a
//! `CoordinateSystem` (+ optional geo-reference, + optional geoid config).
//! Construction resolves the geographic origin once and caches the
//! ENU↔ECEF rigid-body pair; every subsequent point transform is a pure
//! function of that cached state.

use std::sync::Arc;

use tracing::warn;

use super::coordinate_system::{CoordinateSystem, GeoReference, GeoidConfig, UpAxis, VerticalDatum};
use super::ecef::geodetic_to_ecef;
use super::geoid::{ellipsoidal_to_orthometric, orthometric_to_ellipsoidal, GeoidService, NullGeoidService};
use super::matrix::Mat4;
use super::projection::{ProjectionHandle, ProjectionService};

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    None,
    WithGeoReference,
}

/// Pure rotation between Y-Up and Z-Up right-handed frames.
///
/// ```text
/// Z_UP -> Y_UP: (x, y, z) -> (x, z, -y)
/// Y_UP -> Z_UP: (x, y, z) -> (x, -z, y)
/// same -> same: identity
/// ```
pub fn convert_up_axis(p: [f64; 3], from: UpAxis, to: UpAxis) -> [f64; 3] {
    match (from, to) {
        (UpAxis::ZUp, UpAxis::YUp) => [p[0], p[2], -p[1]],
        (UpAxis::YUp, UpAxis::ZUp) => [p[0], -p[2], p[1]],
        _ => p,
    }
}

/// Build the ENU→ECEF rigid-body matrix at geodetic `(lon°, lat°, h)`.
/// See SPEC_FULL.md §4.4.6 for the canonical formula.
pub fn calc_enu_to_ecef_matrix(lon_deg: f64, lat_deg: f64, height_m: f64) -> Mat4 {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();

    let origin = geodetic_to_ecef(lon_deg, lat_deg, height_m);

    let east = [-sin_lon, cos_lon, 0.0];
    let north = [-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat];
    let up = [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat];

    Mat4::from_columns(east, north, up, origin)
}

/// `cartographic_to_ecef` is `geodetic_to_ecef` under the transform
/// engine's own name -- kept as a thin alias so call sites read the way
/// SPEC_FULL.md names the operation.
pub fn cartographic_to_ecef(lon_deg: f64, lat_deg: f64, height_m: f64) -> [f64; 3] {
    geodetic_to_ecef(lon_deg, lat_deg, height_m)
}

/// The stateful coordinate-transform engine. Owns its projection handle
/// and geoid config; non-`Copy`, move-only.
pub struct CoordinateTransformer {
    source_cs: CoordinateSystem,
    mode: Mode,
    geo_origin_lon: f64,
    geo_origin_lat: f64,
    geo_origin_height: f64,
    enu_to_ecef: Mat4,
    ecef_to_enu: Mat4,
    axis_transform: Mat4,
    projection_handle: Option<Box<dyn ProjectionHandle>>,
    geoid_config: GeoidConfig,
    geoid_service: Arc<dyn GeoidService>,
}

impl CoordinateTransformer {
    /// Construct without a geo-reference. Only `convert_up_axis` and the
    /// free helpers are usable afterward -- `to_ecef`/`to_local_enu`/
    /// `to_wgs84` log a warning and pass the input through.
    pub fn new(source_cs: CoordinateSystem) -> Self {
        let axis_transform = axis_transform_matrix(source_cs.get_up_axis(), UpAxis::YUp);
        CoordinateTransformer {
            source_cs,
            mode: Mode::None,
            geo_origin_lon: 0.0,
            geo_origin_lat: 0.0,
            geo_origin_height: 0.0,
            enu_to_ecef: Mat4::identity(),
            ecef_to_enu: Mat4::identity(),
            axis_transform,
            projection_handle: None,
            geoid_config: GeoidConfig::default(),
            geoid_service: Arc::new(NullGeoidService),
        }
    }

    /// Construct with a geo-reference; geoid correction disabled.
    pub fn with_georeference(
        source_cs: CoordinateSystem,
        geo_ref: GeoReference,
        projection_service: &dyn ProjectionService,
    ) -> Self {
        Self::build(
            source_cs,
            geo_ref,
            projection_service,
            Arc::new(NullGeoidService),
            GeoidConfig::default(),
        )
    }

    /// Construct with a geo-reference and geoid config.
    pub fn with_geoid(
        source_cs: CoordinateSystem,
        geo_ref: GeoReference,
        projection_service: &dyn ProjectionService,
        geoid_service: Arc<dyn GeoidService>,
        geoid_config: GeoidConfig,
    ) -> Self {
        Self::build(source_cs, geo_ref, projection_service, geoid_service, geoid_config)
    }

    fn build(
        source_cs: CoordinateSystem,
        geo_ref: GeoReference,
        projection_service: &dyn ProjectionService,
        geoid_service: Arc<dyn GeoidService>,
        geoid_config: GeoidConfig,
    ) -> Self {
        let mut projection_handle = None;

        let (lon, lat, height) = match &source_cs {
            CoordinateSystem::Enu {
                origin_lon,
                origin_lat,
                origin_height,
                ..
            } => (*origin_lon, *origin_lat, *origin_height),

            CoordinateSystem::Epsg { code, .. } => {
                projection_handle = projection_service.create_from_epsg(*code);
                Self::resolve_projected_origin(
                    &source_cs,
                    &geo_ref,
                    projection_handle.as_deref(),
                    &*geoid_service,
                    &geoid_config,
                )
            }

            CoordinateSystem::Wkt { wkt_string, .. } => {
                projection_handle = projection_service.create_from_wkt(wkt_string);
                Self::resolve_projected_origin(
                    &source_cs,
                    &geo_ref,
                    projection_handle.as_deref(),
                    &*geoid_service,
                    &geoid_config,
                )
            }

            CoordinateSystem::LocalCartesian { .. } | CoordinateSystem::Unknown => {
                (geo_ref.lon, geo_ref.lat, geo_ref.height)
            }
        };

        let enu_to_ecef = calc_enu_to_ecef_matrix(lon, lat, height);
        let ecef_to_enu = enu_to_ecef.inverse().unwrap_or_else(Mat4::identity);
        let axis_transform = axis_transform_matrix(source_cs.get_up_axis(), UpAxis::YUp);

        CoordinateTransformer {
            source_cs,
            mode: Mode::WithGeoReference,
            geo_origin_lon: lon,
            geo_origin_lat: lat,
            geo_origin_height: height,
            enu_to_ecef,
            ecef_to_enu,
            axis_transform,
            projection_handle,
            geoid_config,
            geoid_service,
        }
    }

    /// EPSG/WKT origin resolution: caller-supplied `geo_ref` wins verbatim
    /// (with optional geoid correction gated on `geo_ref.datum`) when
    /// non-zero; otherwise project the variant's own origin and evaluate
    /// the same policy gated on `source_cs`'s own datum. Falls back to the
    /// caller's `geo_ref` (or `(0,0,0)`) if the handle is absent --
    /// construction never fails.
    fn resolve_projected_origin(
        source_cs: &CoordinateSystem,
        geo_ref: &GeoReference,
        handle: Option<&dyn ProjectionHandle>,
        geoid_service: &dyn GeoidService,
        geoid_config: &GeoidConfig,
    ) -> (f64, f64, f64) {
        if !geo_ref.is_zero() {
            let height = apply_geoid_correction(
                source_cs,
                geo_ref.datum,
                geo_ref.height,
                geo_ref.lat,
                geo_ref.lon,
                geoid_service,
                geoid_config,
            );
            return (geo_ref.lon, geo_ref.lat, height);
        }

        let Some(handle) = handle else {
            warn!("Projection handle unavailable -- falling back to caller-supplied geo-reference");
            return (geo_ref.lon, geo_ref.lat, geo_ref.height);
        };

        let (origin_x, origin_y, origin_z) = source_cs.get_source_origin();
        let Some((lon, lat, h)) = handle.transform(origin_x, origin_y, origin_z) else {
            warn!("Origin projection failed -- falling back to caller-supplied geo-reference");
            return (geo_ref.lon, geo_ref.lat, geo_ref.height);
        };

        let height = apply_geoid_correction(source_cs, source_cs.get_vertical_datum(), h, lat, lon, geoid_service, geoid_config);
        (lon, lat, height)
    }

    /// Toggle geoid correction. The only mutating operation on an
    /// otherwise read-only instance; callers must not race it against
    /// in-flight transformations.
    pub fn enable_geoid_correction(&mut self, enabled: bool) {
        self.geoid_config.enabled = enabled;
    }

    pub fn mode_has_georeference(&self) -> bool {
        self.mode == Mode::WithGeoReference
    }

    pub fn geo_origin(&self) -> (f64, f64, f64) {
        (self.geo_origin_lon, self.geo_origin_lat, self.geo_origin_height)
    }

    /// The ENU→ECEF matrix as a 16-element column-major array, emitted
    /// verbatim as the 3D-Tiles root `transform`.
    pub fn enu_to_ecef_matrix(&self) -> [f64; 16] {
        self.enu_to_ecef.to_array()
    }

    /// EPSG/WKT forward projection to ECEF. `None` means the projection
    /// handle was absent or the projection call itself failed -- the
    /// "pass-through, not a crash" case callers must handle specially.
    fn project_to_ecef(&self, p: [f64; 3]) -> Option<[f64; 3]> {
        let (origin_x, origin_y, origin_z) = self.source_cs.get_source_origin();
        let p_prime = [p[0] + origin_x, p[1] + origin_y, p[2] + origin_z];

        let handle = self.projection_handle.as_ref()?;
        let (lon, lat, h) = handle.transform(p_prime[0], p_prime[1], p_prime[2])?;

        let h = apply_geoid_correction(
            &self.source_cs,
            self.source_cs.get_vertical_datum(),
            h,
            lat,
            lon,
            &*self.geoid_service,
            &self.geoid_config,
        );
        Some(cartographic_to_ecef(lon, lat, h))
    }

    /// Per-variant forward transform to ECEF (no final `ecef_to_enu`
    /// multiply). Requires `WithGeoReference` mode; otherwise logs a
    /// warning and returns `p` unchanged.
    pub fn to_ecef(&self, p: [f64; 3]) -> [f64; 3] {
        if self.mode != Mode::WithGeoReference {
            warn!("to_ecef called without a geo-reference -- returning input unchanged");
            return p;
        }

        match &self.source_cs {
            CoordinateSystem::LocalCartesian { .. } | CoordinateSystem::Unknown => self.enu_to_ecef.mul_point(p),

            CoordinateSystem::Enu {
                offset_x,
                offset_y,
                offset_z,
                ..
            } => {
                let p_prime = [p[0] + offset_x, p[1] + offset_y, p[2] + offset_z];
                self.enu_to_ecef.mul_point(p_prime)
            }

            CoordinateSystem::Epsg { .. } | CoordinateSystem::Wkt { .. } => {
                self.project_to_ecef(p).unwrap_or(p)
            }
        }
    }

    /// `ecef_to_enu · to_ecef(p)` for every variant except the EPSG/WKT
    /// pass-through case, which returns `p` directly so a failed
    /// projection never silently relocates the point through an
    /// unrelated rotation.
    pub fn to_local_enu(&self, p: [f64; 3]) -> [f64; 3] {
        if self.mode != Mode::WithGeoReference {
            warn!("to_local_enu called without a geo-reference -- returning input unchanged");
            return p;
        }

        match &self.source_cs {
            CoordinateSystem::Epsg { .. } | CoordinateSystem::Wkt { .. } => match self.project_to_ecef(p) {
                Some(ecef) => self.ecef_to_enu.mul_point(ecef),
                None => p,
            },
            _ => self.ecef_to_enu.mul_point(self.to_ecef(p)),
        }
    }

    /// In-place batch form of `to_local_enu`; one point at a time, no
    /// SIMD or blocking required by the contract.
    pub fn to_local_enu_batch(&self, points: &mut [[f64; 3]]) {
        for p in points.iter_mut() {
            *p = self.to_local_enu(*p);
        }
    }

    /// The geographic triplet `(lon°, lat°, h)` for the same point.
    /// Requires `WithGeoReference` mode.
    ///
    /// For `Enu`/`LocalCartesian`/`Unknown` this returns
    /// `(geo_origin_lon, geo_origin_lat, geo_origin_height + p[2])` -- an
    /// intentional approximation for logging/diagnostics, not a true
    /// inverse projection (the engine performs no ECEF→WGS84 inverse
    /// geodesy).
    pub fn to_wgs84(&self, p: [f64; 3]) -> [f64; 3] {
        if self.mode != Mode::WithGeoReference {
            warn!("to_wgs84 called without a geo-reference -- returning input unchanged");
            return p;
        }

        match &self.source_cs {
            CoordinateSystem::Epsg { .. } | CoordinateSystem::Wkt { .. } => {
                let (origin_x, origin_y, origin_z) = self.source_cs.get_source_origin();
                let p_prime = [p[0] + origin_x, p[1] + origin_y, p[2] + origin_z];

                let Some(handle) = &self.projection_handle else {
                    return p;
                };
                let Some((lon, lat, h)) = handle.transform(p_prime[0], p_prime[1], p_prime[2]) else {
                    return p;
                };

                let h = apply_geoid_correction(
                    &self.source_cs,
                    self.source_cs.get_vertical_datum(),
                    h,
                    lat,
                    lon,
                    &*self.geoid_service,
                    &self.geoid_config,
                );
                [lon, lat, h]
            }
            _ => [self.geo_origin_lon, self.geo_origin_lat, self.geo_origin_height + p[2]],
        }
    }

    /// `convert_up_axis` defaulting `from` to the source system's own
    /// up-axis, converting into Y-Up. Available in every mode.
    pub fn convert_up_axis(&self, p: [f64; 3]) -> [f64; 3] {
        self.axis_transform.mul_point(p)
    }
}

/// The cached Y-Up target rotation for a given source up-axis, expressed
/// as a 4×4 matrix so it composes uniformly with the ECEF matrices.
fn axis_transform_matrix(from: UpAxis, to: UpAxis) -> Mat4 {
    match (from, to) {
        (UpAxis::ZUp, UpAxis::YUp) => Mat4::from_columns([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.0; 3]),
        (UpAxis::YUp, UpAxis::ZUp) => Mat4::from_columns([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0], [0.0; 3]),
        _ => Mat4::identity(),
    }
}

/// Geoid policy (§4.4.2): correction applies iff geoid is enabled,
/// initialized, and `datum` is `Orthometric`/`Unknown`. `Enu`/
/// `LocalCartesian` always skip it. `datum` is passed in explicitly rather
/// than re-derived from `source_cs` so the construction-time geo_ref-wins
/// path can gate on `geo_ref.datum` (the caller's own tag) instead of the
/// coordinate system's datum, per SPEC_FULL.md §4.4.1.
fn apply_geoid_correction(
    source_cs: &CoordinateSystem,
    datum: VerticalDatum,
    height: f64,
    lat: f64,
    lon: f64,
    geoid_service: &dyn GeoidService,
    geoid_config: &GeoidConfig,
) -> f64 {
    if matches!(source_cs, CoordinateSystem::Enu { .. } | CoordinateSystem::LocalCartesian { .. }) {
        return height;
    }

    if !geoid_config.enabled || !geoid_service.is_initialized() {
        return height;
    }

    if !matches!(datum, VerticalDatum::Orthometric | VerticalDatum::Unknown) {
        return height;
    }

    match geoid_service.geoid_height(lat, lon) {
        Some(n) => orthometric_to_ellipsoidal(height, n),
        None => height,
    }
}
