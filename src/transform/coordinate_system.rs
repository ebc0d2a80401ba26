//! Tagged coordinate-system descriptor: the pure, I/O-free value at the
//! bottom of the transform engine. See `transformer.rs` for the stateful
//! engine built on top of it.

use std::fmt;

/// Up-axis convention of a local Cartesian frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    #[default]
    YUp,
    ZUp,
}

/// Handedness of a local Cartesian frame. Left-handed is accepted by the
/// data model but not exercised by any transform (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

/// Vertical datum tag for EPSG/WKT coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalDatum {
    Ellipsoidal,
    Orthometric,
    #[default]
    Unknown,
}

impl VerticalDatum {
    /// Parse a configuration string, case-insensitively. Unrecognized
    /// strings fall back to `Unknown` (never fails ingestion).
    pub fn parse(s: &str) -> VerticalDatum {
        match s.to_ascii_lowercase().as_str() {
            "ellipsoidal" => VerticalDatum::Ellipsoidal,
            "orthometric" => VerticalDatum::Orthometric,
            _ => VerticalDatum::Unknown,
        }
    }
}

/// A tagged union of the four source coordinate-system shapes the engine
/// understands, plus an invalid bottom value.
///
/// Every valid variant has exactly one set of parameters populated; there
/// is no shared mutable state and no I/O in this type -- copy it freely.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateSystem {
    /// No geographic meaning; just an up-axis/handedness tag.
    LocalCartesian {
        up_axis: UpAxis,
        handedness: Handedness,
    },
    /// A tangent-plane frame with a built-in geographic anchor and an
    /// integer-meter "SRSOrigin" translation already baked into the data.
    Enu {
        origin_lon: f64,
        origin_lat: f64,
        origin_height: f64,
        offset_x: f64,
        offset_y: f64,
        offset_z: f64,
    },
    /// Any CRS identified by an EPSG integer code.
    Epsg {
        code: u32,
        origin_x: f64,
        origin_y: f64,
        origin_z: f64,
        vertical_datum: VerticalDatum,
    },
    /// Any CRS identified by Well-Known Text.
    Wkt {
        wkt_string: String,
        origin_x: f64,
        origin_y: f64,
        origin_z: f64,
        vertical_datum: VerticalDatum,
    },
    /// The default-constructed bottom value. `is_valid()` is `false`.
    Unknown,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        CoordinateSystem::Unknown
    }
}

impl CoordinateSystem {
    pub fn local_cartesian(up_axis: UpAxis, handedness: Handedness) -> Self {
        CoordinateSystem::LocalCartesian { up_axis, handedness }
    }

    pub fn enu(
        origin_lon: f64,
        origin_lat: f64,
        origin_height: f64,
        offset_x: f64,
        offset_y: f64,
        offset_z: f64,
    ) -> Self {
        CoordinateSystem::Enu {
            origin_lon,
            origin_lat,
            origin_height,
            offset_x,
            offset_y,
            offset_z,
        }
    }

    pub fn epsg(code: u32, origin_x: f64, origin_y: f64, origin_z: f64) -> Self {
        Self::epsg_with_datum(code, origin_x, origin_y, origin_z, VerticalDatum::Ellipsoidal)
    }

    pub fn epsg_with_datum(
        code: u32,
        origin_x: f64,
        origin_y: f64,
        origin_z: f64,
        vertical_datum: VerticalDatum,
    ) -> Self {
        CoordinateSystem::Epsg {
            code,
            origin_x,
            origin_y,
            origin_z,
            vertical_datum,
        }
    }

    pub fn wkt(wkt_string: impl Into<String>, origin_x: f64, origin_y: f64, origin_z: f64) -> Self {
        Self::wkt_with_datum(wkt_string, origin_x, origin_y, origin_z, VerticalDatum::Ellipsoidal)
    }

    pub fn wkt_with_datum(
        wkt_string: impl Into<String>,
        origin_x: f64,
        origin_y: f64,
        origin_z: f64,
        vertical_datum: VerticalDatum,
    ) -> Self {
        CoordinateSystem::Wkt {
            wkt_string: wkt_string.into(),
            origin_x,
            origin_y,
            origin_z,
            vertical_datum,
        }
    }

    pub fn unknown() -> Self {
        CoordinateSystem::Unknown
    }

    /// `false` only for the default-constructed `Unknown` bottom value.
    pub fn is_valid(&self) -> bool {
        !matches!(self, CoordinateSystem::Unknown)
    }

    /// `true` for variants whose points must pass through an external
    /// projection service before they mean anything geographically.
    pub fn needs_ogr_transform(&self) -> bool {
        matches!(self, CoordinateSystem::Epsg { .. } | CoordinateSystem::Wkt { .. })
    }

    /// `true` only for `Enu`, which carries its own geographic anchor.
    pub fn has_builtin_georeference(&self) -> bool {
        matches!(self, CoordinateSystem::Enu { .. })
    }

    /// `(x, y, z)` with variant-dependent meaning: the SRSOrigin offset for
    /// `Enu`, the projected origin for `Epsg`/`Wkt`, `(0,0,0)` otherwise.
    pub fn get_source_origin(&self) -> (f64, f64, f64) {
        match self {
            CoordinateSystem::Enu {
                offset_x,
                offset_y,
                offset_z,
                ..
            } => (*offset_x, *offset_y, *offset_z),
            CoordinateSystem::Epsg {
                origin_x,
                origin_y,
                origin_z,
                ..
            }
            | CoordinateSystem::Wkt {
                origin_x,
                origin_y,
                origin_z,
                ..
            } => (*origin_x, *origin_y, *origin_z),
            CoordinateSystem::LocalCartesian { .. } | CoordinateSystem::Unknown => (0.0, 0.0, 0.0),
        }
    }

    /// The built-in geographic anchor for `Enu`, or `None` otherwise.
    pub fn builtin_georeference(&self) -> Option<(f64, f64, f64)> {
        match self {
            CoordinateSystem::Enu {
                origin_lon,
                origin_lat,
                origin_height,
                ..
            } => Some((*origin_lon, *origin_lat, *origin_height)),
            _ => None,
        }
    }

    /// `Y_UP` / `Right` for every non-`LocalCartesian` variant.
    pub fn get_up_axis(&self) -> UpAxis {
        match self {
            CoordinateSystem::LocalCartesian { up_axis, .. } => *up_axis,
            _ => UpAxis::YUp,
        }
    }

    pub fn get_handedness(&self) -> Handedness {
        match self {
            CoordinateSystem::LocalCartesian { handedness, .. } => *handedness,
            _ => Handedness::Right,
        }
    }

    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            CoordinateSystem::Epsg { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn wkt_string(&self) -> Option<&str> {
        match self {
            CoordinateSystem::Wkt { wkt_string, .. } => Some(wkt_string),
            _ => None,
        }
    }

    /// `Ellipsoidal` is implicit for `Enu`/`LocalCartesian`; `Unknown` has
    /// no meaningful datum. `Epsg`/`Wkt` return their tagged value.
    pub fn get_vertical_datum(&self) -> VerticalDatum {
        match self {
            CoordinateSystem::Epsg { vertical_datum, .. } | CoordinateSystem::Wkt { vertical_datum, .. } => {
                *vertical_datum
            }
            CoordinateSystem::Enu { .. } | CoordinateSystem::LocalCartesian { .. } => VerticalDatum::Ellipsoidal,
            CoordinateSystem::Unknown => VerticalDatum::Unknown,
        }
    }

    /// No-op on variants other than `Epsg`/`Wkt`.
    pub fn set_vertical_datum(&mut self, datum: VerticalDatum) {
        match self {
            CoordinateSystem::Epsg { vertical_datum, .. } | CoordinateSystem::Wkt { vertical_datum, .. } => {
                *vertical_datum = datum;
            }
            _ => {}
        }
    }

    /// Shift the variant's origin (the `Enu` SRSOrigin offset, or the
    /// `Epsg`/`Wkt` projected origin) by `delta`. No-op on `LocalCartesian`
    /// and `Unknown`, which carry no origin to shift.
    ///
    /// Used by the host pipeline to fold a mesh-centering centroid into the
    /// origin before building a transformer, so the projected/ECEF anchor
    /// tracks wherever the mesh's local `(0,0,0)` ends up after centering.
    pub fn translate_origin(&self, delta: [f64; 3]) -> Self {
        match self {
            CoordinateSystem::Enu {
                origin_lon,
                origin_lat,
                origin_height,
                offset_x,
                offset_y,
                offset_z,
            } => CoordinateSystem::Enu {
                origin_lon: *origin_lon,
                origin_lat: *origin_lat,
                origin_height: *origin_height,
                offset_x: offset_x + delta[0],
                offset_y: offset_y + delta[1],
                offset_z: offset_z + delta[2],
            },
            CoordinateSystem::Epsg {
                code,
                origin_x,
                origin_y,
                origin_z,
                vertical_datum,
            } => CoordinateSystem::Epsg {
                code: *code,
                origin_x: origin_x + delta[0],
                origin_y: origin_y + delta[1],
                origin_z: origin_z + delta[2],
                vertical_datum: *vertical_datum,
            },
            CoordinateSystem::Wkt {
                wkt_string,
                origin_x,
                origin_y,
                origin_z,
                vertical_datum,
            } => CoordinateSystem::Wkt {
                wkt_string: wkt_string.clone(),
                origin_x: origin_x + delta[0],
                origin_y: origin_y + delta[1],
                origin_z: origin_z + delta[2],
                vertical_datum: *vertical_datum,
            },
            CoordinateSystem::LocalCartesian { .. } | CoordinateSystem::Unknown => self.clone(),
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::LocalCartesian { up_axis, handedness } => {
                write!(f, "LocalCartesian(up_axis={up_axis:?}, handedness={handedness:?})")
            }
            CoordinateSystem::Enu {
                origin_lon,
                origin_lat,
                origin_height,
                offset_x,
                offset_y,
                offset_z,
            } => write!(
                f,
                "ENU(origin=({origin_lon}, {origin_lat}, {origin_height}), offset=({offset_x}, {offset_y}, {offset_z}))"
            ),
            CoordinateSystem::Epsg {
                code,
                origin_x,
                origin_y,
                origin_z,
                vertical_datum,
            } => write!(
                f,
                "EPSG:{code}(origin=({origin_x}, {origin_y}, {origin_z}), datum={vertical_datum:?})"
            ),
            CoordinateSystem::Wkt {
                wkt_string,
                origin_x,
                origin_y,
                origin_z,
                vertical_datum,
            } => write!(
                f,
                "WKT(\"{wkt_string}\", origin=({origin_x}, {origin_y}, {origin_z}), datum={vertical_datum:?})"
            ),
            CoordinateSystem::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The caller-supplied (or OGR-derived) geographic anchor for a
/// transformer's origin. For `Enu` systems this is ignored -- the
/// built-in reference wins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoReference {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
    pub datum: VerticalDatum,
}

impl GeoReference {
    pub fn new(lon: f64, lat: f64, height: f64, datum: VerticalDatum) -> Self {
        GeoReference { lon, lat, height, datum }
    }

    /// `true` when every field is exactly zero and the datum is the default
    /// -- the "caller didn't really supply one" sentinel used by the
    /// construction-time origin-resolution policy (§4.4.1).
    pub fn is_zero(&self) -> bool {
        self.lon == 0.0 && self.lat == 0.0 && self.height == 0.0 && self.datum == VerticalDatum::default()
    }
}

/// Which geoid model (if any) to apply, and where its data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeoidModel {
    #[default]
    None,
    Egm84,
    Egm96,
    Egm2008,
}

impl GeoidModel {
    /// Parse a configuration string, case-insensitively. Unrecognized
    /// names resolve to `None` and the caller should log a warning.
    pub fn parse(s: &str) -> GeoidModel {
        match s.to_ascii_lowercase().as_str() {
            "egm84" => GeoidModel::Egm84,
            "egm96" => GeoidModel::Egm96,
            "egm2008" => GeoidModel::Egm2008,
            _ => GeoidModel::None,
        }
    }
}

impl fmt::Display for GeoidModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GeoidModel::None => "none",
            GeoidModel::Egm84 => "egm84",
            GeoidModel::Egm96 => "egm96",
            GeoidModel::Egm2008 => "egm2008",
        };
        write!(f, "{s}")
    }
}

/// Describes which geoid model to apply and where its data files live.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoidConfig {
    pub enabled: bool,
    pub model: GeoidModel,
    pub data_path: std::path::PathBuf,
}
