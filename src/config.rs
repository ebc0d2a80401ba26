use std::path::PathBuf;

use clap::Parser;

use crate::transform::coordinate_system::{CoordinateSystem, GeoidConfig, GeoidModel, VerticalDatum};

/// Input coordinate units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Units {
    #[value(name = "mm")]
    Millimeters,
    #[value(name = "cm")]
    Centimeters,
    #[value(name = "m")]
    Meters,
    #[value(name = "ft")]
    Feet,
    #[value(name = "in")]
    Inches,
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Units::Millimeters => write!(f, "mm"),
            Units::Centimeters => write!(f, "cm"),
            Units::Meters => write!(f, "m"),
            Units::Feet => write!(f, "ft"),
            Units::Inches => write!(f, "in"),
        }
    }
}

/// Output texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TextureFormat {
    #[value(name = "webp")]
    WebP,
    #[value(name = "ktx2")]
    Ktx2,
    #[value(name = "original")]
    Original,
}

impl std::fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureFormat::WebP => write!(f, "webp"),
            TextureFormat::Ktx2 => write!(f, "ktx2"),
            TextureFormat::Original => write!(f, "original"),
        }
    }
}

/// Georeferencing parameters detected from the CLI, `metadata.xml`, or
/// `offset.xyz` + `.prj`.
///
/// `easting`/`northing`/`elevation` mean the projected origin for an
/// EPSG/WKT system, or the metric SRSOrigin offset for an ENU system
/// (signaled by `builtin_geo_anchor` being set).
#[derive(Debug, Clone, Default)]
pub struct Georeference {
    pub epsg: u32,
    pub wkt: Option<String>,
    pub easting: f64,
    pub northing: f64,
    pub elevation: f64,
    pub true_north: f64,
    pub vertical_datum: VerticalDatum,
    /// `(lon°, lat°, height_m)` when the source declares its own
    /// geographic anchor alongside a metric SRSOrigin offset (the
    /// Agisoft/DJI `metadata.xml` ENU case).
    pub builtin_geo_anchor: Option<(f64, f64, f64)>,
}

impl Georeference {
    /// Build the `CoordinateSystem` this georeference describes.
    pub fn to_coordinate_system(&self) -> CoordinateSystem {
        if let Some((lon, lat, height)) = self.builtin_geo_anchor {
            return CoordinateSystem::enu(lon, lat, height, self.easting, self.northing, self.elevation);
        }
        if let Some(wkt) = &self.wkt {
            return CoordinateSystem::wkt_with_datum(
                wkt.clone(),
                self.easting,
                self.northing,
                self.elevation,
                self.vertical_datum,
            );
        }
        if self.epsg != 0 {
            return CoordinateSystem::epsg_with_datum(
                self.epsg,
                self.easting,
                self.northing,
                self.elevation,
                self.vertical_datum,
            );
        }
        CoordinateSystem::unknown()
    }
}

/// Tiling parameters.
#[derive(Debug, Clone)]
pub struct TilingConfig {
    pub max_triangles_per_tile: usize,
    pub max_depth: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            max_triangles_per_tile: 65_000,
            max_depth: 6,
        }
    }
}

/// Texture processing parameters.
#[derive(Debug, Clone)]
pub struct TextureConfig {
    pub format: TextureFormat,
    pub quality: u8,
    pub max_size: u32,
    pub enabled: bool,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            format: TextureFormat::WebP,
            quality: 85,
            max_size: 2048,
            enabled: true,
        }
    }
}

/// Draco compression parameters.
#[derive(Debug, Clone)]
pub struct DracoConfig {
    pub enabled: bool,
    pub level: u8,
}

impl Default for DracoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 7,
        }
    }
}

/// Fully resolved pipeline configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub units: Option<Units>,
    pub georeference: Option<Georeference>,
    pub offset_file: Option<PathBuf>,
    pub metadata_xml: Option<PathBuf>,
    pub tiling: TilingConfig,
    pub texture: TextureConfig,
    pub draco: DracoConfig,
    pub validate: bool,
    pub dry_run: bool,
    pub show_georef: bool,
    pub verbose: bool,
    pub threads: Option<usize>,
    pub geoid: GeoidConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            units: None,
            georeference: None,
            offset_file: None,
            metadata_xml: None,
            tiling: TilingConfig::default(),
            texture: TextureConfig::default(),
            draco: DracoConfig::default(),
            validate: false,
            dry_run: false,
            show_georef: false,
            verbose: false,
            threads: None,
            geoid: GeoidConfig::default(),
        }
    }
}

/// Resolve the geoid data directory: an explicit CLI path, else
/// `$PHOTO_TILER_GEOID_DIR`, else the platform data directory.
fn default_geoid_data_path() -> PathBuf {
    if let Ok(dir) = std::env::var("PHOTO_TILER_GEOID_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("photo-tiler").join("geoid"))
        .unwrap_or_else(|| PathBuf::from("./geoid"))
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "photo-tiler",
    about = "Photogrammetry mesh to OGC 3D Tiles 1.1 converter",
    version
)]
pub struct CliArgs {
    /// Input file (OBJ, glTF, GLB, PLY)
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Input coordinate units
    #[arg(long, value_enum)]
    pub units: Option<Units>,

    /// EPSG code (e.g. 32636)
    #[arg(long)]
    pub epsg: Option<u32>,

    /// WKT string identifying the source CRS (alternative to --epsg)
    #[arg(long)]
    pub wkt: Option<String>,

    /// Vertical datum tag for --epsg/--wkt systems
    #[arg(long, default_value = "ellipsoidal")]
    pub vertical_datum: String,

    /// Origin easting in metres
    #[arg(long)]
    pub easting: Option<f64>,

    /// Origin northing in metres
    #[arg(long)]
    pub northing: Option<f64>,

    /// Origin elevation in metres
    #[arg(long, default_value_t = 0.0)]
    pub elevation: f64,

    /// True north rotation in degrees
    #[arg(long, default_value_t = 0.0)]
    pub true_north: f64,

    /// Path to offset.xyz file
    #[arg(long)]
    pub offset_file: Option<PathBuf>,

    /// Path to metadata.xml file
    #[arg(long)]
    pub metadata_xml: Option<PathBuf>,

    /// Geoid model to apply for orthometric<->ellipsoidal correction
    #[arg(long, default_value = "none")]
    pub geoid_model: String,

    /// Enable geoid correction (requires --geoid-model)
    #[arg(long)]
    pub enable_geoid: bool,

    /// Directory containing geoid grid data files
    #[arg(long)]
    pub geoid_data_path: Option<PathBuf>,

    /// Display detected georeferencing and exit
    #[arg(long)]
    pub show_georef: bool,

    /// Scan input and report stats only
    #[arg(long)]
    pub dry_run: bool,

    /// Max triangles per leaf tile
    #[arg(long, default_value_t = 65_000)]
    pub max_triangles: usize,

    /// Max octree depth
    #[arg(long, default_value_t = 6)]
    pub max_depth: u32,

    /// Disable Draco mesh compression
    #[arg(long)]
    pub no_draco: bool,

    /// Draco compression level (1-10)
    #[arg(long, default_value_t = 7)]
    pub draco_level: u8,

    /// Exclude textures from output
    #[arg(long)]
    pub no_textures: bool,

    /// Texture format: webp, ktx2, or original
    #[arg(long, value_enum, default_value = "webp")]
    pub texture_format: TextureFormat,

    /// Texture compression quality (0-100)
    #[arg(long, default_value_t = 85)]
    pub texture_quality: u8,

    /// Max texture dimension in pixels
    #[arg(long, default_value_t = 2048)]
    pub texture_max_size: u32,

    /// Run tileset validation after conversion
    #[arg(long)]
    pub validate: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for PipelineConfig {
    fn from(args: CliArgs) -> Self {
        let vertical_datum = VerticalDatum::parse(&args.vertical_datum);
        let georeference = if args.epsg.is_some() || args.wkt.is_some() {
            Some(Georeference {
                epsg: args.epsg.unwrap_or(0),
                wkt: args.wkt.clone(),
                easting: args.easting.unwrap_or(0.0),
                northing: args.northing.unwrap_or(0.0),
                elevation: args.elevation,
                true_north: args.true_north,
                vertical_datum,
                builtin_geo_anchor: None,
            })
        } else {
            None
        };

        let geoid_model = GeoidModel::parse(&args.geoid_model);
        let geoid = GeoidConfig {
            enabled: args.enable_geoid,
            model: geoid_model,
            data_path: args.geoid_data_path.unwrap_or_else(default_geoid_data_path),
        };

        PipelineConfig {
            input: args.input,
            output: args.output,
            units: args.units,
            georeference,
            offset_file: args.offset_file,
            metadata_xml: args.metadata_xml,
            tiling: TilingConfig {
                max_triangles_per_tile: args.max_triangles,
                max_depth: args.max_depth,
            },
            texture: TextureConfig {
                format: args.texture_format,
                quality: args.texture_quality,
                max_size: args.texture_max_size,
                enabled: !args.no_textures,
            },
            draco: DracoConfig {
                enabled: !args.no_draco,
                level: args.draco_level,
            },
            validate: args.validate,
            dry_run: args.dry_run,
            show_georef: args.show_georef,
            verbose: args.verbose,
            threads: args.threads,
            geoid,
        }
    }
}
