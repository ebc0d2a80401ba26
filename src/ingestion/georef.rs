use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::{Georeference, PipelineConfig};
use crate::error::{PhotoTilerError, Result};

/// Detect georeferencing from CLI overrides, metadata files, or project files.
///
/// Priority: CLI override > metadata.xml > offset.xyz + .prj > none
pub fn detect_georeference(config: &PipelineConfig) -> Result<Option<Georeference>> {
    // 1. CLI override (already resolved in config)
    if config.georeference.is_some() {
        debug!("Using CLI-provided georeference");
        return Ok(config.georeference.clone());
    }

    let input_dir = config
        .input
        .parent()
        .unwrap_or_else(|| Path::new("."));

    // 2. metadata.xml
    let xml_path = config
        .metadata_xml
        .clone()
        .or_else(|| {
            let candidate = input_dir.join("metadata.xml");
            candidate.exists().then_some(candidate)
        });
    if let Some(ref path) = xml_path {
        debug!(path = %path.display(), "Checking metadata.xml");
        if let Some(georef) = parse_metadata_xml(path)? {
            return Ok(Some(georef));
        }
    }

    // 3. offset.xyz + optional .prj
    let offset_path = config
        .offset_file
        .clone()
        .or_else(|| {
            let candidate = input_dir.join("offset.xyz");
            candidate.exists().then_some(candidate)
        });
    if let Some(ref path) = offset_path {
        debug!(path = %path.display(), "Checking offset.xyz");
        let (easting, northing, elevation) = parse_offset_xyz(path)?;
        let epsg = find_prj_epsg(input_dir).unwrap_or(0);
        return Ok(Some(Georeference {
            epsg,
            easting,
            northing,
            elevation,
            ..Default::default()
        }));
    }

    debug!("No georeference detected");
    Ok(None)
}

/// Parse an `offset.xyz` file containing `easting northing elevation`.
pub fn parse_offset_xyz(path: &Path) -> Result<(f64, f64, f64)> {
    let content = fs::read_to_string(path).map_err(|e| {
        PhotoTilerError::Georeference(format!("Failed to read offset.xyz: {e}"))
    })?;

    let values: Vec<f64> = content
        .split_whitespace()
        .filter_map(|s| s.parse::<f64>().ok())
        .collect();

    if values.len() < 3 {
        return Err(PhotoTilerError::Georeference(format!(
            "offset.xyz must contain at least 3 numeric values, found {}",
            values.len()
        )));
    }

    Ok((values[0], values[1], values[2]))
}

/// Extract EPSG code and offset from Agisoft/DJI metadata XML.
///
/// If the XML additionally carries an integer `<SRSOrigin>x,y,z</SRSOrigin>`
/// offset alongside geographic origin tags (`<Latitude>`, `<Longitude>`,
/// `<AltitudeOffset>`), this reports an ENU coordinate system (built-in
/// geo-reference + offset) instead of an EPSG one -- see SPEC_FULL.md §3.
pub fn parse_metadata_xml(path: &Path) -> Result<Option<Georeference>> {
    let content = fs::read_to_string(path).map_err(|e| {
        PhotoTilerError::Georeference(format!("Failed to read metadata.xml: {e}"))
    })?;

    if let Some((lon, lat, height, offset)) = extract_srs_origin_enu(&content) {
        debug!(lon, lat, height, ?offset, "Found SRSOrigin ENU anchor in metadata.xml");
        return Ok(Some(Georeference {
            easting: offset[0],
            northing: offset[1],
            elevation: offset[2],
            builtin_geo_anchor: Some((lon, lat, height)),
            ..Default::default()
        }));
    }

    if let Some(epsg) = extract_epsg_from_string(&content) {
        debug!(epsg, "Found EPSG in metadata.xml");
        return Ok(Some(Georeference {
            epsg,
            ..Default::default()
        }));
    }

    warn!("metadata.xml found but no EPSG code or SRSOrigin detected");
    Ok(None)
}

/// Extract `(lon°, lat°, height_m, [offset_x, offset_y, offset_z])` from an
/// Agisoft/DJI-style metadata block carrying both a `<SRSOrigin>` metric
/// offset and geographic origin tags. Returns `None` unless all four
/// values are present and parse cleanly.
fn extract_srs_origin_enu(content: &str) -> Option<(f64, f64, f64, [f64; 3])> {
    let offset_str = extract_tag_text(content, "SRSOrigin")?;
    let offset: Vec<f64> = offset_str.split(',').filter_map(|s| s.trim().parse::<f64>().ok()).collect();
    if offset.len() < 3 {
        return None;
    }

    let lat = extract_tag_text(content, "Latitude")?.trim().parse::<f64>().ok()?;
    let lon = extract_tag_text(content, "Longitude")?.trim().parse::<f64>().ok()?;
    let height = extract_tag_text(content, "AltitudeOffset")
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    Some((lon, lat, height, [offset[0], offset[1], offset[2]]))
}

/// Extract the text content of the first `<tag>...</tag>` occurrence.
fn extract_tag_text<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = content.find(&open)? + open.len();
    let end = content[start..].find(&close)? + start;
    Some(content[start..end].trim())
}

/// Scan a directory for `.prj` files and extract an EPSG code.
pub fn find_prj_epsg(dir: &Path) -> Result<u32> {
    let entries = fs::read_dir(dir).map_err(|e| {
        PhotoTilerError::Georeference(format!("Failed to read directory {}: {e}", dir.display()))
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("prj") {
            debug!(path = %path.display(), "Found .prj file");
            let content = fs::read_to_string(&path).map_err(|e| {
                PhotoTilerError::Georeference(format!("Failed to read .prj file: {e}"))
            })?;
            if let Some(epsg) = extract_epsg_from_string(&content) {
                return Ok(epsg);
            }
        }
    }

    Err(PhotoTilerError::Georeference(
        "No .prj file with EPSG code found".into(),
    ))
}

/// Extract an EPSG code from a string.
///
/// Matches patterns:
/// - `EPSG:12345`
/// - `EPSG::12345`
/// - WKT `AUTHORITY["EPSG","12345"]`
pub fn extract_epsg_from_string(content: &str) -> Option<u32> {
    // Pattern 1: EPSG:12345 or EPSG::12345
    if let Some(pos) = content.find("EPSG:") {
        let after = &content[pos + 5..];
        // Skip optional second colon
        let after = after.strip_prefix(':').unwrap_or(after);
        let num_str: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(epsg) = num_str.parse::<u32>() {
            if epsg > 0 {
                return Some(epsg);
            }
        }
    }

    // Pattern 2: AUTHORITY["EPSG","12345"]
    if let Some(pos) = content.find("AUTHORITY[\"EPSG\"") {
        let after = &content[pos..];
        // Find the second quoted number
        if let Some(comma_pos) = after.find(',') {
            let after_comma = &after[comma_pos + 1..];
            let num_str: String = after_comma
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(epsg) = num_str.parse::<u32>() {
                if epsg > 0 {
                    return Some(epsg);
                }
            }
        }
    }

    None
}
