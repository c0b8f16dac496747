//! GeoJSON point dataset ingestion

use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{ChipError, ChipResult};

use super::geometry::{Geometry, InputFeature};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    crs: Option<Value>,
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

/// Identifier of a feature as text; numeric identifiers are stringified
fn feature_id(properties: Option<&Map<String, Value>>, id_property: &str) -> Option<String> {
    match properties?.get(id_property)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a GeoJSON FeatureCollection
///
/// `limit` keeps only the first features of the collection. Every kept
/// feature must carry `id_property` as a string or number.
pub fn parse_features(json: &str, id_property: &str, limit: Option<usize>) -> ChipResult<Vec<InputFeature>> {
    let collection: FeatureCollection = serde_json::from_str(json)?;

    match &collection.crs {
        Some(crs) => info!("CRS: {}", crs),
        None => info!("CRS: EPSG:4326 (GeoJSON default)"),
    }

    let total = collection.features.len();
    let keep = limit.unwrap_or(total).min(total);
    if keep < total {
        info!("Keeping the first {} of {} features", keep, total);
    }

    collection.features.into_iter()
        .take(keep)
        .enumerate()
        .map(|(index, raw)| {
            let id = feature_id(raw.properties.as_ref(), id_property).ok_or_else(|| {
                ChipError::InvalidInput(format!("Feature {} has no usable '{}' property", index, id_property))
            })?;
            Ok(InputFeature { id, geometry: raw.geometry })
        })
        .collect()
}

/// Load the features of a GeoJSON file
pub fn load_features<P: AsRef<Path>>(path: P, id_property: &str, limit: Option<usize>) -> ChipResult<Vec<InputFeature>> {
    let path = path.as_ref();
    debug!("Reading points from {}", path.display());
    let json = fs::read_to_string(path)?;
    let features = parse_features(&json, id_property, limit)?;
    info!("Loaded {} features from {}", features.len(), path.display());
    Ok(features)
}
