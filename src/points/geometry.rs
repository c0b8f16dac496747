//! GeoJSON geometries and points of interest

use serde::Deserialize;

use crate::coordinate::Point;
use crate::error::{ChipError, ChipResult};

/// A GeoJSON position: longitude, latitude and optional extra ordinates
pub type Position = Vec<f64>;

/// The GeoJSON geometry types
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// GeoJSON type name
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
            Geometry::GeometryCollection { .. } => "GeometryCollection",
        }
    }
}

/// A point the chips are centred on
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    /// Unique identifier, used in output names
    pub id: String,
    pub lon: f64,
    pub lat: f64,
}

impl PointOfInterest {
    pub fn new(id: &str, lon: f64, lat: f64) -> ChipResult<Self> {
        if !(lon.is_finite() && lat.is_finite()) {
            return Err(ChipError::InvalidInput(format!("Point {} has non-finite coordinates", id)));
        }
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(ChipError::InvalidInput(format!(
                "Point {} at ({}, {}) is outside WGS84 bounds", id, lon, lat
            )));
        }
        Ok(PointOfInterest { id: id.to_string(), lon, lat })
    }

    pub fn location(&self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

/// One input feature: its identifier and geometry
#[derive(Debug, Clone, PartialEq)]
pub struct InputFeature {
    pub id: String,
    /// `None` for features with a null geometry
    pub geometry: Option<Geometry>,
}

impl InputFeature {
    /// The feature as a point of interest
    ///
    /// Anything other than a single `Point` is rejected.
    pub fn to_point(&self) -> ChipResult<PointOfInterest> {
        match &self.geometry {
            Some(Geometry::Point { coordinates }) if coordinates.len() >= 2 => {
                PointOfInterest::new(&self.id, coordinates[0], coordinates[1])
            }
            Some(Geometry::Point { .. }) => Err(ChipError::InvalidInput(format!(
                "Point {} needs at least two coordinates", self.id
            ))),
            Some(other) => Err(ChipError::InvalidGeometry {
                id: self.id.clone(),
                kind: other.kind().to_string(),
            }),
            None => Err(ChipError::InvalidGeometry { id: self.id.clone(), kind: "null".to_string() }),
        }
    }
}
