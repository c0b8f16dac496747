//! Coordinate transformation functionality
//!
//! Point transforms between any two EPSG coordinate systems, backed by the
//! pure-Rust `proj4rs` projection library and its bundled EPSG definitions.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::crs::CoordinateSystem;
use super::point::Point;
use crate::error::{ChipError, ChipResult};

/// Transformer for converting between coordinate systems
///
/// Projections are resolved from EPSG codes on each call, so the
/// transformer holds no state and can be shared across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoordinateTransformer;

impl CoordinateTransformer {
    pub fn new() -> Self {
        CoordinateTransformer
    }

    /// Projection definition for a coordinate system
    fn projection(crs: &CoordinateSystem) -> ChipResult<Proj> {
        let code = crs.epsg_code();
        let code = u16::try_from(code)
            .map_err(|_| ChipError::Projection(format!("EPSG:{} is outside the EPSG code range", code)))?;
        Proj::from_epsg_code(code)
            .map_err(|e| ChipError::Projection(format!("Unsupported coordinate system EPSG:{}: {:?}", code, e)))
    }

    /// Transform a point between coordinate systems
    ///
    /// Geographic coordinates are longitude/latitude in degrees, projected
    /// ones are in the system's linear unit.
    ///
    /// # Arguments
    /// * `point` - Point in `from_crs`
    /// * `from_crs` - Coordinate system of the input point
    /// * `to_crs` - Coordinate system to transform into
    ///
    /// # Returns
    /// The transformed point, or a projection error when either system is
    /// unknown or the point cannot be projected
    pub fn transform_point(&self, point: &Point, from_crs: &CoordinateSystem, to_crs: &CoordinateSystem) -> ChipResult<Point> {
        if from_crs == to_crs {
            return Ok(*point);
        }
        if !point.is_finite() {
            return Err(ChipError::Projection(format!("Non-finite coordinate ({}, {})", point.x, point.y)));
        }

        let source = Self::projection(from_crs)?;
        let target = Self::projection(to_crs)?;

        // proj4rs works in radians for geographic systems
        let mut xyz = if source.is_latlong() {
            (point.x.to_radians(), point.y.to_radians(), 0.0)
        } else {
            (point.x, point.y, 0.0)
        };

        transform(&source, &target, &mut xyz).map_err(|e| ChipError::Projection(format!(
            "({}, {}) cannot be transformed from {} to {}: {:?}",
            point.x, point.y, from_crs.description(), to_crs.description(), e
        )))?;

        let result = if target.is_latlong() {
            Point::new(xyz.0.to_degrees(), xyz.1.to_degrees())
        } else {
            Point::new(xyz.0, xyz.1)
        };
        if !result.is_finite() {
            return Err(ChipError::Projection(format!(
                "({}, {}) has no finite position in {}", point.x, point.y, to_crs.description()
            )));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!((actual - expected).abs() <= tolerance, "{} != {} (±{})", actual, expected, tolerance);
    }

    fn to_epsg(lon: f64, lat: f64, epsg: u32) -> ChipResult<Point> {
        CoordinateTransformer::new().transform_point(
            &Point::new(lon, lat),
            &CoordinateSystem::WGS84,
            &CoordinateSystem::from_epsg(epsg),
        )
    }

    #[test]
    fn test_utm_origin_on_central_meridian() {
        let p = to_epsg(3.0, 0.0, 32631).unwrap();
        assert_close(p.x, 500_000.0, 1e-3);
        assert_close(p.y, 0.0, 1e-3);

        let south = to_epsg(3.0, 0.0, 32731).unwrap();
        assert_close(south.y, 10_000_000.0, 1e-3);
    }

    #[test]
    fn test_utm_reference_points() {
        // Eiffel Tower, zone 31N
        let p = to_epsg(2.2945, 48.8582, 32631).unwrap();
        assert_close(p.x, 448_251.8, 0.1);
        assert_close(p.y, 5_411_932.7, 0.1);

        let p = to_epsg(139.0, 36.0, 32654).unwrap();
        assert_close(p.x, 319_733.34, 0.01);
        assert_close(p.y, 3_985_798.21, 0.01);
    }

    #[test]
    fn test_web_mercator() {
        let p = to_epsg(180.0, 0.0, 3857).unwrap();
        assert_close(p.x, std::f64::consts::PI * 6_378_137.0, 1e-3);
        assert_close(p.y, 0.0, 1e-3);
    }

    #[test]
    fn test_round_trip_to_wgs84() {
        let t = CoordinateTransformer::new();
        let wgs = CoordinateSystem::WGS84;
        for &(lon, lat, epsg) in &[(139.0, 36.0, 32654u32), (-70.5, -33.4, 32719), (10.0, 52.0, 3035)] {
            let crs = CoordinateSystem::from_epsg(epsg);
            let p = t.transform_point(&Point::new(lon, lat), &wgs, &crs).unwrap();
            let back = t.transform_point(&p, &crs, &wgs).unwrap();
            assert_close(back.x, lon, 1e-7);
            assert_close(back.y, lat, 1e-7);
        }
    }

    #[test]
    fn test_non_utm_projections() {
        // ETRS89 / LAEA Europe: false origin at 10E 52N
        let p = to_epsg(10.0, 52.0, 3035).unwrap();
        assert_close(p.x, 4_321_000.0, 0.1);
        assert_close(p.y, 3_210_000.0, 0.1);

        // Antarctic polar stereographic and UPS North
        assert!(to_epsg(0.0, -80.0, 3031).is_ok());
        assert!(to_epsg(0.0, 85.0, 32661).is_ok());
    }

    #[test]
    fn test_unknown_codes_are_errors() {
        assert!(to_epsg(0.0, 0.0, 999_999).is_err());
        assert!(to_epsg(0.0, 0.0, 1).is_err());
        assert!(to_epsg(f64::NAN, 0.0, 32631).is_err());
    }
}
