//! Coordinate handling for geospatial data
//!
//! Points, extents, affine raster transforms and EPSG point transforms.

mod bbox;
mod crs;
mod geotransform;
mod point;
mod transform;

pub use self::bbox::BoundingBox;
pub use self::crs::CoordinateSystem;
pub use self::geotransform::GeoTransform;
pub use self::point::Point;
pub use self::transform::CoordinateTransformer;
