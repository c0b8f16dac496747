//! Projected chip windows
//!
//! `buffer_meters` is a half-extent: it covers half the output width (and
//! height) in ground units, so the ground resolution is
//! `buffer / (width / 2)` per axis.

use crate::coordinate::{BoundingBox, CoordinateSystem, CoordinateTransformer, GeoTransform, Point};
use crate::error::{ChipError, ChipResult};
use crate::mosaic::SampleGrid;

/// A chip window in the mosaic's projected coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipWindow {
    /// Chip centre in projected coordinates
    pub center: Point,
    pub epsg: u32,
    pub x_res: f64,
    pub y_res: f64,
    /// Upper-left corner
    pub ulx: f64,
    pub uly: f64,
    /// Lower-right corner
    pub lrx: f64,
    pub lry: f64,
    pub width: u32,
    pub height: u32,
}

impl ChipWindow {
    /// Window of `width` x `height` pixels centred on a projected point
    pub fn around(center: Point, epsg: u32, buffer_meters: f64, width: u32, height: u32) -> ChipResult<Self> {
        if width == 0 || height == 0 || !(buffer_meters > 0.0) {
            return Err(ChipError::InvalidInput(format!(
                "Invalid window: {}x{} px with buffer {}", width, height, buffer_meters
            )));
        }
        if !center.is_finite() {
            return Err(ChipError::Projection(format!("Non-finite chip centre {:?}", center)));
        }

        let x_res = buffer_meters / (width as f64 / 2.0);
        let y_res = buffer_meters / (height as f64 / 2.0);
        let half_width = width as f64 * x_res / 2.0;
        let half_height = height as f64 * y_res / 2.0;

        Ok(ChipWindow {
            center,
            epsg,
            x_res,
            y_res,
            ulx: center.x - half_width,
            uly: center.y + half_height,
            lrx: center.x + half_width,
            lry: center.y - half_height,
            width,
            height,
        })
    }

    /// Project a WGS84 point into `epsg` and build the window around it
    pub fn for_lon_lat(
        transformer: &CoordinateTransformer,
        lon: f64,
        lat: f64,
        epsg: u32,
        buffer_meters: f64,
        width: u32,
        height: u32,
    ) -> ChipResult<Self> {
        if !(lon.is_finite() && lat.is_finite()) {
            return Err(ChipError::InvalidInput(format!("Invalid coordinates ({}, {})", lon, lat)));
        }
        let center = transformer.transform_point(
            &Point::new(lon, lat),
            &CoordinateSystem::WGS84,
            &CoordinateSystem::from_epsg(epsg),
        )?;
        Self::around(center, epsg, buffer_meters, width, height)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.ulx, self.lry, self.lrx, self.uly)
    }

    pub fn geotransform(&self) -> GeoTransform {
        GeoTransform::north_up(self.ulx, self.uly, self.x_res, self.y_res)
    }

    /// Output pixel grid for sampling the mosaic
    pub fn sample_grid(&self) -> SampleGrid {
        SampleGrid {
            origin_x: self.ulx,
            origin_y: self.uly,
            x_res: self.x_res,
            y_res: self.y_res,
            width: self.width,
            height: self.height,
        }
    }

    /// The six world-file parameters
    ///
    /// Pixel sizes, rotations, then the centre of the upper-left pixel.
    pub fn world_file_params(&self) -> [f64; 6] {
        [
            self.x_res,
            0.0,
            0.0,
            -self.y_res,
            self.ulx + self.x_res / 2.0,
            self.uly - self.y_res / 2.0,
        ]
    }
}
