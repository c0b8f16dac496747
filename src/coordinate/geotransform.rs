//! Affine pixel-to-map transform in the GDAL six-coefficient layout

use super::bbox::BoundingBox;
use super::point::Point;

/// Affine transform `x = ox + col*pw + row*rr`, `y = oy + col*cr + row*ph`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(
        origin_x: f64,
        pixel_width: f64,
        row_rotation: f64,
        origin_y: f64,
        col_rotation: f64,
        pixel_height: f64,
    ) -> Self {
        GeoTransform { origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height }
    }

    /// North-up transform with the given upper-left corner and pixel sizes
    pub fn north_up(origin_x: f64, origin_y: f64, x_res: f64, y_res: f64) -> Self {
        GeoTransform::new(origin_x, x_res, 0.0, origin_y, 0.0, -y_res.abs())
    }

    pub fn from_array(gt: [f64; 6]) -> Self {
        GeoTransform::new(gt[0], gt[1], gt[2], gt[3], gt[4], gt[5])
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, self.row_rotation,
         self.origin_y, self.col_rotation, self.pixel_height]
    }

    /// Whether the raster rows are aligned with the map axes
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    /// Map coordinates of a (fractional) pixel position
    pub fn pixel_to_world(&self, col: f64, row: f64) -> Point {
        Point::new(
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of map coordinates
    ///
    /// Returns `None` when the transform is singular.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (dx * self.pixel_height - dy * self.row_rotation) / det;
        let row = (dy * self.pixel_width - dx * self.col_rotation) / det;
        Some((col, row))
    }

    /// Map extent of a raster of the given size
    pub fn bounds(&self, width: u64, height: u64) -> BoundingBox {
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(width as f64, 0.0),
            self.pixel_to_world(0.0, height as f64),
            self.pixel_to_world(width as f64, height as f64),
        ];
        let mut bbox = BoundingBox::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for corner in &corners[1..] {
            bbox = bbox.union(&BoundingBox::new(corner.x, corner.y, corner.x, corner.y));
        }
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_world_round_trip() {
        let gt = GeoTransform::north_up(399960.0, 4000020.0, 10.0, 10.0);
        let p = gt.pixel_to_world(12.5, 3.5);
        assert_eq!(p, Point::new(400085.0, 3999985.0));
        let (col, row) = gt.world_to_pixel(p.x, p.y).unwrap();
        assert!((col - 12.5).abs() < 1e-9 && (row - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_and_singular() {
        let gt = GeoTransform::north_up(0.0, 100.0, 2.0, 4.0);
        assert_eq!(gt.bounds(10, 5), BoundingBox::new(0.0, 80.0, 20.0, 100.0));
        assert!(GeoTransform::from_array([0.0; 6]).world_to_pixel(1.0, 1.0).is_none());
    }
}
