//! Region structure for defining a pixel window
//!
//! Coordinates are in pixels with (0,0) at the top-left corner of the image.

/// Rectangular pixel window of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// X-coordinate of the top-left corner (pixels from left)
    pub x: u32,

    /// Y-coordinate of the top-left corner (pixels from top)
    pub y: u32,

    /// Width of the region in pixels
    pub width: u32,

    /// Height of the region in pixels
    pub height: u32,
}

impl Region {
    /// Create a new region
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Region { x, y, width, height }
    }

    /// Get the rightmost X coordinate (exclusive)
    pub fn end_x(&self) -> u32 {
        self.x + self.width
    }

    /// Get the bottommost Y coordinate (exclusive)
    pub fn end_y(&self) -> u32 {
        self.y + self.height
    }

    /// Number of pixels covered
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Region spanning the pixel range `[min, max)` in floating point pixel
    /// space, clipped to an image of the given size
    ///
    /// Returns `None` when nothing of the range falls inside the image.
    pub fn from_pixel_bounds(
        min_col: f64,
        min_row: f64,
        max_col: f64,
        max_row: f64,
        width: u32,
        height: u32,
    ) -> Option<Region> {
        let x0 = min_col.floor().max(0.0);
        let y0 = min_row.floor().max(0.0);
        let x1 = max_col.ceil().min(width as f64);
        let y1 = max_row.ceil().min(height as f64);
        if !(x0 < x1 && y0 < y1) {
            return None;
        }
        Some(Region::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}
