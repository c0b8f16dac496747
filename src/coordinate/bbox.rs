//! Bounding box structure for defining regions

/// An axis-aligned bounding box in a coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box, ordering the corners
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Get the width of the bounding box
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Get the height of the bounding box
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether the two boxes share a region of non-zero area
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x && other.min_x < self.max_x &&
            self.min_y < other.max_y && other.min_y < self.max_y
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, -5.0, 20.0, 5.0);
        let c = BoundingBox::new(10.0, 0.0, 12.0, 10.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c), "edge contact has no area");
        assert_eq!(a.union(&b), BoundingBox::new(0.0, -5.0, 20.0, 10.0));
    }

    #[test]
    fn test_corners_are_ordered() {
        let bbox = BoundingBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(bbox, BoundingBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(bbox.width(), 10.0);
        assert_eq!(bbox.height(), 15.0);
    }
}
