//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

use super::Extent;

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Imagery handed to the engine is expected north-up: both rotations are
/// zero and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform whose upper-left corner sits at the top-left of `extent`
    pub fn for_extent(extent: &Extent, cell_size: f64) -> Self {
        Self::new(extent.min_x, extent.max_y, cell_size, -cell_size)
    }

    /// Map coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the pixel's upper-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert map coordinates to fractional pixel coordinates (col, row)
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Whether this is a north-up transform (no rotation, rows run south)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_width > 0.0
            && self.pixel_height < 0.0
    }

    /// Extent covered by a grid of `rows` x `cols` cells
    pub fn extent(&self, rows: usize, cols: usize) -> Extent {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(cols, 0),
            self.pixel_to_geo_corner(0, rows),
            self.pixel_to_geo_corner(cols, rows),
        ];

        let mut out = Extent::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            out.min_x = out.min_x.min(x);
            out.max_x = out.max_x.max(x);
            out.min_y = out.min_y.min(y);
            out.max_y = out.max_y.max(y);
        }
        out
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_extent() {
        let gt = GeoTransform::new(0.0, 100.0, 2.0, -2.0);
        let e = gt.extent(50, 25);

        assert_relative_eq!(e.min_x, 0.0);
        assert_relative_eq!(e.max_x, 50.0);
        assert_relative_eq!(e.min_y, 0.0);
        assert_relative_eq!(e.max_y, 100.0);
    }

    #[test]
    fn test_for_extent_is_north_up() {
        let gt = GeoTransform::for_extent(&Extent::new(10.0, 20.0, 30.0, 40.0), 5.0);
        assert!(gt.is_north_up());
        assert_eq!(gt.pixel_to_geo_corner(0, 0), (10.0, 40.0));
    }

    #[test]
    fn test_rotated_is_not_north_up() {
        let mut gt = GeoTransform::new(0.0, 0.0, 1.0, -1.0);
        gt.row_rotation = 0.3;
        assert!(!gt.is_north_up());
    }
}
