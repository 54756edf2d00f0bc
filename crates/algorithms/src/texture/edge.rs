//! Sobel edge detection

use crate::maybe_rayon::*;
use geowatch_core::raster::Raster;
use geowatch_core::{Error, Result};

use crate::imagery::build_output;

/// Sobel edge detection.
///
/// Computes gradient magnitude using 3x3 Sobel operators:
/// `G = sqrt(Gx² + Gy²)`
///
/// Border cells and cells with any masked neighbor are NaN, so masked
/// pixels never create artificial edges.
pub fn sobel_edge(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    if rows < 3 || cols < 3 {
        return Err(Error::Algorithm("Sobel requires at least 3x3 raster".into()));
    }

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            if row == 0 || row == rows - 1 {
                return row_data;
            }

            for col in 1..(cols - 1) {
                let mut z = [0.0; 9];
                let mut masked = false;
                for (k, slot) in z.iter_mut().enumerate() {
                    let v = unsafe { raster.get_unchecked(row + k / 3 - 1, col + k % 3 - 1) };
                    if v.is_nan() {
                        masked = true;
                        break;
                    }
                    *slot = v;
                }
                if masked {
                    continue;
                }

                let [z1, z2, z3, z4, _, z6, z7, z8, z9] = z;

                // Sobel Gx: horizontal gradient
                let gx = (z3 + 2.0 * z6 + z9) - (z1 + 2.0 * z4 + z7);
                // Sobel Gy: vertical gradient
                let gy = (z7 + 2.0 * z8 + z9) - (z1 + 2.0 * z2 + z3);

                row_data[col] = (gx * gx + gy * gy).sqrt();
            }

            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Threshold a gradient raster into edge / non-edge cells.
///
/// `None` marks cells where the gradient is undefined.
pub fn edge_mask(gradient: &Raster<f64>, threshold: f64) -> Vec<Option<bool>> {
    gradient
        .data()
        .iter()
        .map(|&g| if g.is_nan() { None } else { Some(g > threshold) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sobel_flat() {
        let r = Raster::filled(5, 5, 100.0);
        let result = sobel_edge(&r).unwrap();
        let v = result.get(2, 2).unwrap();
        assert!(v.abs() < 1e-10, "Flat surface should have zero gradient, got {}", v);
        assert!(result.get(0, 2).unwrap().is_nan());
    }

    #[test]
    fn test_sobel_vertical_step() {
        // Left half 0, right half 10
        let data: Vec<f64> = (0..25).map(|i| if i % 5 >= 3 { 10.0 } else { 0.0 }).collect();
        let r = Raster::from_vec(data, 5, 5).unwrap();
        let result = sobel_edge(&r).unwrap();

        // At col 2 the kernel sees the step: gx = 4 * 10
        assert!((result.get(2, 2).unwrap() - 40.0).abs() < 1e-9);
        assert!(result.get(2, 1).unwrap().abs() < 1e-9);

        let mask = edge_mask(&result, 1.0);
        assert_eq!(mask[2 * 5 + 2], Some(true));
        assert_eq!(mask[2 * 5 + 1], Some(false));
        assert_eq!(mask[0], None);
    }

    #[test]
    fn test_masked_neighbor() {
        let mut r = Raster::filled(4, 4, 1.0);
        r.set(0, 0, f64::NAN).unwrap();
        let result = sobel_edge(&r).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert!(!result.get(2, 2).unwrap().is_nan());
    }

    #[test]
    fn test_too_small() {
        assert!(sobel_edge(&Raster::filled(2, 5, 1.0)).is_err());
    }
}
