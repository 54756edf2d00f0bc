//! Ridge regression on standardized features
//!
//! Features are centered and scaled to unit variance, the target is
//! centered, and `(ZᵀZ + λI)β = Zᵀ(y - ȳ)` is solved by Gaussian
//! elimination with partial pivoting. The intercept is `ȳ` and is never
//! penalized. Constant features get a zero coefficient.

use geowatch_core::{Error, Result};

const FLAT_STD: f64 = 1e-12;

/// A fitted ridge model in standardized space
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl RidgeFit {
    /// Predict for a raw (unstandardized) feature vector
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + features
                .iter()
                .zip(self.coefficients.iter())
                .zip(self.means.iter().zip(self.stds.iter()))
                .map(|((x, b), (m, s))| if *s < FLAT_STD { 0.0 } else { b * (x - m) / s })
                .sum::<f64>()
    }
}

/// Fit ridge regression.
///
/// # Arguments
/// * `samples` - One feature vector per sample, all the same length
/// * `targets` - One target per sample
/// * `lambda` - L2 penalty on standardized coefficients (> 0)
pub fn fit_ridge(samples: &[Vec<f64>], targets: &[f64], lambda: f64) -> Result<RidgeFit> {
    if samples.is_empty() || samples.len() != targets.len() {
        return Err(Error::Algorithm(format!(
            "ridge: {} samples for {} targets",
            samples.len(),
            targets.len()
        )));
    }
    if lambda.is_nan() || lambda <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "ridge_lambda",
            value: lambda.to_string(),
            reason: "must be positive".into(),
        });
    }

    let p = samples[0].len();
    if samples.iter().any(|s| s.len() != p) {
        return Err(Error::Algorithm("ridge: ragged feature vectors".into()));
    }

    let n = samples.len() as f64;
    let mut means = vec![0.0; p];
    for s in samples {
        for (m, x) in means.iter_mut().zip(s) {
            *m += x / n;
        }
    }
    let mut stds = vec![0.0; p];
    for s in samples {
        for j in 0..p {
            stds[j] += (s[j] - means[j]).powi(2) / n;
        }
    }
    for s in &mut stds {
        *s = s.sqrt();
    }

    let y_mean = targets.iter().sum::<f64>() / n;

    let z = |s: &[f64], j: usize| -> f64 {
        if stds[j] < FLAT_STD {
            0.0
        } else {
            (s[j] - means[j]) / stds[j]
        }
    };

    // Normal equations (ZᵀZ + λI) β = Zᵀ(y - ȳ)
    let mut mat = vec![0.0; p * p];
    let mut rhs = vec![0.0; p];
    for (s, y) in samples.iter().zip(targets) {
        for i in 0..p {
            let zi = z(s, i);
            rhs[i] += zi * (y - y_mean);
            for j in 0..p {
                mat[i * p + j] += zi * z(s, j);
            }
        }
    }
    for i in 0..p {
        mat[i * p + i] += lambda;
    }

    let coefficients = solve(mat, rhs, p)?;

    Ok(RidgeFit {
        coefficients,
        intercept: y_mean,
        means,
        stds,
    })
}

/// Solve a dense `n`×`n` system in place
fn solve(mut mat: Vec<f64>, mut rhs: Vec<f64>, n: usize) -> Result<Vec<f64>> {
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < 1e-14 {
            return Err(Error::Algorithm("ridge: singular system".into()));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut beta = vec![0.0; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * beta[j];
        }
        beta[col] = sum / mat[col * n + col];
    }

    Ok(beta)
}
