use nalgebra::{DMatrix, DVector};

use crate::error::PairsTradingError;
use crate::PairsTradingResult;

/// Fitted ordinary-least-squares regression.
///
/// Parameter order follows the regressor columns passed to [`fit`]; when
/// a constant is requested it is appended as the final parameter.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Sum of squared residuals
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    /// t-statistic of parameter `i`. Returns 0 for a degenerate (zero)
    /// standard error so a perfect fit never produces an infinite
    /// statistic downstream.
    pub fn t_stat(&self, i: usize) -> f64 {
        let se = self.std_errors[i];
        if se > 0.0 {
            self.params[i] / se
        } else {
            0.0
        }
    }

    /// Akaike information criterion up to an additive constant shared by
    /// models fit on the same sample: n·ln(ssr/n) + 2k. Used only to
    /// compare lag candidates, so the constant is irrelevant.
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let k = self.params.len() as f64;
        if self.ssr <= 0.0 {
            return f64::NEG_INFINITY;
        }
        n * (self.ssr / n).ln() + 2.0 * k
    }
}

/// Fit `y` on the given regressor columns, optionally with a constant
/// term (appended last). All columns must have the same length as `y`.
pub fn fit(y: &[f64], columns: &[&[f64]], constant: bool) -> PairsTradingResult<OlsFit> {
    let n = y.len();
    for column in columns {
        if column.len() != n {
            return Err(PairsTradingError::DimensionMismatch {
                left: n,
                right: column.len(),
            });
        }
    }
    let k = columns.len() + usize::from(constant);
    if n <= k {
        return Err(PairsTradingError::InsufficientData(format!(
            "OLS needs more than {} observations for {} parameters, got {}",
            k, k, n
        )));
    }

    let x = DMatrix::from_fn(n, k, |row, col| {
        if col < columns.len() {
            columns[col][row]
        } else {
            1.0
        }
    });
    let y_vec = DVector::from_column_slice(y);

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y_vec;
    let xtx_inv = xtx.try_inverse().ok_or_else(|| PairsTradingError::Numerical {
        context: "OLS normal equations are singular".into(),
    })?;
    let beta = &xtx_inv * xty;

    let fitted = &x * &beta;
    let residuals: Vec<f64> = (&y_vec - fitted).iter().copied().collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma2 = ssr / (n - k) as f64;
    let std_errors: Vec<f64> = (0..k)
        .map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt())
        .collect();

    Ok(OlsFit {
        params: beta.iter().copied().collect(),
        std_errors,
        residuals,
        ssr,
        nobs: n,
    })
}
