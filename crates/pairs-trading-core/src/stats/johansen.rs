use nalgebra::{Matrix2, Vector2};

use crate::error::PairsTradingError;
use crate::stats::{mean, CriticalValues};
use crate::PairsTradingResult;

/// Osterwald-Lenum trace-statistic critical values for the r = 0
/// hypothesis in a two-variable system with a constant deterministic
/// term. Unlike the Dickey-Fuller tau values these are positive: the
/// trace statistic exceeds them from above.
const TRACE_CRIT_R0: CriticalValues = CriticalValues {
    pct1: 19.9349,
    pct5: 15.4943,
    pct10: 13.4294,
};

const MIN_OBSERVATIONS: usize = 12;

/// Johansen trace test result for the two-column system.
#[derive(Debug, Clone)]
pub struct JohansenResult {
    /// Trace statistic for the r = 0 (no cointegration) hypothesis.
    pub trace_statistic: f64,
    /// Generalized eigenvalues, descending.
    pub eigenvalues: [f64; 2],
    /// Eigenvector of the dominant eigenvalue, ordered (a, b); the
    /// hedge ratio is |v_a / v_b|.
    pub eigenvector: [f64; 2],
    pub critical_values: CriticalValues,
}

impl JohansenResult {
    pub fn hedge_ratio(&self) -> PairsTradingResult<f64> {
        let [va, vb] = self.eigenvector;
        if vb.abs() < f64::EPSILON {
            return Err(PairsTradingError::Numerical {
                context: "Johansen eigenvector is degenerate in the second component".into(),
            });
        }
        Ok((va / vb).abs())
    }
}

/// Johansen trace-statistic cointegration test on the two-series system
/// (deterministic order 0, one lagged difference). Both series are
/// demeaned, the differenced system is regressed on its own lag, and
/// the canonical correlations between level and difference residuals
/// give the eigenvalues of the error-correction matrix.
pub fn johansen_trace(series_a: &[f64], series_b: &[f64]) -> PairsTradingResult<JohansenResult> {
    let n = series_a.len();
    if series_b.len() != n {
        return Err(PairsTradingError::DimensionMismatch {
            left: n,
            right: series_b.len(),
        });
    }
    if n < MIN_OBSERVATIONS {
        return Err(PairsTradingError::InsufficientData(format!(
            "Johansen test needs at least {} observations, got {}",
            MIN_OBSERVATIONS, n
        )));
    }

    let a = demean(series_a);
    let b = demean(series_b);

    // First differences, n-1 rows.
    let da: Vec<f64> = a.windows(2).map(|w| w[1] - w[0]).collect();
    let db: Vec<f64> = b.windows(2).map(|w| w[1] - w[0]).collect();

    // Common sample after dropping the lagged difference: rows 1..n-1.
    // Each block is demeaned again before the auxiliary regressions.
    let dx = [demean(&da[1..]), demean(&db[1..])];
    let z = [demean(&da[..da.len() - 1]), demean(&db[..db.len() - 1])];
    let lx = [demean(&a[1..n - 1]), demean(&b[1..n - 1])];

    let r0 = residualize(&dx, &z)?;
    let rk = residualize(&lx, &z)?;
    let t = r0[0].len() as f64;

    let s00 = cross_moment(&r0, &r0, t);
    let s0k = cross_moment(&r0, &rk, t);
    let sk0 = cross_moment(&rk, &r0, t);
    let skk = cross_moment(&rk, &rk, t);

    let s00_inv = invert(s00, "S00 moment matrix")?;
    let skk_inv = invert(skk, "Skk moment matrix")?;
    let m = skk_inv * sk0 * s00_inv * s0k;

    let (eigenvalues, eigenvector) = dominant_eigenpair(m)?;
    let trace_statistic: f64 = eigenvalues
        .iter()
        .map(|lambda| -t * (1.0 - lambda).max(f64::EPSILON).ln())
        .sum();

    Ok(JohansenResult {
        trace_statistic,
        eigenvalues,
        eigenvector,
        critical_values: TRACE_CRIT_R0,
    })
}

fn demean(xs: &[f64]) -> Vec<f64> {
    let m = mean(xs);
    xs.iter().map(|x| x - m).collect()
}

/// Residuals of each column of `y` after OLS on the two `z` columns.
fn residualize(y: &[Vec<f64>; 2], z: &[Vec<f64>; 2]) -> PairsTradingResult<[Vec<f64>; 2]> {
    let t = z[0].len() as f64;
    let ztz = Matrix2::new(
        dot(&z[0], &z[0]) / t,
        dot(&z[0], &z[1]) / t,
        dot(&z[1], &z[0]) / t,
        dot(&z[1], &z[1]) / t,
    );
    let ztz_inv = invert(ztz, "lagged-difference regressor matrix")?;
    let resid_col = |col: &Vec<f64>| -> Vec<f64> {
        let zty = Vector2::new(dot(&z[0], col) / t, dot(&z[1], col) / t);
        let beta = ztz_inv * zty;
        col.iter()
            .enumerate()
            .map(|(i, y_i)| y_i - beta[0] * z[0][i] - beta[1] * z[1][i])
            .collect()
    };
    Ok([resid_col(&y[0]), resid_col(&y[1])])
}

fn cross_moment(left: &[Vec<f64>; 2], right: &[Vec<f64>; 2], t: f64) -> Matrix2<f64> {
    Matrix2::new(
        dot(&left[0], &right[0]) / t,
        dot(&left[0], &right[1]) / t,
        dot(&left[1], &right[0]) / t,
        dot(&left[1], &right[1]) / t,
    )
}

fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

fn invert(m: Matrix2<f64>, context: &str) -> PairsTradingResult<Matrix2<f64>> {
    m.try_inverse().ok_or_else(|| PairsTradingError::Numerical {
        context: format!("{} is singular", context),
    })
}

/// Eigenvalues (descending) and the eigenvector of the dominant
/// eigenvalue of a 2×2 matrix with real spectrum, via the
/// characteristic quadratic.
fn dominant_eigenpair(m: Matrix2<f64>) -> PairsTradingResult<([f64; 2], [f64; 2])> {
    let trace = m[(0, 0)] + m[(1, 1)];
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    let discriminant = trace * trace - 4.0 * det;
    if discriminant < 0.0 {
        return Err(PairsTradingError::Numerical {
            context: "canonical-correlation matrix has complex eigenvalues".into(),
        });
    }
    let root = discriminant.sqrt();
    let lambda_hi = (trace + root) / 2.0;
    let lambda_lo = (trace - root) / 2.0;

    // (M - λI)v = 0 solved from whichever row is better conditioned.
    let eigenvector = if m[(0, 1)].abs() > m[(1, 0)].abs() {
        [m[(0, 1)], lambda_hi - m[(0, 0)]]
    } else if m[(1, 0)].abs() > f64::EPSILON {
        [lambda_hi - m[(1, 1)], m[(1, 0)]]
    } else if (m[(0, 0)] - lambda_hi).abs() <= (m[(1, 1)] - lambda_hi).abs() {
        [1.0, 0.0]
    } else {
        [0.0, 1.0]
    };

    Ok(([lambda_hi, lambda_lo], eigenvector))
}
