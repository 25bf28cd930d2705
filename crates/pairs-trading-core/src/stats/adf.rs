use crate::error::PairsTradingError;
use crate::stats::ols::{self, OlsFit};
use crate::stats::CriticalValues;
use crate::PairsTradingResult;

/// MacKinnon (2010) response-surface coefficients for the
/// Dickey-Fuller tau distribution, one variable, constant, no trend.
/// Critical value at sample size T: b0 + b1/T + b2/T² + b3/T³.
const TAU_C_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const TAU_C_5PCT: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const TAU_C_10PCT: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

const MIN_OBSERVATIONS: usize = 10;

/// Augmented Dickey-Fuller unit-root test result.
#[derive(Debug, Clone)]
pub struct AdfResult {
    /// t-statistic of the lagged-level coefficient. More negative means
    /// stronger evidence of stationarity.
    pub statistic: f64,
    /// Difference lags selected by AIC.
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

/// Augmented Dickey-Fuller test with a constant term and automatic lag
/// selection: Δx_t = c + ρ·x_{t-1} + Σ φ_j·Δx_{t-j} + ε_t. The lag
/// count is chosen by AIC over a common sample, up to
/// ceil(12·(n/100)^¼), then the statistic is refit on the maximal
/// sample for the chosen lag.
pub fn adf_test(series: &[f64]) -> PairsTradingResult<AdfResult> {
    let n = series.len();
    if n < MIN_OBSERVATIONS {
        return Err(PairsTradingError::InsufficientData(format!(
            "ADF test needs at least {} observations, got {}",
            MIN_OBSERVATIONS, n
        )));
    }

    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let max_lag = schwert.min((n / 2).saturating_sub(2));

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    // Lag selection over the common sample starting at max_lag, so
    // every candidate sees identical observations.
    let mut used_lag = 0;
    let mut best_aic = f64::INFINITY;
    for lag in 0..=max_lag {
        let fit = fit_adf_regression(series, &diff, max_lag, lag)?;
        let aic = fit.aic();
        if aic < best_aic {
            best_aic = aic;
            used_lag = lag;
        }
    }

    // Refit on the maximal sample available for the chosen lag.
    let fit = fit_adf_regression(series, &diff, used_lag, used_lag)?;
    let nobs = fit.nobs;
    Ok(AdfResult {
        statistic: fit.t_stat(0),
        used_lag,
        nobs,
        critical_values: mackinnon_critical_values(nobs),
    })
}

/// Finite-sample Dickey-Fuller critical values for a regression with
/// `nobs` observations.
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    let surface = |b: &[f64; 4]| {
        let t = nobs as f64;
        b[0] + b[1] / t + b[2] / (t * t) + b[3] / (t * t * t)
    };
    CriticalValues {
        pct1: surface(&TAU_C_1PCT),
        pct5: surface(&TAU_C_5PCT),
        pct10: surface(&TAU_C_10PCT),
    }
}

/// Δx_t regressed on x_{t-1}, `lag` lagged differences and a constant,
/// over rows `start..` of the difference series. `start >= lag` must
/// hold so every lagged difference exists.
fn fit_adf_regression(
    series: &[f64],
    diff: &[f64],
    start: usize,
    lag: usize,
) -> PairsTradingResult<OlsFit> {
    let rows = start..diff.len();
    let y: Vec<f64> = rows.clone().map(|i| diff[i]).collect();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(lag + 1);
    columns.push(rows.clone().map(|i| series[i]).collect());
    for j in 1..=lag {
        columns.push(rows.clone().map(|i| diff[i - j]).collect());
    }
    let column_refs: Vec<&[f64]> = columns.iter().map(|c| c.as_slice()).collect();
    ols::fit(&y, &column_refs, true)
}
