use crate::error::PairsTradingError;
use crate::stats::adf::adf_test;
use crate::stats::johansen::johansen_trace;
use crate::stats::{mean, ols, round2, CriticalValues};
use crate::types::{Confidence, CointegrationResult};
use crate::PairsTradingResult;

/// Minimum observations for the cointegration tests.
const MIN_PRICES: usize = 20;

/// Pearson correlation coefficient of two equal-length series, rounded
/// to two decimals.
pub fn correlation(series_a: &[f64], series_b: &[f64]) -> PairsTradingResult<f64> {
    let n = series_a.len();
    if series_b.len() != n {
        return Err(PairsTradingError::DimensionMismatch {
            left: n,
            right: series_b.len(),
        });
    }
    if n < 2 {
        return Err(PairsTradingError::InsufficientData(
            "correlation needs at least 2 observations".into(),
        ));
    }
    let mean_a = mean(series_a);
    let mean_b = mean(series_b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in series_a.iter().zip(series_b) {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        return Err(PairsTradingError::Numerical {
            context: "correlation of a zero-variance series".into(),
        });
    }
    Ok(round2(cov / denom))
}

/// Pick the tightest confidence level whose critical value the test
/// statistic exceeds in absolute value. Ties in exceedance resolve to
/// the largest critical-value magnitude, i.e. the highest confidence
/// satisfied.
fn select_confidence(statistic: f64, critical: &CriticalValues) -> (bool, Confidence) {
    let abs_stat = statistic.abs();
    let mut best_magnitude = 0.0;
    let mut level = 0u8;
    for (pct, crit) in critical.levels() {
        let magnitude = crit.abs();
        if abs_stat > magnitude && magnitude > best_magnitude {
            best_magnitude = magnitude;
            level = pct;
        }
    }
    let confidence = Confidence::from_percent_error(level).unwrap_or_default();
    (confidence.is_cointegrated(), confidence)
}

/// Engle-Granger cointegration test.
///
/// Both regression directions are fit (A on B and B on A, each with a
/// constant) because the dependent/independent roles are ambiguous for
/// co-moving series. The regression whose slope has the larger
/// magnitude becomes canonical: its dependent variable is reported as
/// `asset_a`, its slope as `weight` and its constant as `intercept`.
/// An exact tie keeps the A-on-B regression. The canonical residuals
/// are then tested for a unit root with ADF.
pub fn engle_granger(
    symbol_a: &str,
    series_a: &[f64],
    symbol_b: &str,
    series_b: &[f64],
) -> PairsTradingResult<CointegrationResult> {
    validate_pair_series(series_a, series_b)?;

    let fit_ab = ols::fit(series_a, &[series_b], true)?;
    let fit_ba = ols::fit(series_b, &[series_a], true)?;

    let (asset_a, asset_b, fit) = if fit_ba.params[0].abs() > fit_ab.params[0].abs() {
        (symbol_b, symbol_a, fit_ba)
    } else {
        (symbol_a, symbol_b, fit_ab)
    };
    let weight = round2(fit.params[0]);
    let intercept = round2(fit.params[1]);

    let adf = adf_test(&fit.residuals)?;
    let statistic = round2(adf.statistic);
    let (cointegrated, confidence) = select_confidence(statistic, &adf.critical_values);

    Ok(CointegrationResult {
        cointegrated,
        confidence,
        weight,
        asset_a: asset_a.to_string(),
        asset_b: asset_b.to_string(),
        intercept: Some(intercept),
    })
}

/// Johansen trace-statistic cointegration test. The hedge ratio is the
/// absolute ratio of the dominant eigenvector's components; there is no
/// intercept and the caller's symbol order is preserved.
pub fn johansen(
    symbol_a: &str,
    series_a: &[f64],
    symbol_b: &str,
    series_b: &[f64],
) -> PairsTradingResult<CointegrationResult> {
    validate_pair_series(series_a, series_b)?;

    let result = johansen_trace(series_a, series_b)?;
    let weight = round2(result.hedge_ratio()?);
    let (cointegrated, confidence) =
        select_confidence(result.trace_statistic, &result.critical_values);

    Ok(CointegrationResult {
        cointegrated,
        confidence,
        weight,
        asset_a: symbol_a.to_string(),
        asset_b: symbol_b.to_string(),
        intercept: None,
    })
}

/// The stationary spread series `A - weight·B`, or
/// `A - intercept - weight·B` when the result carries an intercept.
/// The A/B roles come from the result's own asset assignment, which may
/// be swapped relative to the caller's argument order.
pub fn stationary_series(
    symbol_a: &str,
    series_a: &[f64],
    symbol_b: &str,
    series_b: &[f64],
    result: &CointegrationResult,
) -> PairsTradingResult<Vec<f64>> {
    if series_a.len() != series_b.len() {
        return Err(PairsTradingError::DimensionMismatch {
            left: series_a.len(),
            right: series_b.len(),
        });
    }
    let (dependent, independent) = if result.asset_a == symbol_a && result.asset_b == symbol_b {
        (series_a, series_b)
    } else if result.asset_a == symbol_b && result.asset_b == symbol_a {
        (series_b, series_a)
    } else {
        return Err(PairsTradingError::InvalidInput {
            field: "result".into(),
            reason: format!(
                "result is for pair {}:{}, got series for {}:{}",
                result.asset_a, result.asset_b, symbol_a, symbol_b
            ),
        });
    };
    let intercept = result.intercept.unwrap_or(0.0);
    Ok(dependent
        .iter()
        .zip(independent)
        .map(|(a, b)| a - intercept - result.weight * b)
        .collect())
}

/// Half-life of a mean-reverting Ornstein-Uhlenbeck process:
/// Δz_t regressed on the demeaned lagged level, no constant term, with
/// half-life = round(-ln 2 / θ). Negative values indicate a
/// non-reverting fit and are the caller's to discard.
pub fn half_life_demeaned(series: &[f64]) -> PairsTradingResult<i64> {
    let lagged: Vec<f64> = series[..series.len().saturating_sub(1)].to_vec();
    let lag_mean = mean(&lagged);
    let centered: Vec<f64> = lagged.iter().map(|z| z - lag_mean).collect();
    half_life_regression(series, &centered)
}

/// Half-life variant fitting Δz_t = θ·z_{t-1} + ε on the raw lagged
/// level, no constant and no demeaning.
pub fn half_life_no_constant(series: &[f64]) -> PairsTradingResult<i64> {
    let lagged = &series[..series.len().saturating_sub(1)];
    half_life_regression(series, lagged)
}

fn half_life_regression(series: &[f64], regressor: &[f64]) -> PairsTradingResult<i64> {
    if series.len() < 3 {
        return Err(PairsTradingError::InsufficientData(
            "half-life fit needs at least 3 observations".into(),
        ));
    }
    let dz: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let fit = ols::fit(&dz, &[regressor], false)?;
    let theta = fit.params[0];
    if theta == 0.0 {
        return Err(PairsTradingError::Numerical {
            context: "half-life regression produced a zero reversion coefficient".into(),
        });
    }
    Ok((-std::f64::consts::LN_2 / theta).round() as i64)
}

fn validate_pair_series(series_a: &[f64], series_b: &[f64]) -> PairsTradingResult<()> {
    if series_a.len() != series_b.len() {
        return Err(PairsTradingError::DimensionMismatch {
            left: series_a.len(),
            right: series_b.len(),
        });
    }
    if series_a.len() < MIN_PRICES {
        return Err(PairsTradingError::InsufficientData(format!(
            "cointegration tests need at least {} observations, got {}",
            MIN_PRICES,
            series_a.len()
        )));
    }
    Ok(())
}
