pub mod adf;
pub mod johansen;
pub mod ols;
pub mod pair_stats;

use serde::{Deserialize, Serialize};

/// Critical values of a test statistic at the 1%, 5% and 10%
/// significance levels, in the test's own sign convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub pct1: f64,
    pub pct5: f64,
    pub pct10: f64,
}

impl CriticalValues {
    /// (percent-error level, critical value) in reporting order:
    /// 1%, 5%, 10%.
    pub fn levels(&self) -> [(u8, f64); 3] {
        [(1, self.pct1), (5, self.pct5), (10, self.pct10)]
    }
}

/// Reported statistics (correlation, weight, intercept, ADF statistic)
/// are rounded to two decimals.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub(crate) fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}
