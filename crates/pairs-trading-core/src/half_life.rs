use tracing::warn;

use crate::matrix::CointegrationMatrix;
use crate::stats::pair_stats;
use crate::types::{AnalysisConfig, PriceTable};
use crate::PairsTradingResult;

/// Extreme outliers are dropped from the half-life distribution at
/// eight standard deviations about the mean.
const OUTLIER_SIGMA: f64 = 8.0;

/// Estimates mean-reversion half-lives for the cells that pass the
/// correlation gate with an Engle-Granger cointegration finding.
pub struct HalfLifeEstimator {
    correlation_cutoff: f64,
}

impl HalfLifeEstimator {
    pub fn new(correlation_cutoff: f64) -> Self {
        HalfLifeEstimator { correlation_cutoff }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        HalfLifeEstimator::new(config.correlation_cutoff)
    }

    /// One half-life per selected (pair, window): the spread is rebuilt
    /// from the window's prices in the test result's asset order, fit
    /// as an AR(1), and kept when it implies actual mean reversion
    /// (positive half-life). Non-reverting fits and extreme outliers
    /// are dropped.
    pub fn estimate(
        &self,
        table: &PriceTable,
        matrix: &CointegrationMatrix,
    ) -> PairsTradingResult<Vec<i64>> {
        let mut half_lives = Vec::new();
        for row in 0..matrix.num_windows() {
            let start = row * matrix.window;
            for (col, pair) in matrix.columns.iter().enumerate() {
                let cell = matrix.cell(row, col);
                if cell.correlation < self.correlation_cutoff || !cell.granger.cointegrated {
                    continue;
                }
                if !table.has_symbol(&pair.symbol_a) || !table.has_symbol(&pair.symbol_b) {
                    warn!(%pair, row, "no price history for pair, skipping cell");
                    continue;
                }
                let prices_a = table.column_window(&pair.symbol_a, start, matrix.window)?;
                let prices_b = table.column_window(&pair.symbol_b, start, matrix.window)?;
                let spread = pair_stats::stationary_series(
                    &pair.symbol_a,
                    prices_a,
                    &pair.symbol_b,
                    prices_b,
                    &cell.granger,
                )?;
                match pair_stats::half_life_no_constant(&spread) {
                    Ok(half_life) if half_life > 0 => half_lives.push(half_life),
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%pair, row, %error, "half-life fit failed, skipping cell");
                    }
                }
            }
        }
        Ok(filter_outliers(half_lives))
    }
}

fn filter_outliers(half_lives: Vec<i64>) -> Vec<i64> {
    if half_lives.is_empty() {
        return half_lives;
    }
    let n = half_lives.len() as f64;
    let mean = half_lives.iter().sum::<i64>() as f64 / n;
    let variance = half_lives
        .iter()
        .map(|h| (*h as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let bound = OUTLIER_SIGMA * variance.sqrt();
    half_lives
        .into_iter()
        .filter(|h| (*h as f64 - mean).abs() <= bound)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::SerialCorrelationEngine;
    use crate::matrix::{CointegrationMatrixBuilder, FileMatrixCache, ResultCache};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn cointegrated_table(n: usize) -> PriceTable {
        let mut rng = StdRng::seed_from_u64(73);
        let mut aaa = vec![100.0];
        for i in 1..n {
            aaa.push(aaa[i - 1] + rng.gen::<f64>() - 0.5);
        }
        let bbb: Vec<f64> = aaa
            .iter()
            .map(|x| 2.0 * x + 0.05 * (rng.gen::<f64>() - 0.5))
            .collect();
        let start = NaiveDate::from_ymd_opt(2007, 1, 3).unwrap();
        let dates = (0..n).map(|i| start + chrono::Days::new(i as u64)).collect();
        let columns =
            BTreeMap::from([("AAA".to_string(), aaa), ("BBB".to_string(), bbb)]);
        PriceTable::new(dates, columns).unwrap()
    }

    #[test]
    fn test_estimates_positive_half_lives_for_cointegrated_cells() {
        let table = cointegrated_table(252);
        let pairs = vec![crate::types::Pair::new("AAA", "BBB").unwrap()];
        let engine = SerialCorrelationEngine::new(&table, pairs, 126).unwrap();
        let correlations = engine.windowed_matrix(&table).unwrap();
        let cache = FileMatrixCache::new(std::env::temp_dir().join(format!(
            "pairs-trading-half-life-{}.json",
            std::process::id()
        )));
        let _ = std::fs::remove_file(cache.path());
        let matrix = CointegrationMatrixBuilder::new()
            .build(&table, &correlations, &cache)
            .unwrap();
        assert!(cache.has_existing_matrix());

        let half_lives = HalfLifeEstimator::new(0.75)
            .estimate(&table, &matrix)
            .unwrap();
        // both windows are cointegrated by construction and the noise
        // spread reverts within a handful of sessions
        assert!(!half_lives.is_empty());
        assert!(half_lives.iter().all(|h| *h > 0));
        assert!(half_lives.iter().all(|h| *h < 126));
        let _ = std::fs::remove_file(cache.path());
    }

    #[test]
    fn test_cutoff_above_all_correlations_selects_nothing() {
        let table = cointegrated_table(252);
        let pairs = vec![crate::types::Pair::new("AAA", "BBB").unwrap()];
        let engine = SerialCorrelationEngine::new(&table, pairs, 126).unwrap();
        let correlations = engine.windowed_matrix(&table).unwrap();
        let cache = FileMatrixCache::new(std::env::temp_dir().join(format!(
            "pairs-trading-half-life-empty-{}.json",
            std::process::id()
        )));
        let _ = std::fs::remove_file(cache.path());
        let matrix = CointegrationMatrixBuilder::new()
            .build(&table, &correlations, &cache)
            .unwrap();
        let half_lives = HalfLifeEstimator::new(1.01)
            .estimate(&table, &matrix)
            .unwrap();
        assert!(half_lives.is_empty());
        let _ = std::fs::remove_file(cache.path());
    }

    #[test]
    fn test_filter_outliers_drops_extreme_values() {
        let mut values = vec![6i64; 100];
        values.push(1_000_000);
        let filtered = filter_outliers(values);
        // a lone extreme value among a hundred sits beyond eight sigma
        assert_eq!(filtered, vec![6i64; 100]);
    }

    #[test]
    fn test_filter_outliers_keeps_moderate_spread() {
        let values = vec![3, 5, 6, 6, 7, 9, 12];
        assert_eq!(filter_outliers(values.clone()), values);
    }

    #[test]
    fn test_filter_outliers_empty() {
        assert!(filter_outliers(Vec::new()).is_empty());
    }
}
