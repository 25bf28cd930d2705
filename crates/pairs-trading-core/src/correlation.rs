use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PairsTradingError;
use crate::stats::pair_stats;
use crate::types::{Pair, PriceTable};
use crate::PairsTradingResult;

/// Windowed correlation matrix: one row per non-overlapping window, one
/// column per pair. Each row is dated by its window's first session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub window: usize,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<Pair>,
    /// Row-major: `values[row][col]` is the correlation of pair `col`
    /// over window `row`.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn num_windows(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(Pair::label).collect()
    }

    /// Per-window count of pairs whose correlation meets `cutoff`.
    pub fn counts_above(&self, cutoff: f64) -> Vec<(NaiveDate, usize)> {
        self.dates
            .iter()
            .zip(&self.values)
            .map(|(date, row)| (*date, row.iter().filter(|r| **r >= cutoff).count()))
            .collect()
    }
}

/// Computes windowed log-price correlations for a set of sector pairs
/// over non-overlapping windows of the price history.
pub struct SerialCorrelationEngine {
    window: usize,
    pairs: Vec<Pair>,
}

impl SerialCorrelationEngine {
    /// Pairs whose symbols are missing from the price table are dropped
    /// with a warning rather than failing the whole run; a delisted
    /// ticker should not abort the sector scan.
    pub fn new(
        table: &PriceTable,
        pairs: Vec<Pair>,
        window: usize,
    ) -> PairsTradingResult<Self> {
        if window < 2 {
            return Err(PairsTradingError::InvalidInput {
                field: "window".into(),
                reason: format!("correlation window must be at least 2 sessions, got {}", window),
            });
        }
        let pairs: Vec<Pair> = pairs
            .into_iter()
            .filter(|pair| {
                let present = table.has_symbol(&pair.symbol_a) && table.has_symbol(&pair.symbol_b);
                if !present {
                    warn!(pair = %pair, "dropping pair with no price history");
                }
                present
            })
            .collect();
        Ok(SerialCorrelationEngine { window, pairs })
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Correlation series for a single pair, one value per window.
    pub fn pair_series(
        &self,
        table: &PriceTable,
        pair: &Pair,
    ) -> PairsTradingResult<Vec<(NaiveDate, f64)>> {
        let series_a = table.column(&pair.symbol_a)?;
        let series_b = table.column(&pair.symbol_b)?;
        Ok(self
            .window_starts(table)
            .map(|start| {
                let end = (start + self.window).min(series_a.len());
                let corr = window_correlation(&series_a[start..end], &series_b[start..end]);
                (table.dates()[start], corr)
            })
            .collect())
    }

    /// Correlations for every pair over every window. Pair columns are
    /// computed in parallel; the final partial window is included.
    pub fn windowed_matrix(&self, table: &PriceTable) -> PairsTradingResult<CorrelationMatrix> {
        let starts: Vec<usize> = self.window_starts(table).collect();
        let dates: Vec<NaiveDate> = starts.iter().map(|s| table.dates()[*s]).collect();

        let columns: Vec<Vec<f64>> = self
            .pairs
            .par_iter()
            .map(|pair| -> PairsTradingResult<Vec<f64>> {
                let series_a = table.column(&pair.symbol_a)?;
                let series_b = table.column(&pair.symbol_b)?;
                Ok(starts
                    .iter()
                    .map(|start| {
                        let end = (start + self.window).min(series_a.len());
                        window_correlation(&series_a[*start..end], &series_b[*start..end])
                    })
                    .collect())
            })
            .collect::<PairsTradingResult<_>>()?;

        let values: Vec<Vec<f64>> = (0..starts.len())
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect();

        Ok(CorrelationMatrix {
            window: self.window,
            dates,
            columns: self.pairs.clone(),
            values,
        })
    }

    fn window_starts(&self, table: &PriceTable) -> impl Iterator<Item = usize> {
        (0..table.num_sessions()).step_by(self.window)
    }
}

/// Correlation of log prices over one window. A window containing a
/// non-positive price or a constant series yields 0.0 rather than NaN,
/// so every cell stays JSON-serializable.
fn window_correlation(prices_a: &[f64], prices_b: &[f64]) -> f64 {
    if prices_a.iter().chain(prices_b).any(|p| *p <= 0.0) {
        return 0.0;
    }
    let log_a: Vec<f64> = prices_a.iter().map(|p| p.ln()).collect();
    let log_b: Vec<f64> = prices_b.iter().map(|p| p.ln()).collect();
    pair_stats::correlation(&log_a, &log_b).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn table(columns: &[(&str, Vec<f64>)]) -> PriceTable {
        let n = columns[0].1.len();
        let start = NaiveDate::from_ymd_opt(2007, 1, 3).unwrap();
        let dates = (0..n).map(|i| start + chrono::Days::new(i as u64)).collect();
        let columns = columns
            .iter()
            .map(|(sym, prices)| (sym.to_string(), prices.clone()))
            .collect::<BTreeMap<_, _>>();
        PriceTable::new(dates, columns).unwrap()
    }

    fn geometric(start: f64, rate: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start * rate.powi(i as i32)).collect()
    }

    #[test]
    fn test_year_of_history_yields_two_half_year_windows() {
        let t = table(&[
            ("AAA", geometric(100.0, 1.001, 252)),
            ("BBB", geometric(50.0, 1.002, 252)),
        ]);
        let pairs = vec![Pair::new("AAA", "BBB").unwrap()];
        let engine = SerialCorrelationEngine::new(&t, pairs, 126).unwrap();
        let matrix = engine.windowed_matrix(&t).unwrap();
        assert_eq!(matrix.num_windows(), 2);
        assert_eq!(matrix.dates.len(), 2);
        assert_eq!(matrix.dates[0], t.dates()[0]);
        assert_eq!(matrix.dates[1], t.dates()[126]);
        // both columns are exact exponentials: log prices are linear,
        // so the correlation is exactly 1 in every window
        assert_eq!(matrix.value(0, 0), 1.0);
        assert_eq!(matrix.value(1, 0), 1.0);
    }

    #[test]
    fn test_final_partial_window_included() {
        let t = table(&[
            ("AAA", geometric(100.0, 1.001, 300)),
            ("BBB", geometric(50.0, 0.999, 300)),
        ]);
        let pairs = vec![Pair::new("AAA", "BBB").unwrap()];
        let engine = SerialCorrelationEngine::new(&t, pairs, 126).unwrap();
        let matrix = engine.windowed_matrix(&t).unwrap();
        // 300 sessions = 126 + 126 + 48-session remainder
        assert_eq!(matrix.num_windows(), 3);
        assert_eq!(matrix.value(2, 0), -1.0);
    }

    #[test]
    fn test_missing_symbol_pairs_dropped() {
        let t = table(&[
            ("AAA", geometric(100.0, 1.001, 60)),
            ("BBB", geometric(50.0, 1.001, 60)),
        ]);
        let pairs = vec![
            Pair::new("AAA", "BBB").unwrap(),
            Pair::new("AAA", "ZZZ").unwrap(),
        ];
        let engine = SerialCorrelationEngine::new(&t, pairs, 30).unwrap();
        assert_eq!(engine.pairs().len(), 1);
        assert_eq!(engine.pairs()[0].label(), "AAA:BBB");
    }

    #[test]
    fn test_degenerate_windows_are_zero() {
        let mut negative = geometric(100.0, 1.001, 40);
        negative[5] = -1.0;
        let t = table(&[
            ("AAA", negative),
            ("BBB", geometric(50.0, 1.001, 40)),
            ("CCC", vec![10.0; 40]),
        ]);
        let pairs = vec![
            Pair::new("AAA", "BBB").unwrap(),
            Pair::new("BBB", "CCC").unwrap(),
        ];
        let engine = SerialCorrelationEngine::new(&t, pairs, 20).unwrap();
        let matrix = engine.windowed_matrix(&t).unwrap();
        // non-positive price in AAA's first window
        assert_eq!(matrix.value(0, 0), 0.0);
        assert_eq!(matrix.value(1, 0), 1.0);
        // CCC is constant in every window
        assert_eq!(matrix.value(0, 1), 0.0);
        assert_eq!(matrix.value(1, 1), 0.0);
    }

    #[test]
    fn test_counts_above_cutoff() {
        let t = table(&[
            ("AAA", geometric(100.0, 1.001, 60)),
            ("BBB", geometric(50.0, 1.001, 60)),
            ("CCC", geometric(20.0, 0.999, 60)),
        ]);
        let pairs = vec![
            Pair::new("AAA", "BBB").unwrap(),
            Pair::new("AAA", "CCC").unwrap(),
        ];
        let engine = SerialCorrelationEngine::new(&t, pairs, 30).unwrap();
        let matrix = engine.windowed_matrix(&t).unwrap();
        let counts = matrix.counts_above(0.75);
        assert_eq!(counts.len(), 2);
        // AAA:BBB is +1, AAA:CCC is -1 in every window
        assert_eq!(counts[0].1, 1);
        assert_eq!(counts[1].1, 1);
    }

    #[test]
    fn test_pair_series_matches_matrix_column() {
        let t = table(&[
            ("AAA", geometric(100.0, 1.001, 60)),
            ("BBB", geometric(50.0, 1.002, 60)),
        ]);
        let pair = Pair::new("AAA", "BBB").unwrap();
        let engine = SerialCorrelationEngine::new(&t, vec![pair.clone()], 30).unwrap();
        let matrix = engine.windowed_matrix(&t).unwrap();
        let series = engine.pair_series(&t, &pair).unwrap();
        for (row, (date, corr)) in series.iter().enumerate() {
            assert_eq!(*date, matrix.dates[row]);
            assert_eq!(*corr, matrix.value(row, 0));
        }
    }

    #[test]
    fn test_window_of_one_rejected() {
        let t = table(&[("AAA", vec![1.0, 2.0])]);
        assert!(SerialCorrelationEngine::new(&t, vec![], 1).is_err());
    }
}
