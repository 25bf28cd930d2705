use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::matrix::CointegrationMatrix;
use crate::types::{AnalysisConfig, Confidence};

/// How often a condition held in one window (`total`) and persisted
/// into the next window (`serial`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialCount {
    pub total: u64,
    pub serial: u64,
}

impl SerialCount {
    /// Fraction of occurrences that persisted, or `None` when the
    /// condition never held.
    pub fn serial_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.serial as f64 / self.total as f64)
    }
}

/// Occurrence and persistence counts for each test and combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub granger: SerialCount,
    pub johansen: SerialCount,
    /// At least one of the two tests found cointegration.
    pub either: SerialCount,
    /// Both tests agreed on cointegration.
    pub both: SerialCount,
}

/// Counts broken down by the confidence level a test reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceLadder {
    pub pct90: SerialCount,
    pub pct95: SerialCount,
    pub pct99: SerialCount,
}

impl ConfidenceLadder {
    pub fn slot(&mut self, confidence: Confidence) -> Option<&mut SerialCount> {
        match confidence {
            Confidence::NotCointegrated => None,
            Confidence::Pct90 => Some(&mut self.pct90),
            Confidence::Pct95 => Some(&mut self.pct95),
            Confidence::Pct99 => Some(&mut self.pct99),
        }
    }
}

/// Window correlations of the cells where each test (or combination)
/// found cointegration, collected without the correlation gate so the
/// relationship between correlation and cointegration can be examined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationDistributions {
    pub granger: Vec<f64>,
    pub johansen: Vec<f64>,
    pub either: Vec<f64>,
    pub both: Vec<f64>,
}

/// Aggregated occurrence and persistence statistics over the whole
/// matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityCounters {
    /// Cells examined: windows × pairs.
    pub total_pairs: u64,
    /// Correlation-above-cutoff occurrences; `serial` counts those
    /// whose next-window correlation met the serial cutoff.
    pub correlation: SerialCount,
    pub by_test: TestCounts,
    pub granger_confidence: ConfidenceLadder,
    pub johansen_confidence: ConfidenceLadder,
    pub distributions: CorrelationDistributions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    pub counters: StabilityCounters,
    /// Per-window count of pairs passing the correlation gate with
    /// Engle-Granger cointegration. The final window has no successor
    /// to compare against and is excluded.
    pub granger_pair_counts: Vec<(NaiveDate, u64)>,
}

/// Walks the matrix column by column, comparing each window against its
/// successor to measure how stable the correlation and cointegration
/// findings are period over period.
pub struct StabilityAggregator {
    correlation_cutoff: f64,
    serial_correlation_cutoff: f64,
}

impl StabilityAggregator {
    pub fn new(correlation_cutoff: f64, serial_correlation_cutoff: f64) -> Self {
        StabilityAggregator {
            correlation_cutoff,
            serial_correlation_cutoff,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        StabilityAggregator::new(config.correlation_cutoff, config.serial_correlation_cutoff)
    }

    pub fn aggregate(&self, matrix: &CointegrationMatrix) -> StabilityReport {
        let rows = matrix.num_windows();
        let cols = matrix.columns.len();
        let mut counters = StabilityCounters {
            total_pairs: (rows * cols) as u64,
            ..StabilityCounters::default()
        };
        let mut pair_counts = vec![0u64; rows.saturating_sub(1)];

        for col in 0..cols {
            for row in 0..rows.saturating_sub(1) {
                let cell = matrix.cell(row, col);
                let next = matrix.cell(row + 1, col);

                let granger = cell.granger.cointegrated;
                let johansen = cell.johansen.cointegrated;
                let either = granger || johansen;
                let both = granger && johansen;
                // persistence of a cointegration finding means either
                // test still fires in the following window
                let next_either = next.granger.cointegrated || next.johansen.cointegrated;

                if granger {
                    counters.distributions.granger.push(cell.correlation);
                }
                if johansen {
                    counters.distributions.johansen.push(cell.correlation);
                }
                if either {
                    counters.distributions.either.push(cell.correlation);
                }
                if both {
                    counters.distributions.both.push(cell.correlation);
                }

                if cell.correlation < self.correlation_cutoff {
                    continue;
                }

                counters.correlation.total += 1;
                if next.correlation >= self.serial_correlation_cutoff {
                    counters.correlation.serial += 1;
                }

                for (found, count) in [
                    (granger, &mut counters.by_test.granger),
                    (johansen, &mut counters.by_test.johansen),
                    (either, &mut counters.by_test.either),
                    (both, &mut counters.by_test.both),
                ] {
                    if found {
                        count.total += 1;
                        if next_either {
                            count.serial += 1;
                        }
                    }
                }

                if let Some(slot) = counters.granger_confidence.slot(cell.granger.confidence) {
                    slot.total += 1;
                    if next_either {
                        slot.serial += 1;
                    }
                }
                if let Some(slot) = counters.johansen_confidence.slot(cell.johansen.confidence) {
                    slot.total += 1;
                    if next_either {
                        slot.serial += 1;
                    }
                }

                if granger {
                    pair_counts[row] += 1;
                }
            }
        }

        info!(
            total = counters.total_pairs,
            correlated = counters.correlation.total,
            granger = counters.by_test.granger.total,
            johansen = counters.by_test.johansen.total,
            "aggregated stability counts"
        );
        StabilityReport {
            counters,
            granger_pair_counts: matrix
                .dates
                .iter()
                .take(rows.saturating_sub(1))
                .copied()
                .zip(pair_counts)
                .collect(),
        }
    }
}
