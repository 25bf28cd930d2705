use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::correlation::CorrelationMatrix;
use crate::error::PairsTradingError;
use crate::stats::pair_stats;
use crate::types::{CointegrationResult, ExecutionMode, Pair, PriceTable};
use crate::PairsTradingResult;

/// One (pair, window) cell: the window correlation alongside both
/// cointegration test results for the same window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub correlation: f64,
    pub granger: CointegrationResult,
    pub johansen: CointegrationResult,
}

/// Full test matrix: one row per non-overlapping window, one column per
/// pair, every cell populated regardless of the correlation gate.
/// Downstream aggregation applies cutoffs; the matrix itself is the
/// complete record, which is what makes it cacheable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointegrationMatrix {
    pub window: usize,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<Pair>,
    /// Row-major: `cells[row][col]`.
    pub cells: Vec<Vec<MatrixCell>>,
}

impl CointegrationMatrix {
    pub fn num_windows(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> &MatrixCell {
        &self.cells[row][col]
    }
}

/// Persistence for a computed matrix. The matrix is either loaded
/// verbatim or rebuilt in full; there is no per-cell refresh.
pub trait ResultCache {
    fn has_existing_matrix(&self) -> bool;
    fn load(&self) -> PairsTradingResult<CointegrationMatrix>;
    fn save(&self, matrix: &CointegrationMatrix) -> PairsTradingResult<()>;
}

/// JSON file cache. Saves go through a sibling temporary file and an
/// atomic rename so a crash mid-write never leaves a truncated matrix
/// to be loaded as a cache hit.
pub struct FileMatrixCache {
    path: PathBuf,
}

impl FileMatrixCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileMatrixCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cache_error(&self, reason: impl std::fmt::Display) -> PairsTradingError {
        PairsTradingError::Cache {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ResultCache for FileMatrixCache {
    fn has_existing_matrix(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> PairsTradingResult<CointegrationMatrix> {
        let contents = fs::read_to_string(&self.path).map_err(|e| self.cache_error(e))?;
        // a corrupt file is a cache error, not a silent rebuild
        serde_json::from_str(&contents).map_err(|e| self.cache_error(e))
    }

    fn save(&self, matrix: &CointegrationMatrix) -> PairsTradingResult<()> {
        let json = serde_json::to_string(matrix)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| self.cache_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.cache_error(e))
    }
}

/// Builds the cointegration matrix for every (pair, window) of a
/// correlation matrix, or loads it from the cache when one exists.
pub struct CointegrationMatrixBuilder {
    mode: ExecutionMode,
}

impl CointegrationMatrixBuilder {
    pub fn new() -> Self {
        CointegrationMatrixBuilder {
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_mode(mode: ExecutionMode) -> Self {
        CointegrationMatrixBuilder { mode }
    }

    /// Load the cached matrix if one exists, otherwise run both tests
    /// on every cell and save the result. A failed save is fatal: a
    /// run whose results cannot be persisted should not look
    /// successful.
    pub fn build(
        &self,
        table: &PriceTable,
        correlations: &CorrelationMatrix,
        cache: &impl ResultCache,
    ) -> PairsTradingResult<CointegrationMatrix> {
        if cache.has_existing_matrix() {
            info!("loading cointegration matrix from cache");
            return cache.load();
        }

        let window = correlations.window;
        let starts: Vec<usize> = (0..table.num_sessions()).step_by(window).collect();
        if starts.len() != correlations.num_windows() {
            return Err(PairsTradingError::InvalidInput {
                field: "correlations".into(),
                reason: format!(
                    "correlation matrix has {} windows but the price history yields {}",
                    correlations.num_windows(),
                    starts.len()
                ),
            });
        }

        info!(
            windows = starts.len(),
            pairs = correlations.columns.len(),
            mode = ?self.mode,
            "building cointegration matrix"
        );
        let cells: Vec<Vec<MatrixCell>> = match self.mode {
            ExecutionMode::Sequential => starts
                .iter()
                .enumerate()
                .map(|(row, start)| build_row(table, correlations, row, *start))
                .collect::<PairsTradingResult<_>>()?,
            ExecutionMode::Parallel => starts
                .par_iter()
                .enumerate()
                .map(|(row, start)| build_row(table, correlations, row, *start))
                .collect::<PairsTradingResult<_>>()?,
        };

        let matrix = CointegrationMatrix {
            window,
            dates: correlations.dates.clone(),
            columns: correlations.columns.clone(),
            cells,
        };
        cache.save(&matrix)?;
        Ok(matrix)
    }
}

impl Default for CointegrationMatrixBuilder {
    fn default() -> Self {
        CointegrationMatrixBuilder::new()
    }
}

fn build_row(
    table: &PriceTable,
    correlations: &CorrelationMatrix,
    row: usize,
    start: usize,
) -> PairsTradingResult<Vec<MatrixCell>> {
    debug!(row, start, "building matrix row");
    correlations
        .columns
        .iter()
        .enumerate()
        .map(|(col, pair)| {
            let prices_a = table.column_window(&pair.symbol_a, start, correlations.window)?;
            let prices_b = table.column_window(&pair.symbol_b, start, correlations.window)?;
            Ok(MatrixCell {
                correlation: correlations.value(row, col),
                granger: run_test(pair, row, "engle-granger", || {
                    pair_stats::engle_granger(&pair.symbol_a, prices_a, &pair.symbol_b, prices_b)
                }),
                johansen: run_test(pair, row, "johansen", || {
                    pair_stats::johansen(&pair.symbol_a, prices_a, &pair.symbol_b, prices_b)
                }),
            })
        })
        .collect()
}

/// A statistical failure on one cell (a constant window, a singular
/// regression) downgrades that cell to a zero-confidence result instead
/// of aborting the whole matrix.
fn run_test(
    pair: &Pair,
    row: usize,
    test: &str,
    run: impl FnOnce() -> PairsTradingResult<CointegrationResult>,
) -> CointegrationResult {
    run().unwrap_or_else(|error| {
        warn!(%pair, row, test, %error, "cell test failed, recording zero confidence");
        CointegrationResult::not_cointegrated(&pair.symbol_a, &pair.symbol_b)
    })
}
