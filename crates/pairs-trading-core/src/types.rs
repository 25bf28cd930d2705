use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PairsTradingError;
use crate::PairsTradingResult;

/// Stock ticker symbol
pub type Symbol = String;

/// Trading sessions in a calendar year
pub const TRADING_DAYS: usize = 252;

/// Default analysis window: half a trading year
pub const HALF_YEAR: usize = TRADING_DAYS / 2;

/// An unordered pair of distinct symbols drawn from the same sector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub symbol_a: Symbol,
    pub symbol_b: Symbol,
}

impl Pair {
    pub fn new(symbol_a: impl Into<Symbol>, symbol_b: impl Into<Symbol>) -> PairsTradingResult<Self> {
        let symbol_a = symbol_a.into();
        let symbol_b = symbol_b.into();
        if symbol_a == symbol_b {
            return Err(PairsTradingError::InvalidInput {
                field: "symbol_b".into(),
                reason: format!("pair symbols must be distinct, got {} twice", symbol_a),
            });
        }
        Ok(Pair { symbol_a, symbol_b })
    }

    /// Column label used throughout the matrices, e.g. "AAPL:MPWR".
    pub fn label(&self) -> String {
        format!("{}:{}", self.symbol_a, self.symbol_b)
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.symbol_a, self.symbol_b)
    }
}

/// Confidence level at which a cointegration test statistic exceeded its
/// critical value. The percent-error projection matches the test output
/// convention: 0 (not cointegrated), 10 (90%), 5 (95%), 1 (99%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    #[default]
    NotCointegrated,
    Pct90,
    Pct95,
    Pct99,
}

impl Confidence {
    pub fn is_cointegrated(self) -> bool {
        self != Confidence::NotCointegrated
    }

    /// The percent-error level: 0, 10, 5 or 1.
    pub fn percent_error(self) -> u8 {
        match self {
            Confidence::NotCointegrated => 0,
            Confidence::Pct90 => 10,
            Confidence::Pct95 => 5,
            Confidence::Pct99 => 1,
        }
    }

    pub fn from_percent_error(level: u8) -> Option<Self> {
        match level {
            0 => Some(Confidence::NotCointegrated),
            10 => Some(Confidence::Pct90),
            5 => Some(Confidence::Pct95),
            1 => Some(Confidence::Pct99),
            _ => None,
        }
    }
}

/// Result of one cointegration test on one (pair, window).
///
/// `asset_a`/`asset_b` may be swapped relative to the caller's argument
/// order: the Engle-Granger test selects the canonical regression
/// direction and reports its dependent variable as `asset_a`. Spread
/// reconstruction must therefore read the assignment from this record,
/// never from the original call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointegrationResult {
    pub cointegrated: bool,
    pub confidence: Confidence,
    /// Hedge ratio β applied to `asset_b` when forming the spread.
    pub weight: f64,
    pub asset_a: Symbol,
    pub asset_b: Symbol,
    /// Regression constant. Present only for the regression-based
    /// (Engle-Granger) test; Johansen has no intercept term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
}

impl CointegrationResult {
    /// Zero-confidence placeholder recorded when a statistical fit fails
    /// for a cell. The build continues rather than aborting.
    pub fn not_cointegrated(asset_a: impl Into<Symbol>, asset_b: impl Into<Symbol>) -> Self {
        CointegrationResult {
            cointegrated: false,
            confidence: Confidence::NotCointegrated,
            weight: 0.0,
            asset_a: asset_a.into(),
            asset_b: asset_b.into(),
            intercept: None,
        }
    }
}

/// Wide table of daily close prices: one column per symbol, date-indexed.
/// Owned by the market-data collaborator; read-only here. Every column
/// has exactly one price per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<Symbol, Vec<f64>>,
}

impl PriceTable {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<Symbol, Vec<f64>>,
    ) -> PairsTradingResult<Self> {
        for (symbol, prices) in &columns {
            if prices.len() != dates.len() {
                return Err(PairsTradingError::InvalidInput {
                    field: "columns".into(),
                    reason: format!(
                        "column {} has {} prices but the table has {} dates",
                        symbol,
                        prices.len(),
                        dates.len()
                    ),
                });
            }
        }
        Ok(PriceTable { dates, columns })
    }

    pub fn num_sessions(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.columns.keys()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.columns.contains_key(symbol)
    }

    pub fn column(&self, symbol: &str) -> PairsTradingResult<&[f64]> {
        self.columns
            .get(symbol)
            .map(Vec::as_slice)
            .ok_or_else(|| PairsTradingError::MissingSymbol {
                symbol: symbol.to_string(),
            })
    }

    /// Close prices for `symbol` over `[start, start + window)`, clamped
    /// to the end of the history (the final partial window keeps
    /// whatever length remains).
    pub fn column_window(
        &self,
        symbol: &str,
        start: usize,
        window: usize,
    ) -> PairsTradingResult<&[f64]> {
        let column = self.column(symbol)?;
        if start >= column.len() {
            return Err(PairsTradingError::InvalidInput {
                field: "start".into(),
                reason: format!(
                    "window start {} is past the end of the {}-session history",
                    start,
                    column.len()
                ),
            });
        }
        let end = (start + window).min(column.len());
        Ok(&column[start..end])
    }
}

/// How the cointegration-matrix build executes across window rows.
/// Sequential is the safe default; rows are independent, so a parallel
/// mode is offered for environments where the statistical routines are
/// known to be thread-safe under the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Analysis parameters shared across the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Non-overlapping window length in trading sessions.
    #[serde(default = "default_window")]
    pub window: usize,
    /// In-sample correlation gate for pair selection.
    #[serde(default = "default_correlation_cutoff")]
    pub correlation_cutoff: f64,
    /// Next-period correlation gate for the serial-correlation count.
    #[serde(default = "default_serial_correlation_cutoff")]
    pub serial_correlation_cutoff: f64,
    #[serde(default)]
    pub mode: ExecutionMode,
}

fn default_window() -> usize {
    HALF_YEAR
}

fn default_correlation_cutoff() -> f64 {
    0.75
}

fn default_serial_correlation_cutoff() -> f64 {
    default_correlation_cutoff() - 0.10
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            window: default_window(),
            correlation_cutoff: default_correlation_cutoff(),
            serial_correlation_cutoff: default_serial_correlation_cutoff(),
            mode: ExecutionMode::default(),
        }
    }
}
