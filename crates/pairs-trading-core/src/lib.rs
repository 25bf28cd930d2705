pub mod correlation;
pub mod error;
pub mod half_life;
pub mod matrix;
pub mod pairs;
pub mod stability;
pub mod stats;
pub mod types;

pub use error::PairsTradingError;
pub use types::{
    AnalysisConfig, Confidence, CointegrationResult, ExecutionMode, Pair, PriceTable, Symbol,
    HALF_YEAR, TRADING_DAYS,
};

pub type PairsTradingResult<T> = Result<T, PairsTradingError>;
