use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairsTradingError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Dimension mismatch: series of length {left} and {right} must be equal")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Symbol {symbol} is not present in the price table")]
    MissingSymbol { symbol: String },

    #[error("Numerical failure in {context}")]
    Numerical { context: String },

    #[error("Result cache failure at {path}: {reason}")]
    Cache { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for PairsTradingError {
    fn from(e: serde_json::Error) -> Self {
        PairsTradingError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for PairsTradingError {
    fn from(e: std::io::Error) -> Self {
        PairsTradingError::Io(e.to_string())
    }
}
