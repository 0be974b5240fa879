use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapitalStackError {
    #[error("Financing percentages must sum to 100% (got {sum}%)")]
    AllocationMismatch { sum: Decimal },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CapitalStackError {
    fn from(e: serde_json::Error) -> Self {
        CapitalStackError::SerializationError(e.to_string())
    }
}
