pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "stack")]
pub mod stack;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::CapitalStackError;
pub use types::*;

#[cfg(feature = "stack")]
pub use stack::{calculate, CapitalStackInput, CapitalStackOutput};

/// Standard result type for all capital stack operations
pub type CapitalStackResult<T> = Result<T, CapitalStackError>;
