pub mod error;
pub mod math;
pub mod types;

#[cfg(feature = "mortgage")]
pub mod mortgage;

#[cfg(feature = "cashflow")]
pub mod cashflow;

#[cfg(feature = "notes")]
pub mod notes;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use error::EstateError;
pub use types::*;

/// Standard result type for all estate operations
pub type EstateResult<T> = Result<T, EstateError>;
