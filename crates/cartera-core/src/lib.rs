pub mod audit;
pub mod error;
pub mod lifecycle;
pub mod loan;
pub mod payment;
pub mod schedule;
pub mod store;
pub mod types;

pub use error::CarteraError;
pub use types::*;

/// Standard result type for all cartera operations
pub type CarteraResult<T> = Result<T, CarteraError>;
