//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failures: validation, guard rejections, stale
/// versions. Anything involving I/O belongs to the infrastructure error
/// types, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input (unparseable payload fields, empty values).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Quantity of zero or above the per-line cap.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// The catalog cannot cover the requested units.
    #[error("out of stock: requested {requested}, available {available}")]
    OutOfStock { requested: u32, available: u32 },

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The product or cart line does not exist, or is no longer purchasable.
    #[error("not found")]
    NotFound,

    /// Someone else committed first; the caller may reload and retry.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn out_of_stock(requested: u32, available: u32) -> Self {
        Self::OutOfStock {
            requested,
            available,
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
