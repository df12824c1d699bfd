//! Aggregate root trait and the optimistic concurrency token.

use crate::error::{DomainError, DomainResult};

/// Minimal interface for an aggregate root.
///
/// The cart is the aggregate this system revolves around: one unit of
/// consistency, loaded as a whole, mutated as a whole, committed as a whole.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Version of the state this aggregate was loaded at.
    ///
    /// Every committed write bumps it by one; comparing against this number
    /// at commit time is the entire concurrency story, no row locks involved.
    fn version(&self) -> u64;
}

/// What a writer believes the aggregate's version to be.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Write unconditionally; used for the first write of a fresh aggregate.
    Any,
    /// Write only if the stored version still matches.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    /// Like [`matches`](Self::matches), but reports the mismatch as a
    /// [`DomainError::Conflict`] a retry loop can act on.
    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
