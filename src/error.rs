//! Recoverable numerical failures
//!
//! Contract violations (empty location, mismatched shapes, bad indices) are
//! not represented here: they panic. Everything in this module can happen to
//! correct calling code because of finite precision arithmetic.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactorizationError {
    /// A Cholesky pivot was zero, negative, infinite or NaN.
    #[error("studentst: matrix is not positive definite (failed at pivot {pivot})")]
    NotPositiveDefinite { pivot: usize },
    /// The observed block Σ₂₂ could not be factorized while conditioning.
    #[error("studentst: observed block of the scale matrix is not positive definite")]
    ObservedBlock(#[source] Box<FactorizationError>),
}

impl FactorizationError {
    /// Index of the failing pivot inside the matrix that was factorized.
    pub fn pivot(&self) -> usize {
        match self {
            FactorizationError::NotPositiveDefinite { pivot, .. } => *pivot,
            FactorizationError::ObservedBlock(inner) => inner.pivot(),
        }
    }
}
