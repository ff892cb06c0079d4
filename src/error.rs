//! Error types for weak reference operations

use thiserror::Error;

/// Weak reference errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// The target's type forbids any finalizer attachment
    #[error("can not build weak reference for {type_name}")]
    NotFinalizable { type_name: &'static str },

    /// The reference is empty but the operation needs a live target
    #[error("object has been destroyed")]
    DeadObject,

    /// Every addressable heap slot is in use
    #[error("heap slots exhausted")]
    HeapExhausted,
}

pub type Result<T> = std::result::Result<T, RefError>;
