//! Error types for document operations.

use automerge::AutomergeError;
use thiserror::Error;
use utsushi_types::{Datatype, IdError};

/// Errors that can occur during document operations.
#[derive(Error, Debug)]
pub enum CrdtError {
    /// An object, cursor, hash or actor identifier failed to decode.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdError),

    /// Increment targeted a value that is not a counter.
    #[error("increment target is not a counter")]
    NotACounter {
        #[source]
        source: AutomergeError,
    },

    /// Operation kept for surface compatibility but not backed by the engine.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// Engine failure, passed through unchanged.
    #[error("engine error: {0}")]
    Engine(#[from] AutomergeError),

    /// Saved document, change or sync bytes failed to decode.
    #[error("load error: {0}")]
    Load(String),

    /// A value could not be converted to the requested scalar kind.
    #[error("cannot store {found} as {expected}")]
    KindMismatch {
        expected: Datatype,
        found: &'static str,
    },

    /// A host value has no document representation and lossy fallback is off.
    #[error("value has no document representation: {0}")]
    Unrepresentable(String),

    /// A list was asked to grow by length assignment.
    #[error("cannot grow list of length {len} to {requested}")]
    ListGrowth { len: usize, requested: usize },

    /// The reference does not name an object of the required kind.
    #[error("not an object: {0}")]
    NotAnObject(String),

    /// Configuration failed to parse.
    #[error("config error: {0}")]
    Config(String),
}

impl CrdtError {
    /// Whether this is an identifier decoding failure.
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, CrdtError::InvalidIdentifier(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, CrdtError::NotImplemented(_))
    }
}
