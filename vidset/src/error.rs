//! Error kinds that callers may want to tell apart.
//!
//! These are carried inside [anyhow::Error] and recovered with
//! `err.downcast_ref::<DatasetError>()`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("token '{token}' has no vocabulary index")]
    MissingVocabularyEntry { token: String },
    #[error("cannot vectorize an empty token sequence in toy mode")]
    EmptySequence,
    #[error("sequence of {len} tokens exceeds the padded width {width}")]
    SequenceTooLong { len: usize, width: usize },
    #[error("clip id '{id}' is not in the dataset")]
    UnknownId { id: String },
    #[error("position {index} is out of range for a dataset of {len} records")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("clip id '{id}' appears more than once in the sample table")]
    DuplicateId { id: String },
    #[error("cache file '{path}' is being built by another process")]
    CacheLocked { path: String },
    #[error("invalid cache file: {reason}")]
    InvalidCache { reason: String },
}
