use stagec_core::id::PortId;
use stagec_core::schema::DataType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShuffleError>;

#[derive(Debug, Error)]
pub enum ShuffleError {
    /// A key carried a port tag no segment owns.
    #[error("unknown shuffle port tag {0}")]
    UnknownTag(i64),

    #[error("{phase} reported {errors} error(s)")]
    Diagnosed { phase: &'static str, errors: usize },

    #[error("invalid partition count {0}")]
    Partitions(u32),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Core(#[from] stagec_core::Error),
}

/// Malformed key bytes or values that do not fit their term.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("key truncated: need {needed} byte(s) at offset {at}")]
    Truncated { needed: usize, at: usize },

    #[error("bad presence byte {byte:#04x} at offset {at}")]
    Presence { byte: u8, at: usize },

    #[error("invalid utf-8 in key at offset {at}")]
    Utf8 { at: usize },

    #[error("value of {got} does not fit a {expected:?} term")]
    Type { expected: DataType, got: String },

    #[error("record has {got} properties, term needs index {index}")]
    Arity { index: usize, got: usize },

    #[error("{0} trailing byte(s) after the last term")]
    Trailing(usize),

    #[error("key for {expected} cannot take grouping values from {got}")]
    ElementMismatch { expected: PortId, got: PortId },
}
