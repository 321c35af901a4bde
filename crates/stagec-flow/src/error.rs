use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow invariant violated: {0}")]
    Invariant(String),

    #[error("construction order builds {node} before its consumer {consumer}")]
    Order { node: String, consumer: String },

    #[error(transparent)]
    Shuffle(#[from] stagec_shuffle::ShuffleError),

    #[error(transparent)]
    Core(#[from] stagec_core::Error),
}
