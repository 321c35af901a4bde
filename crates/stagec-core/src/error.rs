use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the shared model itself.
///
/// Compile errors about a user's stage (missing handlers, unknown shapes)
/// go to `Diagnostics` instead; these variants abort the current call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(String),

    /// Shape, property or value type mismatch.
    #[error("shape: {0}")]
    Schema(String),

    /// Malformed flow graph or stage block.
    #[error("stage structure: {0}")]
    Plan(String),

    #[error("fingerprint: {0}")]
    Hash(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}
