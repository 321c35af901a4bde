use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    /// The phase finished but left errors on the diagnostic sink.
    #[error("{phase} reported {errors} error(s)")]
    Diagnosed { phase: &'static str, errors: usize },

    #[error(transparent)]
    Core(#[from] stagec_core::Error),
}
