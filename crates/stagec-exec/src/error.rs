use std::cmp::Ordering;

use thiserror::Error;

use stagec_core::block::BlockPortRef;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Plan(#[from] stagec_planner::PlanError),

    #[error(transparent)]
    Shuffle(#[from] stagec_shuffle::ShuffleError),

    #[error(transparent)]
    Flow(#[from] stagec_flow::FlowError),

    #[error("operator: {0}")]
    Operator(#[from] stagec_operators::OpError),

    #[error(transparent)]
    Core(#[from] stagec_core::Error),

    #[error("lifecycle: {0}")]
    Lifecycle(String),

    #[error("no map body reads block input {0}")]
    UnknownInput(BlockPortRef),

    #[error("comparators disagree at position {index}: bytes say {bytes:?}, objects say {objects:?}")]
    ComparatorMismatch {
        index: usize,
        bytes: Ordering,
        objects: Ordering,
    },

    #[error("invalid task structure: {0}")]
    Invalid(String),
}
