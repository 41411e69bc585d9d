use thiserror::Error;

pub type QuartziteResult<T> = anyhow::Result<T>;
pub type DFResult<T> = datafusion::error::Result<T>;

/// Conditions callers of the optimizer may want to tell apart.
///
/// They travel inside [`anyhow::Error`] like any other failure, use
/// `err.downcast_ref::<OptimizerError>()` to recover them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// Rule registry or cost model is malformed, raised before search starts.
    #[error("invalid optimizer configuration: {0}")]
    Configuration(String),
    /// No implementation of the group satisfies the required property.
    ///
    /// Callers usually retry with an empty required property.
    #[error("no feasible plan for group {group} under required property {required}")]
    NoFeasiblePlan { group: usize, required: String },
    #[error("optimization cancelled")]
    Cancelled,
    /// Cost model returned a negative, non finite or non monotone cost.
    #[error("cost model contract violated: {0}")]
    CostModelViolation(String),
}

impl OptimizerError {
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<OptimizerError>(), Some(OptimizerError::Cancelled))
    }
}
