use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Evaluation error: {0}")]
    Eval(#[from] agenteval_critic::EvalError),

    #[error("Run was interrupted")]
    Interrupted,
}

/// Reasons a scored batch cannot be aggregated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("record '{id}' has no value for criterion '{criterion}'")]
    MissingCriterion { id: String, criterion: String },

    #[error("record '{id}' has value '{value}' outside the domain of '{criterion}'")]
    OutOfDomain {
        id: String,
        criterion: String,
        value: String,
    },

    #[error("record '{id}' scores criterion '{criterion}' which is not in the store")]
    UnknownCriterion { id: String, criterion: String },
}
