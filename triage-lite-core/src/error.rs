use crate::types::StepId;
use thiserror::Error;

/// One violation found while validating step definitions.
///
/// `rule` is a stable code (D1..D4) so hosts can match on it without
/// parsing the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionError {
    pub rule: &'static str,
    pub message: String,
}

impl std::fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Recoverable workflow errors. None of these are fatal to the session;
/// every one leaves step state exactly as it was.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("unknown step id: {0}")]
    StepNotFound(StepId),

    #[error("step '{step}' cannot transition: {detail}")]
    TransitionDenied { step: StepId, detail: String },

    #[error("step '{0}' is mandatory and cannot be skipped")]
    SkipDenied(StepId),

    #[error("cannot navigate to step '{0}': prior steps incomplete")]
    NavigationDenied(StepId),

    #[error("step '{step}' failed validation: {}", .errors.join("; "))]
    ValidationFailed { step: StepId, errors: Vec<String> },

    #[error("invalid step definitions: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidDefinition { errors: Vec<DefinitionError> },
}
