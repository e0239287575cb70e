//! Error types surfaced by the session.

use crate::detector::GatedAction;
use crate::gateway::GatewayError;
use crate::value::ShapeClass;
use thiserror::Error;

/// Everything an operation can refuse with. None of these end the session: the caller
/// turns them into a notice and carries on with the document untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssistError {
    /// Full load of the document, favorites, catalog or faction table failed.
    #[error("failed to load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: GatewayError,
    },

    /// Manual edit text does not parse.
    #[error("input does not parse: {0}")]
    MalformedInput(String),

    /// Manual edit would change the structural class of the value.
    #[error("shape mismatch: expected {expected}, got {found}")]
    ShapeMismatch {
        expected: ShapeClass,
        found: ShapeClass,
    },

    /// Address does not exist (or no longer exists) in the document or catalog.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("manual edit mode is off")]
    ManualEditDisabled,

    #[error("{0} needs the game to be running")]
    ActionLocked(GatedAction),
}

impl AssistError {
    pub fn load(what: &'static str, source: GatewayError) -> Self {
        AssistError::Load { what, source }
    }

    pub fn invalid_target(message: impl Into<String>) -> Self {
        AssistError::InvalidTarget(message.into())
    }

    /// Short text suitable for a transient notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Load { what, .. } => format!("Could not load {what}. Use reload to retry."),
            Self::MalformedInput(_) => "The text is not valid JSON.".to_string(),
            Self::ShapeMismatch { expected, found } => {
                format!("Expected a {expected} value, got a {found}.")
            }
            Self::InvalidTarget(what) => format!("Nothing to apply: {what}."),
            Self::ManualEditDisabled => "Enable manual edit mode first.".to_string(),
            Self::ActionLocked(action) => {
                format!("{action} is unavailable until the game is ready.")
            }
        }
    }

    /// Whether retrying the same request could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::ActionLocked(_))
    }
}

pub type Result<T> = std::result::Result<T, AssistError>;
