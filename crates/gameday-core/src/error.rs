use thiserror::Error;

#[derive(Debug, Error)]
pub enum GamedayError {
    #[error("not initialized: run 'gameday init'")]
    NotInitialized,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid workflow '{name}': {reason}")]
    InvalidWorkflow { name: String, reason: String },

    #[error("duplicate workflow name: {0}")]
    DuplicateWorkflow(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("invalid name '{0}': must be lowercase alphanumeric with hyphens or underscores")]
    InvalidName(String),

    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("schedule lookup failed: {0}")]
    Schedule(String),

    #[error("presence index unavailable: {0}")]
    Presence(String),

    #[error("recovery publish failed: {0}")]
    Recovery(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("evaluation of '{workflow}' failed: {message}")]
    Evaluation { workflow: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl GamedayError {
    pub(crate) fn ledger(e: impl std::fmt::Display) -> Self {
        GamedayError::Ledger(e.to_string())
    }

    pub(crate) fn evaluation(workflow: &str, message: impl Into<String>) -> Self {
        GamedayError::Evaluation {
            workflow: workflow.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GamedayError>;
