use thiserror::Error;

use crate::services::ServiceError;

/// Client-facing messages. Wording is a compatibility surface.
pub mod msg {
    pub const USER_SETTINGS_LOADING: &str = "Server could not load the user information database";
    pub const USER_ID_INVALID: &str = "User id is invalid";
    pub const ACTION_INVALID: &str = "Action is invalid";
    pub const LANGUAGE_INVALID: &str = "Language is invalid";
    pub const TRAINING_SETTINGS_LOADING: &str =
        "Server could not load the training settings database";

    pub const INSTANCE_COUNT_MISSING: &str = "Instance count is missing";
    pub const INSTANCE_COUNT_INVALID: &str = "Instance count is invalid";
    pub const TRAINING_TYPE_MISSING: &str = "Training type is invalid or missing";
    pub const SCENARIO_NAME_MISSING: &str = "Scenario name is missing";
    pub const LEVEL_NAME_MISSING: &str = "Level name is missing";
    pub const SESSION_ID_MISSING: &str = "Session id is missing";

    pub const SESSION_ALLOCATION: &str =
        "Server could not allocate a new session (maximum number reached)";
    pub const SESSION_INFO_CONSISTENCY: &str =
        "Server encountered a session information consistency issue";

    pub const CONTENT_IDENTIFICATION: &str =
        "Server could not determine the training content for the specified scenario and level";
    pub const CONTENT_LOADING: &str = "Server could not load the training content";
    pub const CONTENT_UPLOAD: &str = "LMS content manager could not upload the training content";
    pub const CONTENT_REMOVAL: &str = "LMS content manager could not remove the training activity";
    pub const CONTENT_SERVER: &str = "Server could not communicate with the LMS content manager";

    pub const TEMPLATE_IDENTIFICATION: &str = "Server could not determine the cyber range template for the specified scenario and level";
    pub const TEMPLATE_LOADING: &str = "Server could not load the cyber range template";

    pub const INSTANTIATION_SERVER: &str =
        "Server could not communicate with the cyber range manager";
    pub const INSTANTIATION: &str = "Cyber range manager could not instantiate the cyber range";
    pub const DESTRUCTION: &str = "Cyber range manager could not destroy the cyber range";

    pub const META_ANSWERS_MISSING: &str = "Failed to parse meta answers from creation log.";
    pub const CONTENT_TEMPLATE: &str = "Error processing content template.";
}

/// External call a workflow was making when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ContentUpload,
    ContentRemoval,
    Instantiation,
    Destruction,
    CreationLog,
}

impl Stage {
    fn rejected_message(self) -> &'static str {
        match self {
            Stage::ContentUpload => msg::CONTENT_UPLOAD,
            Stage::ContentRemoval => msg::CONTENT_REMOVAL,
            Stage::Instantiation => msg::INSTANTIATION,
            Stage::Destruction => msg::DESTRUCTION,
            Stage::CreationLog => msg::INSTANTIATION_SERVER,
        }
    }

    fn unreachable_message(self) -> &'static str {
        match self {
            Stage::ContentUpload | Stage::ContentRemoval => msg::CONTENT_SERVER,
            Stage::Instantiation | Stage::Destruction | Stage::CreationLog => {
                msg::INSTANTIATION_SERVER
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    AllocationExhausted,
    Upstream,
    Parse,
    Consistency,
    Internal,
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("{0}")]
    Validation(String),

    #[error("{}", msg::SESSION_ALLOCATION)]
    AllocationExhausted,

    #[error("{message}")]
    Upstream {
        stage: Stage,
        message: &'static str,
        detail: String,
    },

    #[error("{0}")]
    Parse(&'static str),

    #[error("Session with ID {id} doesn't exist for user {user}")]
    SessionNotFound { id: String, user: String },

    #[error("{}", msg::SESSION_INFO_CONSISTENCY)]
    Consistency,

    /// Database file that could not be read or understood.
    #[error("{message}")]
    Resource {
        message: &'static str,
        detail: String,
    },

    #[error("{}", msg::SESSION_INFO_CONSISTENCY)]
    Registry(#[source] anyhow::Error),
}

impl TrainingError {
    pub fn validation(message: impl Into<String>) -> Self {
        TrainingError::Validation(message.into())
    }

    pub fn upstream(stage: Stage, err: ServiceError) -> Self {
        let message = match &err {
            ServiceError::Http(_) => stage.unreachable_message(),
            ServiceError::Rejected(_) | ServiceError::InvalidResponse(_) => {
                stage.rejected_message()
            }
        };

        TrainingError::Upstream {
            stage,
            message,
            detail: summarize(&err.to_string()),
        }
    }

    pub fn resource(message: &'static str, detail: impl std::fmt::Display) -> Self {
        TrainingError::Resource {
            message,
            detail: summarize(&detail.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TrainingError::Validation(_) => ErrorKind::Validation,
            TrainingError::AllocationExhausted => ErrorKind::AllocationExhausted,
            TrainingError::Upstream { .. } => ErrorKind::Upstream,
            TrainingError::Parse(_) => ErrorKind::Parse,
            TrainingError::SessionNotFound { .. } | TrainingError::Consistency => {
                ErrorKind::Consistency
            }
            TrainingError::Resource { .. } | TrainingError::Registry(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for TrainingError {
    fn from(e: anyhow::Error) -> Self {
        TrainingError::Registry(e)
    }
}

/// Bounds free-form upstream text before it reaches a log line.
pub fn summarize(detail: &str) -> String {
    const MAX: usize = 160;
    match detail.char_indices().nth(MAX) {
        Some((cut, _)) => format!("ERR:{}", &detail[..cut]),
        None => detail.to_string(),
    }
}
