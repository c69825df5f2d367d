use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConclaveError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("No candidate worker: {0}")]
    NoCandidate(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Working directory is not versioned: {0}")]
    NotVersioned(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
