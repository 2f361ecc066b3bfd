//! Error types for S4AC Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum S4acError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Failed to load RDF: {0}")]
    Load(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Rewrite error: {0}")]
    Rewrite(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Regex error: {0}")]
    RegexError(String),
}

impl From<regex::Error> for S4acError {
    fn from(err: regex::Error) -> Self {
        S4acError::RegexError(err.to_string())
    }
}

impl From<notify::Error> for S4acError {
    fn from(err: notify::Error) -> Self {
        S4acError::Watch(err.to_string())
    }
}

impl From<oxigraph::store::StorageError> for S4acError {
    fn from(err: oxigraph::store::StorageError) -> Self {
        S4acError::Store(err.to_string())
    }
}

impl From<oxigraph::sparql::EvaluationError> for S4acError {
    fn from(err: oxigraph::sparql::EvaluationError) -> Self {
        S4acError::Query(err.to_string())
    }
}

impl S4acError {
    /// True for errors that represent an authorization decision rather than a fault
    pub fn is_denial(&self) -> bool {
        matches!(self, S4acError::AccessDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, S4acError>;
