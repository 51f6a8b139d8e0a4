use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::profile::{ProfileField, ValidationIssue};

#[derive(Error, Debug)]
pub enum ConfiguratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration source error: {0}")]
    Source(#[from] SourceError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Errors raised while loading the configuration directory.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Invalid API version '{version}' in '{path}', expected '{expected}'")]
    InvalidApiVersion {
        path: PathBuf,
        version: String,
        expected: String,
    },

    #[error("Unknown resource kind '{kind}' in '{path}'")]
    UnknownKind { path: PathBuf, kind: String },

    #[error("Duplicate resource name '{name}' for kind '{kind}'")]
    DuplicateName { kind: String, name: String },

    #[error("Invalid {kind} name '{name}': must be a symbol")]
    InvalidName { kind: String, name: String },

    #[error("{kind} '{name}' references unknown {target_kind} '{target}'")]
    UnknownReference {
        kind: String,
        name: String,
        target_kind: String,
        target: String,
    },

    #[error("Template '{name}' must set exactly one of 'src' or 'body'")]
    TemplateBody { name: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors returned by a configuration source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Request to configuration source failed: {0}")]
    Request(String),

    #[error("Configuration source timed out: {0}")]
    Timeout(String),

    #[error("Configuration source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration source response is missing the configuration version")]
    MissingVersion,
}

impl SourceError {
    /// Returns true if the error is likely transient and the call can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Request(_) | SourceError::Timeout(_) => true,
            SourceError::Status { status, .. } => *status >= 500 || *status == 429,
            SourceError::BadRequest(_) | SourceError::MissingVersion => false,
        }
    }
}

/// Errors returned by a service manager.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("Unit '{unit}' not found")]
    UnitNotFound { unit: String },

    #[error("Permission denied reloading '{unit}': {message}")]
    PermissionDenied { unit: String, message: String },

    #[error("Reloading '{unit}' failed: {message}")]
    ReloadFailed { unit: String, message: String },
}

/// Errors raised compiling, rendering or writing templates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Failed to read template source '{path}': {message}")]
    ReadSource { path: PathBuf, message: String },

    #[error("Unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },

    #[error("Invalid placeholder '{placeholder}'")]
    InvalidPlaceholder { placeholder: String },

    #[error("Placeholder references profile '{profile}' which the template does not declare")]
    UndeclaredProfile { profile: String },

    #[error("Template has not been compiled")]
    NotCompiled,

    #[error("Profile '{profile}' has not been applied")]
    ProfileNotApplied { profile: String },

    #[error("Key '{path}' not found in profile '{profile}'")]
    MissingKey { profile: String, path: String },

    #[error("Failed to write '{path}': {message}")]
    Write { path: PathBuf, message: String },
}

/// A single failure recorded against one entity (profile, template, service)
/// in an operation's error map.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid profile: {}", format_issues(.0))]
    InvalidProfile(BTreeMap<ProfileField, Vec<ValidationIssue>>),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },
}

fn format_issues(issues: &BTreeMap<ProfileField, Vec<ValidationIssue>>) -> String {
    issues
        .iter()
        .map(|(field, list)| {
            let joined: Vec<String> = list.iter().map(|i| i.to_string()).collect();
            format!("{} {}", field, joined.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ConfiguratorError>;
