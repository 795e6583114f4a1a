//! Error types for dirvana
//!
//! Every store and loader has its own error enum so callers can tell a
//! broken config file apart from a corrupt cache or a declined approval.
//! [`Error`] wraps them all for the export pipeline.

use std::path::PathBuf;

/// Errors raised while reading or decoding a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid env variable '{name}': {reason}")]
    InvalidEnv { name: String, reason: String },

    #[error("Invalid alias '{name}': {reason}")]
    InvalidAlias { name: String, reason: String },
}

/// Errors raised by the authorization store
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to read authorization file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write authorization file {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Authorization file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Directory is not authorized: {0}")]
    NotAllowed(PathBuf),
}

/// Errors raised by the cache store
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write cache file {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Cache file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Malformed condition tree on an alias
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("Malformed condition: {0}")]
    Malformed(String),
}

/// Shell-command approval failed or was refused
#[derive(Debug, thiserror::Error)]
pub enum ShellApprovalError {
    #[error("Shell commands for {0} were not approved")]
    Declined(PathBuf),

    #[error("Failed to read approval from terminal: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("Failed to persist shell-command approval: {0}")]
    Persist(#[from] AuthError),
}

/// Crate-wide error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    ShellApproval(#[from] ShellApprovalError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
