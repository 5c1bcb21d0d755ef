//! Error types shared across the engine.
//!
//! Only the file-level [`ConfigError`] variants stop a run. Everything else is
//! turned into a report message by the engine and the run moves on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the configuration file or with a single profile in it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file {0} not found")]
    NotFound(PathBuf),

    /// The configuration file exists but could not be read.
    #[error("Unable to read configuration file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not a YAML sequence of profiles.
    #[error("Malformed configuration file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Configuration error: {field} is not set for {profile}")]
    MissingField { profile: String, field: &'static str },

    #[error("Configuration error: {field} has unsupported value '{value}' for {profile}")]
    InvalidValue {
        profile: String,
        field: &'static str,
        value: String,
    },

    #[error("Configuration error: invalid file pattern for {profile}: {source}")]
    InvalidPattern {
        profile: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration error: rename template for {profile} uses YEAR but the file pattern has no capture group")]
    YearWithoutGroup { profile: String },

    #[error("Configuration error: {profile}: {reason}")]
    Conflict { profile: String, reason: String },

    /// A field of the profile has the wrong YAML type
    #[error("Configuration error: {profile} could not be read: {reason}")]
    BadField { profile: String, reason: String },

    #[error("Configuration error: profile name {profile} is used more than once")]
    DuplicateName { profile: String },
}

impl ConfigError {
    /// True for errors that mean no profile can be processed at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConfigError::NotFound(_) | ConfigError::Unreadable { .. } | ConfigError::Malformed { .. }
        )
    }
}

/// A directory the profile depends on does not exist.
#[derive(Debug, Error)]
#[error("Error: {label} directory {} not found", path.display())]
pub struct DirectoryError {
    pub label: &'static str,
    pub path: PathBuf,
}

/// Network or protocol level failures reported by a transfer client.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to connect to {site}:{port}. Error was: {reason}")]
    Connect { site: String, port: u16, reason: String },

    #[error("Login failed: {user}@{site}. Error was: {reason}")]
    Login {
        user: String,
        site: String,
        reason: String,
    },

    /// The server rejected or failed an operation.
    #[error("{0}")]
    Remote(String),

    /// The local side of a transfer failed (temporary file, rename).
    #[error("Local file error on {}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external `scp` command failed.
    #[error("Failed: {command}. Error was: {stderr}")]
    Command { command: String, stderr: String },

    #[error("No open session")]
    NotConnected,

    #[error("{0} is not supported by this protocol")]
    Unsupported(&'static str),
}

/// Local copy, move and decompression failures.
#[derive(Debug, Error)]
pub enum LocalIoError {
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to gunzip {}: {source}", path.display())]
    Gunzip {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to untar {}: {source}", path.display())]
    Untar {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set permissions on {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list directory {}: {source}", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create {}: {source}", path.display())]
    Flag {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Queue file access failures.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The lock marker was still present after the bounded wait.
    #[error("{} is locked", .0.display())]
    Locked(PathBuf),

    #[error("{} not found", .0.display())]
    Missing(PathBuf),

    #[error("Queue file {} could not be accessed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
