//! Error types for `AssetPack`

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The error type for `AssetPack` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Configuration Errors ====================
    /// The configuration file could not be parsed.
    #[error("invalid config {path}: {message}")]
    ConfigParseFailed {
        /// The configuration file.
        path: PathBuf,
        /// The TOML parser message.
        message: String,
    },

    /// A pattern rule is not a valid regular expression.
    #[error("invalid pattern in `{field}`: {message}")]
    InvalidPattern {
        /// The configuration field holding the pattern.
        field: &'static str,
        /// The regex compiler message.
        message: String,
    },

    /// The configuration could not be rendered back to TOML.
    #[error("config serialization failed: {0}")]
    ConfigSerializeFailed(String),

    // ==================== External Tool Errors ====================
    /// An encoder binary is not installed or not on `PATH`.
    #[error("required tool `{tool}` was not found")]
    ToolNotFound {
        /// The program name that was looked up.
        tool: String,
    },

    /// An encoder exited with a non-zero status.
    #[error("`{tool}` failed ({status}): {stderr}")]
    ToolFailed {
        /// The program name.
        tool: String,
        /// Exit status description.
        status: String,
        /// Tail of the captured stderr.
        stderr: String,
    },

    /// An encoder did not finish inside the configured timeout and was killed.
    #[error("`{tool}` timed out after {timeout:?}")]
    ToolTimedOut {
        /// The program name.
        tool: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// An encoder reported success but did not write its output file.
    #[error("`{tool}` produced no output at {path}")]
    ToolNoOutput {
        /// The program name.
        tool: String,
        /// The expected output path.
        path: PathBuf,
    },

    // ==================== Model Errors ====================
    /// The model is a Git LFS pointer instead of real content.
    #[error("{path} is a Git LFS pointer; run `git lfs pull` to fetch the real asset")]
    LfsPointer {
        /// The offending file.
        path: PathBuf,
    },

    /// The GLB container is malformed.
    #[error("invalid GLB {path}: {message}")]
    InvalidGlb {
        /// The offending file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// The glTF JSON document is malformed or uses something we cannot rewrite.
    #[error("invalid glTF {path}: {message}")]
    InvalidGltf {
        /// The offending file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// Neither geometry codec produced a usable candidate.
    #[error("no valid compression candidate for {path}")]
    NoCandidate {
        /// The model being packed.
        path: PathBuf,
    },

    // ==================== Image Errors ====================
    /// Image decode or encode failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// libwebp rejected the image.
    #[error("WebP encoding failed: {0}")]
    WebpEncode(String),

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 payload in a `data:` URI could not be decoded.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

impl From<tempfile::PathPersistError> for Error {
    fn from(err: tempfile::PathPersistError) -> Self {
        Error::Io(err.error)
    }
}

/// A specialized Result type for `AssetPack` operations.
pub type Result<T> = std::result::Result<T, Error>;
