//! Unified error types for the chat pipeline.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading, parsing or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    /// A required value is missing or out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Errors raised while obtaining completions from the model.
#[derive(Debug)]
pub enum GatewayError {
    /// "latest" was requested but the model directory holds no checkpoint.
    NoCheckpointFound(PathBuf),
    /// The external model process could not be started or exited non-zero.
    ModelProcessFailed(String),
    /// The model ran but produced no decodable output lines.
    EmptyOutput(String),
    /// An output line could not be decoded back to UTF-8 text.
    Decode(String),
    /// Scratch-directory or output-fragment I/O failed.
    Io(std::io::Error),
}

impl GatewayError {
    /// True when only the current turn is lost and the session may go on.
    ///
    /// Missing checkpoints and scratch I/O failures will not fix themselves
    /// between turns, so those end the session.
    pub fn is_turn_fatal(&self) -> bool {
        matches!(
            self,
            Self::ModelProcessFailed(_) | Self::EmptyOutput(_) | Self::Decode(_)
        )
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCheckpointFound(dir) => {
                write!(f, "no checkpoint found in {}", dir.display())
            }
            Self::ModelProcessFailed(msg) => write!(f, "model process failed: {msg}"),
            Self::EmptyOutput(msg) => write!(f, "model produced no output: {msg}"),
            Self::Decode(msg) => write!(f, "undecodable model output: {msg}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// PersistError
// ---------------------------------------------------------------------------

/// Errors writing the transcript or configuration snapshot.
#[derive(Debug)]
pub enum PersistError {
    Io { path: PathBuf, source: std::io::Error },
    Serialize(toml::ser::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to write {}: {source}", path.display()),
            Self::Serialize(e) => write!(f, "failed to serialize config snapshot: {e}"),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<toml::ser::Error> for PersistError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Serialize(e)
    }
}

// ---------------------------------------------------------------------------
// SessionError (top level)
// ---------------------------------------------------------------------------

/// Errors that end an interactive session.
#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Gateway(GatewayError),
    /// Reading from the console failed for a reason other than end-of-input.
    Input(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Gateway(e) => write!(f, "inference: {e}"),
            Self::Input(e) => write!(f, "input: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<GatewayError> for SessionError {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e)
    }
}
