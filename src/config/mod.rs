//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. CLI overrides, applied by the binary after loading.
//! 2. Environment variables (`CONVAI_MODEL_DIR`, `CONVAI_CHATS_DIR`,
//!    `CONVAI_STEP`, `CONVAI_CONTEXT_WINDOW`, `CONVAI_LOG_LEVEL`) with legacy
//!    `CONVERSATIONAL_AI_*` fallback.
//! 3. TOML file specified via `--config`
//! 4. ./convai.toml in the current directory
//! 5. $XDG_CONFIG_HOME/convai/convai.toml (or ~/.config/convai/convai.toml)
//! 6. Built-in defaults
//!
//! The result is validated once with [`Config::validate`] before a session
//! starts.

use crate::error::{ConfigError, PersistError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

mod defaults;
mod env;
mod types;

use env::{apply_runtime_env_overrides, collect_legacy_env_warnings};
pub use types::{
    ChatConfig, CheckpointResolution, CompletionPolicy, Config, ConfigSource, DisplayConfig,
    FailurePolicy, LoadedConfig, LoggingConfig, ModelConfig, TranscriptConfig,
};

const LOCAL_CONFIG_FILE: &str = "convai.toml";
const CONFIG_DIR_NAME: &str = "convai";

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from `--config`).
pub fn load_config(path_override: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        dirs::config_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&Path>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&text)?;
    apply_runtime_env_overrides(&mut config, &env_lookup)?;

    let mut diagnostics = Vec::new();
    collect_legacy_env_warnings(&mut diagnostics, &env_lookup);

    Ok(LoadedConfig {
        config,
        source,
        diagnostics,
    })
}

fn read_config_text<FRead, FRoot>(
    path_override: Option<&Path>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(path) = path_override {
        let text = read_file(path)?;
        return Ok((text, ConfigSource::Explicit(path.to_path_buf())));
    }
    if let Ok(text) = read_file(Path::new(LOCAL_CONFIG_FILE)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join(CONFIG_DIR_NAME).join(LOCAL_CONFIG_FILE);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }
    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

// ---------------------------------------------------------------------------
// Resolution and validation
// ---------------------------------------------------------------------------

impl Config {
    /// Reject values that cannot start a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.context_window == 0 {
            return Err(invalid("chat.context_window must be a positive number of turns"));
        }
        // Each prompt is one line of the request file.
        let chat = &self.chat;
        for (name, value) in [
            ("chat.task_prefix", &chat.task_prefix),
            ("chat.turn_prefixes", &chat.turn_prefixes[0]),
            ("chat.turn_prefixes", &chat.turn_prefixes[1]),
            ("chat.turn_separator", &chat.turn_separator),
        ] {
            if value.contains(['\n', '\r']) {
                return Err(invalid(format!("{name} cannot contain line breaks")));
            }
        }
        if self.model.command.is_empty() || self.model.command[0].trim().is_empty() {
            return Err(invalid("model.command must name a program"));
        }
        if self.model.num_samples == 0 {
            return Err(invalid("model.num_samples must be at least 1"));
        }
        if !self.model.temperature.is_finite() || self.model.temperature < 0.0 {
            return Err(invalid("model.temperature must be a non-negative number"));
        }
        if !(-23..=23).contains(&self.transcript.utc_offset_hours) {
            return Err(invalid("transcript.utc_offset_hours must be within -23..=23"));
        }
        if self.transcript.enabled && self.transcript.output_file.trim().is_empty() {
            return Err(invalid("transcript.output_file cannot be empty"));
        }
        Ok(())
    }

    /// Fill in `model.model_dir` from `checkpoints_root` when it is unset.
    ///
    /// The most recently modified run directory wins.
    pub fn resolve_model_dir(&mut self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.model.model_dir {
            return Ok(dir.clone());
        }
        let root = &self.model.checkpoints_root;
        let dir = most_recent_subdir(root)?.ok_or_else(|| {
            invalid(format!(
                "no model.model_dir configured and no run directories under {}",
                root.display()
            ))
        })?;
        self.model.model_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Serialized effective configuration written next to the transcript.
    pub fn snapshot(&self) -> Result<String, PersistError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn most_recent_subdir(root: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io(e)),
    };
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified()?;
        match &newest {
            Some((best, _)) if modified <= *best => {}
            _ => newest = Some((modified, entry.path())),
        }
    }
    Ok(newest.map(|(_, path)| path))
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
