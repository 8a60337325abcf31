//! Configuration data model.
//!
//! This module holds struct/enum definitions plus default values. Loading and
//! precedence live in `config::mod`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::defaults::{
    DEFAULT_CHATS_DIR, DEFAULT_CHECKPOINTS_ROOT, DEFAULT_CONFIG_LOG_FILE, DEFAULT_CONTEXT_WINDOW,
    DEFAULT_INPUT_PROMPT, DEFAULT_LOG_LEVEL, DEFAULT_MODEL_ARGS, DEFAULT_MODEL_COMMAND,
    DEFAULT_MODEL_ENV, DEFAULT_NUM_SAMPLES, DEFAULT_TASK_PREFIX, DEFAULT_TEMPERATURE,
    DEFAULT_TRANSCRIPT_FILE, DEFAULT_TURN_LABELS, DEFAULT_TURN_PREFIXES, DEFAULT_TURN_SEPARATOR,
    DEFAULT_UTC_OFFSET_HOURS,
};
use crate::checkpoint::CheckpointSelector;
use crate::prompt::TurnFormat;

/// When "latest" is resolved against the model directory.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointResolution {
    /// Rescan before every request; follows a training run in progress.
    #[default]
    EveryRequest,
    /// Scan once and reuse the step for the rest of the session.
    OncePerSession,
}

/// How several completions for one prompt become a single raw reply.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionPolicy {
    /// Join every completion with a newline.
    #[default]
    JoinAll,
    /// Keep only the first completion.
    First,
}

/// What the session does after a turn-fatal inference error.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    EndSession,
    /// Report the error, keep the unanswered input and re-submit it on the
    /// next line the user enters.
    Retry,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub chat: ChatConfig,
    pub transcript: TranscriptConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

/// External model process and checkpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Run directory holding checkpoints. Discovered under
    /// `checkpoints_root` when omitted.
    pub model_dir: Option<PathBuf>,
    pub checkpoints_root: PathBuf,
    pub step: CheckpointSelector,
    pub checkpoint_resolution: CheckpointResolution,
    /// Program plus leading arguments.
    pub command: Vec<String>,
    /// Argument templates; see `gateway::process` for placeholders.
    pub args: Vec<String>,
    pub temperature: f64,
    pub max_length: Option<u32>,
    pub num_samples: u32,
    /// Serialize all requests through one admission queue.
    pub exclusive: bool,
    pub env: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            checkpoints_root: PathBuf::from(DEFAULT_CHECKPOINTS_ROOT),
            step: CheckpointSelector::Latest,
            checkpoint_resolution: CheckpointResolution::EveryRequest,
            command: to_strings(DEFAULT_MODEL_COMMAND),
            args: to_strings(DEFAULT_MODEL_ARGS),
            temperature: DEFAULT_TEMPERATURE,
            max_length: None,
            num_samples: DEFAULT_NUM_SAMPLES,
            exclusive: false,
            env: DEFAULT_MODEL_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Prompt shape and turn-loop behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub task_prefix: String,
    /// `[human, model]` prefixes applied inside the model prompt.
    pub turn_prefixes: [String; 2],
    pub turn_separator: String,
    /// Trailing turns included in each prompt.
    pub context_window: usize,
    /// `[human, model]` markers used to cut replies. Defaults to the trimmed
    /// turn prefixes.
    pub stop_markers: Option<[String; 2]>,
    /// Console prompt printed before each read.
    pub prompt: String,
    pub completions: CompletionPolicy,
    pub on_inference_failure: FailurePolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            task_prefix: DEFAULT_TASK_PREFIX.to_string(),
            turn_prefixes: DEFAULT_TURN_PREFIXES.map(String::from),
            turn_separator: DEFAULT_TURN_SEPARATOR.to_string(),
            context_window: DEFAULT_CONTEXT_WINDOW,
            stop_markers: None,
            prompt: DEFAULT_INPUT_PROMPT.to_string(),
            completions: CompletionPolicy::JoinAll,
            on_inference_failure: FailurePolicy::EndSession,
        }
    }
}

impl ChatConfig {
    /// Borrowed view used by the prompt formatter.
    pub fn turn_format(&self) -> TurnFormat<'_> {
        TurnFormat {
            task_prefix: &self.task_prefix,
            turn_prefixes: [&self.turn_prefixes[0], &self.turn_prefixes[1]],
            turn_separator: &self.turn_separator,
        }
    }

    /// Effective `[human, model]` stop markers.
    pub fn effective_stop_markers(&self) -> [String; 2] {
        match &self.stop_markers {
            Some(markers) => markers.clone(),
            None => self.turn_prefixes.clone().map(|p| p.trim().to_string()),
        }
    }
}

/// Transcript and config-snapshot persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub enabled: bool,
    /// Base directory for relative file templates.
    pub dir: PathBuf,
    /// Placeholders: `{run}`, `{step}`, `{timestamp}`, `{hostname}`.
    pub output_file: String,
    pub config_log_file: String,
    /// Minimum history length before anything is written.
    pub save_threshold: usize,
    /// `[human, model]` labels used in the transcript file.
    pub turn_labels: [String; 2],
    pub utc_offset_hours: i32,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_CHATS_DIR),
            output_file: DEFAULT_TRANSCRIPT_FILE.to_string(),
            config_log_file: DEFAULT_CONFIG_LOG_FILE.to_string(),
            save_threshold: 0,
            turn_labels: DEFAULT_TURN_LABELS.map(String::from),
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Where the loaded configuration text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local,
    Global(PathBuf),
    BuiltInDefaults,
}

/// Loaded config plus non-fatal notes surfaced at startup.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
    pub diagnostics: Vec<String>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
