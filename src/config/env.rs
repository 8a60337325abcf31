//! Environment override and legacy env-alias handling.
//!
//! Canonical `CONVAI_*` variables take precedence. Legacy
//! `CONVERSATIONAL_AI_*` aliases are accepted and surfaced via diagnostics.

use crate::error::ConfigError;
use std::path::PathBuf;

use super::Config;

const CANONICAL_PREFIX: &str = "CONVAI_";
const LEGACY_PREFIX: &str = "CONVERSATIONAL_AI_";

/// Setting names recognised under both prefixes.
const OVERRIDE_KEYS: &[&str] = &[
    "MODEL_DIR",
    "CHATS_DIR",
    "STEP",
    "CONTEXT_WINDOW",
    "LOG_LEVEL",
];

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env_setting(env_lookup, "MODEL_DIR") {
        config.model.model_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = env_setting(env_lookup, "CHATS_DIR") {
        config.transcript.dir = PathBuf::from(dir);
    }
    if let Some(step) = env_setting(env_lookup, "STEP") {
        config.model.step = step
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid CONVAI_STEP: {e}")))?;
    }
    if let Some(window) = env_setting(env_lookup, "CONTEXT_WINDOW") {
        config.chat.context_window = window.trim().parse::<usize>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid CONVAI_CONTEXT_WINDOW value `{window}`: expected a positive integer"
            ))
        })?;
    }
    if let Some(level) = env_setting(env_lookup, "LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

/// Resolve `CONVAI_<key>` or, if absent, `CONVERSATIONAL_AI_<key>`.
fn env_setting<FEnv>(env_lookup: &FEnv, key: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(&format!("{CANONICAL_PREFIX}{key}"))
        .or_else(|| env_lookup(&format!("{LEGACY_PREFIX}{key}")))
        .filter(|value| !value.trim().is_empty())
}

/// Record diagnostics for legacy aliases used without a canonical variable.
pub(super) fn collect_legacy_env_warnings<FEnv>(diagnostics: &mut Vec<String>, env_lookup: &FEnv)
where
    FEnv: Fn(&str) -> Option<String>,
{
    for key in OVERRIDE_KEYS {
        let canonical = format!("{CANONICAL_PREFIX}{key}");
        let legacy = format!("{LEGACY_PREFIX}{key}");
        if env_lookup(&canonical).is_none() && env_lookup(&legacy).is_some() {
            diagnostics.push(format!(
                "Environment variable `{legacy}` is deprecated; use `{canonical}` instead."
            ));
        }
    }
}
