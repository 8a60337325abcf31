//! Checkpoint selection and resolution against a model directory.
//!
//! Checkpoint artifacts encode their training step in the file name
//! (`model.ckpt-12000.index`, `model.ckpt-12000.data-00000-of-00002`, ...).
//! "latest" resolves to the highest step present at call time; nothing is
//! cached here, callers decide whether to memoize.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// File-name marker that precedes the step number of a checkpoint artifact.
const CHECKPOINT_STEP_MARKER: &str = "ckpt-";
/// Symbolic selector value meaning "most recent checkpoint".
const LATEST: &str = "latest";
/// Numeric sentinel accepted as an alias for [`LATEST`].
const LATEST_SENTINEL: i64 = -1;

/// Which checkpoint should serve inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSelector", into = "RawSelector")]
pub enum CheckpointSelector {
    #[default]
    Latest,
    Step(u64),
}

/// Wire shape accepted in TOML: either an integer or the string "latest".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Int(i64),
    Text(String),
}

impl TryFrom<RawSelector> for CheckpointSelector {
    type Error = String;

    fn try_from(raw: RawSelector) -> Result<Self, Self::Error> {
        match raw {
            RawSelector::Int(LATEST_SENTINEL) => Ok(Self::Latest),
            RawSelector::Int(step) => u64::try_from(step)
                .map(Self::Step)
                .map_err(|_| format!("checkpoint step must be non-negative, got {step}")),
            RawSelector::Text(text) => text.parse(),
        }
    }
}

impl From<CheckpointSelector> for RawSelector {
    fn from(selector: CheckpointSelector) -> Self {
        match selector {
            CheckpointSelector::Latest => Self::Text(LATEST.to_string()),
            // Parsing caps steps at i64::MAX; larger values round-trip as text
            // and are rejected on reload instead of wrapping to -1.
            CheckpointSelector::Step(step) => i64::try_from(step)
                .map(Self::Int)
                .unwrap_or_else(|_| Self::Text(step.to_string())),
        }
    }
}

impl FromStr for CheckpointSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(LATEST) || trimmed == "-1" {
            return Ok(Self::Latest);
        }
        let step = trimmed
            .parse::<u64>()
            .map_err(|_| format!("expected a checkpoint step or `latest`, got `{trimmed}`"))?;
        if i64::try_from(step).is_err() {
            return Err(format!("checkpoint step {step} is out of range"));
        }
        Ok(Self::Step(step))
    }
}

impl fmt::Display for CheckpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Step(step) => write!(f, "{step}"),
        }
    }
}

impl CheckpointSelector {
    /// Resolve to a concrete step, scanning `model_dir` for "latest".
    pub fn resolve(self, model_dir: &Path) -> Result<u64, GatewayError> {
        match self {
            Self::Step(step) => Ok(step),
            Self::Latest => latest_checkpoint_step(model_dir),
        }
    }
}

/// Highest checkpoint step discoverable in `model_dir`.
pub fn latest_checkpoint_step(model_dir: &Path) -> Result<u64, GatewayError> {
    let entries = match std::fs::read_dir(model_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GatewayError::NoCheckpointFound(model_dir.to_path_buf()));
        }
        Err(e) => return Err(GatewayError::Io(e)),
    };

    let mut latest = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(step) = name.to_str().and_then(checkpoint_step_from_file_name) else {
            continue;
        };
        latest = latest.max(Some(step));
    }

    latest.ok_or_else(|| GatewayError::NoCheckpointFound(model_dir.to_path_buf()))
}

/// Extract the step number from a checkpoint artifact file name.
pub fn checkpoint_step_from_file_name(name: &str) -> Option<u64> {
    let (_, rest) = name.split_once(CHECKPOINT_STEP_MARKER)?;
    let digits_end = rest
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..digits_end].parse().ok()
}
