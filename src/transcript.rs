//! Transcript and configuration-snapshot persistence.
//!
//! Paths are rendered once per session from templates, so every write within
//! a session overwrites the same files. Writes go to a sibling temp file and
//! are renamed into place.

use crate::config::{ModelConfig, TranscriptConfig};
use crate::error::PersistError;
use crate::prompt::prefix_cycle;
use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Fallback `{run}` value when the model directory has no usable name.
const UNNAMED_RUN: &str = "run";
const SECONDS_PER_HOUR: i32 = 3600;

/// Values substituted into transcript path templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathVars {
    pub run: String,
    pub step: String,
    pub timestamp: String,
    pub hostname: String,
}

impl PathVars {
    /// Capture the session's template values at `now`.
    pub fn capture(model: &ModelConfig, utc_offset_hours: i32, now: DateTime<Utc>) -> Self {
        let run = model
            .model_dir
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_RUN)
            .to_string();
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            run,
            step: model.step.to_string(),
            timestamp: session_timestamp(now, utc_offset_hours),
            hostname,
        }
    }

    pub fn render(&self, template: &str) -> String {
        template
            .replace("{run}", &self.run)
            .replace("{step}", &self.step)
            .replace("{timestamp}", &self.timestamp)
            .replace("{hostname}", &self.hostname)
    }
}

/// ISO-8601 timestamp with millisecond precision in a fixed UTC offset.
pub fn session_timestamp(now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours * SECONDS_PER_HOUR)
        .unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Where one session's transcript and config snapshot are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub transcript: PathBuf,
    pub config_log: Option<PathBuf>,
}

impl SessionPaths {
    /// Resolve templates relative to `transcript.dir`. `None` when
    /// persistence is disabled.
    pub fn resolve(transcript: &TranscriptConfig, vars: &PathVars) -> Option<Self> {
        if !transcript.enabled || transcript.output_file.trim().is_empty() {
            return None;
        }
        let config_log = Some(transcript.config_log_file.as_str())
            .filter(|template| !template.trim().is_empty())
            .map(|template| transcript.dir.join(vars.render(template)));
        Some(Self {
            transcript: transcript.dir.join(vars.render(&transcript.output_file)),
            config_log,
        })
    }
}

/// Render the full history with speaker labels, one turn per line.
///
/// Line breaks inside a turn are written as a literal `\n`.
pub fn render_transcript(turns: &[String], labels: [&str; 2]) -> String {
    let escaped: Vec<String> = turns.iter().map(|turn| escape_line_breaks(turn)).collect();
    prefix_cycle(&escaped, labels).join("\n")
}

fn escape_line_breaks(turn: &str) -> String {
    turn.replace("\r\n", "\\n")
        .replace(['\n', '\r'], "\\n")
}

/// Write the labelled transcript for `turns` to `path`.
pub fn write_transcript(
    path: &Path,
    turns: &[String],
    labels: [&str; 2],
) -> Result<(), PersistError> {
    write_atomic(path, &render_transcript(turns, labels))
}

/// Write the serialized configuration snapshot to `path`.
pub fn write_config_snapshot(path: &Path, snapshot: &str) -> Result<(), PersistError> {
    write_atomic(path, snapshot)
}

/// Write the transcript and, when given and a snapshot path is configured,
/// the configuration snapshot.
pub fn persist(
    turns: &[String],
    labels: [&str; 2],
    paths: &SessionPaths,
    config_snapshot: Option<&str>,
) -> Result<(), PersistError> {
    write_transcript(&paths.transcript, turns, labels)?;
    if let (Some(snapshot), Some(path)) = (config_snapshot, &paths.config_log) {
        write_config_snapshot(path, snapshot)?;
    }
    Ok(())
}

/// Create parent directories, write a sibling temp file, then rename.
fn write_atomic(path: &Path, contents: &str) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)
}
