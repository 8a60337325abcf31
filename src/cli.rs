//! CLI argument parsing via clap.

use clap::Parser;
use convai::build_info::LONG_VERSION;
use convai::checkpoint::CheckpointSelector;
use convai::config::Config;
use std::path::PathBuf;

/// Chat interactively with a trained conversational model checkpoint.
#[derive(Debug, Parser)]
#[command(name = "convai", version, long_version = LONG_VERSION)]
pub struct Args {
    /// Path to config file (default: ./convai.toml or ~/.config/convai/convai.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Model run directory holding the checkpoints.
    #[arg(short = 'm', long = "model-dir")]
    pub model_dir: Option<PathBuf>,

    /// Checkpoint step to serve, or `latest` (`-1` is accepted too).
    #[arg(short = 's', long = "step", allow_negative_numbers = true)]
    pub step: Option<CheckpointSelector>,

    /// Number of trailing turns shown to the model.
    #[arg(short = 'w', long = "context-window")]
    pub context_window: Option<usize>,

    /// Transcript file template (`{run}`, `{step}`, `{timestamp}`, `{hostname}`).
    #[arg(short = 'o', long = "output-file")]
    pub output_file: Option<String>,

    /// Do not write a transcript or config snapshot.
    #[arg(long = "no-save")]
    pub no_save: bool,

    /// Log filter used when RUST_LOG is unset (e.g. `debug`, `convai=trace`).
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.model_dir {
            config.model.model_dir = Some(dir.clone());
        }
        if let Some(step) = self.step {
            config.model.step = step;
        }
        if let Some(window) = self.context_window {
            config.chat.context_window = window;
        }
        if let Some(output_file) = &self.output_file {
            config.transcript.output_file = output_file.clone();
        }
        if self.no_save {
            config.transcript.enabled = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.no_color {
            config.display.color = false;
        }
    }
}
