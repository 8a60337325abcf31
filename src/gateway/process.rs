//! External model process invocation.
//!
//! One inference run is one child process. The command line is rendered from
//! templates with these placeholders:
//!
//! | placeholder     | value                                         |
//! |-----------------|-----------------------------------------------|
//! | `{input}`       | request file, one prompt per line             |
//! | `{output}`      | output path stem; fragments share this prefix |
//! | `{model_dir}`   | model/checkpoint directory                    |
//! | `{step}`        | resolved checkpoint step                      |
//! | `{temperature}` | sampling temperature                          |
//! | `{max_length}`  | decode length limit (empty when unset)        |
//! | `{num_samples}` | samples per prompt                            |

use crate::config::ModelConfig;
use crate::error::{ConfigError, GatewayError};
use crate::textutil::{safe_suffix_by_bytes, tail_lines};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::ModelParams;

/// Lines of child stderr kept in failure messages.
const STDERR_TAIL_LINES: usize = 12;
const STDERR_TAIL_BYTES: usize = 4096;

/// Everything one model run needs to know.
#[derive(Debug, Clone, Copy)]
pub struct InferenceJob<'a> {
    pub input_path: &'a Path,
    pub output_path: &'a Path,
    pub model_dir: &'a Path,
    pub step: u64,
    pub params: &'a ModelParams,
}

/// The external model capability: read prompts from `input_path`, write
/// completions to files prefixed by `output_path`.
///
/// Blocks (asynchronously) until the run finishes, which can take hours.
#[async_trait]
pub trait ModelProcess: Send + Sync {
    async fn run(&self, job: &InferenceJob<'_>) -> Result<(), GatewayError>;
}

/// Runs a configured program as the model process.
#[derive(Debug, Clone)]
pub struct CommandProcess {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Build from `[model]`: `command[0]` is the program, the rest of
    /// `command` and then `args` are argument templates.
    pub fn from_config(model: &ModelConfig) -> Result<Self, ConfigError> {
        let (program, leading) = model
            .command
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("model.command must name a program".into()))?;
        let args = leading.iter().chain(model.args.iter()).cloned().collect();
        Ok(Self::new(program.clone(), args).with_env(model.env.clone()))
    }

    /// Command-line arguments for one job.
    pub fn render_args(&self, job: &InferenceJob<'_>) -> Vec<String> {
        let vars = job_vars(job);
        self.args
            .iter()
            .map(|template| render_template(template, &vars))
            .collect()
    }
}

#[async_trait]
impl ModelProcess for CommandProcess {
    async fn run(&self, job: &InferenceJob<'_>) -> Result<(), GatewayError> {
        let args = self.render_args(job);
        debug!(program = %self.program, ?args, step = job.step, "spawning model process");

        let mut cmd = Command::new(&self.program);
        // Cancelling a turn drops this future; the child must not outlive it.
        cmd.kill_on_drop(true);
        cmd.args(&args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .spawn()
            .map_err(|e| GatewayError::ModelProcessFailed(format!("{}: {e}", self.program)))?
            .wait_with_output()
            .await
            .map_err(|e| GatewayError::ModelProcessFailed(format!("{}: {e}", self.program)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            debug!(stderr_bytes = output.stderr.len(), "model process finished");
            return Ok(());
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let details = tail_lines(
            safe_suffix_by_bytes(&stderr, STDERR_TAIL_BYTES),
            STDERR_TAIL_LINES,
        );
        let message = if details.is_empty() {
            format!("{} ended with {status}", self.program)
        } else {
            format!("{} ended with {status}: {details}", self.program)
        };
        Err(GatewayError::ModelProcessFailed(message))
    }
}

fn job_vars(job: &InferenceJob<'_>) -> BTreeMap<&'static str, String> {
    let mut vars = BTreeMap::new();
    vars.insert("input", job.input_path.display().to_string());
    vars.insert("output", job.output_path.display().to_string());
    vars.insert("model_dir", job.model_dir.display().to_string());
    vars.insert("step", job.step.to_string());
    vars.insert("temperature", job.params.temperature.to_string());
    vars.insert(
        "max_length",
        job.params
            .max_length
            .map(|n| n.to_string())
            .unwrap_or_default(),
    );
    vars.insert("num_samples", job.params.num_samples.to_string());
    vars
}

fn render_template(template: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params() -> ModelParams {
        ModelParams {
            temperature: 0.5,
            max_length: None,
            num_samples: 2,
        }
    }

    #[test]
    fn renders_every_placeholder() {
        let process = CommandProcess::new(
            "infer",
            vec![
                "--in={input}".into(),
                "--out={output}".into(),
                "--dir={model_dir}".into(),
                "--step={step}".into(),
                "--t={temperature}".into(),
                "--len={max_length}".into(),
                "--n={num_samples}".into(),
            ],
        );
        let params = params();
        let job = InferenceJob {
            input_path: Path::new("/tmp/x/input.txt"),
            output_path: Path::new("/tmp/x/output.txt"),
            model_dir: Path::new("/runs/a"),
            step: 1200,
            params: &params,
        };
        assert_eq!(
            process.render_args(&job),
            [
                "--in=/tmp/x/input.txt",
                "--out=/tmp/x/output.txt",
                "--dir=/runs/a",
                "--step=1200",
                "--t=0.5",
                "--len=",
                "--n=2",
            ]
        );
    }

    #[test]
    fn from_config_splits_program_and_templates() {
        let mut model = ModelConfig::default();
        model.command = vec!["python3".into(), "-m".into(), "infer".into()];
        model.args = vec!["{step}".into()];
        let process = CommandProcess::from_config(&model).unwrap();
        assert_eq!(process.program, "python3");
        assert_eq!(process.args, ["-m", "infer", "{step}"]);
        assert_eq!(
            process.env.get("TF_CPP_MIN_LOG_LEVEL").map(String::as_str),
            Some("3")
        );
    }

    #[test]
    fn from_config_requires_a_program() {
        let mut model = ModelConfig::default();
        model.command.clear();
        let err = CommandProcess::from_config(&model).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
        model.command = vec![String::new(), "-m".into()];
        assert!(CommandProcess::from_config(&model).is_err());
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr_tail() {
        let process = CommandProcess::new(
            "sh",
            vec![
                "-c".into(),
                "echo loading >&2; echo 'checkpoint corrupt' >&2; exit 3".into(),
            ],
        );
        let params = params();
        let dir = PathBuf::from(".");
        let job = InferenceJob {
            input_path: &dir,
            output_path: &dir,
            model_dir: &dir,
            step: 0,
            params: &params,
        };
        let err = process.run(&job).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, GatewayError::ModelProcessFailed(_)));
        assert!(msg.contains("exit code 3"), "got: {msg}");
        assert!(msg.contains("checkpoint corrupt"), "got: {msg}");
    }

    #[tokio::test]
    async fn missing_program_is_model_process_failure() {
        let process = CommandProcess::new("convai-definitely-not-installed", Vec::new());
        let params = params();
        let dir = PathBuf::from(".");
        let job = InferenceJob {
            input_path: &dir,
            output_path: &dir,
            model_dir: &dir,
            step: 0,
            params: &params,
        };
        let err = process.run(&job).await.unwrap_err();
        assert!(matches!(err, GatewayError::ModelProcessFailed(_)), "got: {err}");
    }
}
