//! File-based request/response backend.
//!
//! Per request: resolve the checkpoint, write the prompts one per line into a
//! fresh scratch directory, run the model process once, then collect every
//! output fragment. The scratch directory is a [`tempfile::TempDir`] guard and
//! is removed on every exit path, including a dropped (cancelled) future.

use crate::checkpoint::CheckpointSelector;
use crate::config::CheckpointResolution;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, trace};

use super::fragments::read_completions;
use super::process::{InferenceJob, ModelProcess};
use super::{ModelBackend, ModelParams};

/// Request file name inside the scratch directory.
pub const INPUT_FILE_NAME: &str = "input.txt";
/// Output stem handed to the model process; fragments extend this name.
pub const OUTPUT_FILE_STEM: &str = "output.txt";
const SCRATCH_PREFIX: &str = "convai-infer-";

/// Backend that drives a [`ModelProcess`] through request/response files.
pub struct FileProtocolBackend<P> {
    process: P,
    model_dir: PathBuf,
    selector: CheckpointSelector,
    resolution: CheckpointResolution,
    /// Step memoized under [`CheckpointResolution::OncePerSession`].
    resolved_step: Mutex<Option<u64>>,
}

impl<P: ModelProcess> FileProtocolBackend<P> {
    pub fn new(process: P, model_dir: impl Into<PathBuf>, selector: CheckpointSelector) -> Self {
        Self {
            process,
            model_dir: model_dir.into(),
            selector,
            resolution: CheckpointResolution::EveryRequest,
            resolved_step: Mutex::new(None),
        }
    }

    pub fn with_resolution(mut self, resolution: CheckpointResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Resolve the selector according to the configured memoization policy.
    pub fn resolve_step(&self) -> Result<u64, GatewayError> {
        if self.resolution == CheckpointResolution::EveryRequest {
            return self.selector.resolve(&self.model_dir);
        }
        let mut memo = self
            .resolved_step
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(step) = *memo {
            return Ok(step);
        }
        let step = self.selector.resolve(&self.model_dir)?;
        *memo = Some(step);
        Ok(step)
    }
}

#[async_trait]
impl<P: ModelProcess> ModelBackend for FileProtocolBackend<P> {
    async fn predict(
        &self,
        prompts: &[String],
        params: &ModelParams,
    ) -> Result<Vec<String>, GatewayError> {
        let step = self.resolve_step()?;
        predict(&self.process, prompts, &self.model_dir, step, params).await
    }
}

/// Run one request through `process` against an already-resolved `step`.
pub async fn predict<P: ModelProcess + ?Sized>(
    process: &P,
    prompts: &[String],
    model_dir: &Path,
    step: u64,
    params: &ModelParams,
) -> Result<Vec<String>, GatewayError> {
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()?;
    let input_path = scratch.path().join(INPUT_FILE_NAME);
    let output_path = scratch.path().join(OUTPUT_FILE_STEM);

    let request = prompts
        .iter()
        .map(|prompt| request_line(prompt))
        .collect::<Vec<_>>()
        .join("\n");
    tokio::fs::write(&input_path, request).await?;
    debug!(
        prompts = prompts.len(),
        step,
        scratch = %scratch.path().display(),
        "submitting inference request"
    );

    let job = InferenceJob {
        input_path: &input_path,
        output_path: &output_path,
        model_dir,
        step,
        params,
    };
    process.run(&job).await?;

    let completions = read_completions(scratch.path(), OUTPUT_FILE_STEM)?;
    if completions.len() != prompts.len() {
        debug!(
            prompts = prompts.len(),
            completions = completions.len(),
            "completion count differs from prompt count"
        );
    }
    Ok(completions)
}

/// Flatten a prompt onto one request line.
///
/// The prompt format itself is line-free (checked at startup), so breaks can
/// only come from multi-line model replies; they become single spaces.
fn request_line(prompt: &str) -> String {
    if !prompt.contains(['\n', '\r']) {
        return prompt.to_string();
    }
    trace!("joining multi-line prompt onto one request line");
    prompt
        .split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Answers each prompt line with `reply to <line>`, optionally spread
    /// over several fragments, and records what it saw.
    #[derive(Default)]
    struct EchoProcess {
        fragments: usize,
        seen_steps: StdMutex<Vec<u64>>,
        seen_scratch: StdMutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ModelProcess for EchoProcess {
        async fn run(&self, job: &InferenceJob<'_>) -> Result<(), GatewayError> {
            self.seen_steps.lock().unwrap().push(job.step);
            self.seen_scratch
                .lock()
                .unwrap()
                .push(job.input_path.parent().unwrap().to_path_buf());
            let input = fs::read_to_string(job.input_path)?;
            let replies: Vec<String> = input
                .lines()
                .map(|line| format!("b'reply to {line}'"))
                .collect();
            let per_fragment = replies.len().div_ceil(self.fragments.max(1)).max(1);
            for (idx, chunk) in replies.chunks(per_fragment).enumerate() {
                let path = format!("{}{idx}", job.output_path.display());
                fs::write(path, chunk.join("\n"))?;
            }
            Ok(())
        }
    }

    struct FailingProcess;

    #[async_trait]
    impl ModelProcess for FailingProcess {
        async fn run(&self, _job: &InferenceJob<'_>) -> Result<(), GatewayError> {
            Err(GatewayError::ModelProcessFailed("exit code 1".into()))
        }
    }

    /// Succeeds without writing anything.
    struct SilentProcess(AtomicUsize);

    #[async_trait]
    impl ModelProcess for SilentProcess {
        async fn run(&self, _job: &InferenceJob<'_>) -> Result<(), GatewayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn model_dir(steps: &[u64]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for step in steps {
            fs::write(dir.path().join(format!("model.ckpt-{step}.index")), "").unwrap();
        }
        dir
    }

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn completions_preserve_prompt_order() {
        let dir = model_dir(&[100]);
        let backend = FileProtocolBackend::new(
            EchoProcess {
                fragments: 3,
                ..Default::default()
            },
            dir.path(),
            CheckpointSelector::Latest,
        );
        let batch = prompts(&["p0", "p1", "p2", "p3", "p4"]);
        let out = backend
            .predict(&batch, &ModelParams::default())
            .await
            .unwrap();
        assert_eq!(out.len(), batch.len());
        for (i, completion) in out.iter().enumerate() {
            assert_eq!(completion, &format!("reply to p{i}"));
        }
    }

    #[tokio::test]
    async fn latest_is_resolved_for_every_request_by_default() {
        let dir = model_dir(&[3, 10, 7]);
        let backend = FileProtocolBackend::new(
            EchoProcess::default(),
            dir.path(),
            CheckpointSelector::Latest,
        );
        let params = ModelParams::default();
        backend.predict(&prompts(&["a"]), &params).await.unwrap();
        fs::write(dir.path().join("model.ckpt-20.index"), "").unwrap();
        backend.predict(&prompts(&["b"]), &params).await.unwrap();
        assert_eq!(*backend.process.seen_steps.lock().unwrap(), [10, 20]);
    }

    #[tokio::test]
    async fn once_per_session_memoizes_the_step() {
        let dir = model_dir(&[10]);
        let backend = FileProtocolBackend::new(
            EchoProcess::default(),
            dir.path(),
            CheckpointSelector::Latest,
        )
        .with_resolution(CheckpointResolution::OncePerSession);
        let params = ModelParams::default();
        backend.predict(&prompts(&["a"]), &params).await.unwrap();
        fs::write(dir.path().join("model.ckpt-20.index"), "").unwrap();
        backend.predict(&prompts(&["b"]), &params).await.unwrap();
        assert_eq!(*backend.process.seen_steps.lock().unwrap(), [10, 10]);
    }

    #[tokio::test]
    async fn explicit_step_is_passed_through() {
        let dir = model_dir(&[]);
        let backend = FileProtocolBackend::new(
            EchoProcess::default(),
            dir.path(),
            CheckpointSelector::Step(4000),
        );
        backend
            .predict(&prompts(&["a"]), &ModelParams::default())
            .await
            .unwrap();
        assert_eq!(*backend.process.seen_steps.lock().unwrap(), [4000]);
    }

    #[tokio::test]
    async fn missing_checkpoint_fails_before_running_model() {
        let dir = model_dir(&[]);
        let silent = SilentProcess(AtomicUsize::new(0));
        let backend = FileProtocolBackend::new(silent, dir.path(), CheckpointSelector::Latest);
        let err = backend
            .predict(&prompts(&["a"]), &ModelParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoCheckpointFound(_)), "got: {err}");
        assert_eq!(backend.process.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn process_failure_is_surfaced() {
        let dir = model_dir(&[1]);
        let backend = FileProtocolBackend::new(FailingProcess, dir.path(), CheckpointSelector::Latest);
        let err = backend
            .predict(&prompts(&["a"]), &ModelParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ModelProcessFailed(_)), "got: {err}");
    }

    #[tokio::test]
    async fn no_fragments_is_empty_output() {
        let dir = model_dir(&[1]);
        let backend = FileProtocolBackend::new(
            SilentProcess(AtomicUsize::new(0)),
            dir.path(),
            CheckpointSelector::Latest,
        );
        let err = backend
            .predict(&prompts(&["a"]), &ModelParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyOutput(_)), "got: {err}");
    }

    #[tokio::test]
    async fn scratch_directories_are_unique_and_removed() {
        let dir = model_dir(&[1]);
        let backend = FileProtocolBackend::new(
            EchoProcess::default(),
            dir.path(),
            CheckpointSelector::Latest,
        );
        let params = ModelParams::default();
        backend.predict(&prompts(&["a"]), &params).await.unwrap();
        let _ = backend.predict(&prompts(&["b"]), &params).await;

        let seen = backend.process.seen_scratch.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
        assert!(seen.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn scratch_is_removed_after_failure() {
        struct RecordingFailure(StdMutex<Option<PathBuf>>);

        #[async_trait]
        impl ModelProcess for RecordingFailure {
            async fn run(&self, job: &InferenceJob<'_>) -> Result<(), GatewayError> {
                *self.0.lock().unwrap() = job.input_path.parent().map(Path::to_path_buf);
                Err(GatewayError::ModelProcessFailed("boom".into()))
            }
        }

        let process = RecordingFailure(StdMutex::new(None));
        let _ = predict(&process, &prompts(&["a"]), Path::new("."), 1, &ModelParams::default()).await;
        let scratch = process.0.lock().unwrap().clone().unwrap();
        assert!(!scratch.exists());
    }

    #[test]
    fn multi_line_prompts_are_flattened() {
        assert_eq!(request_line("converse: human> hi"), "converse: human> hi");
        assert_eq!(
            request_line("converse: human> hi\nmodel> hello\r\nhuman> bye"),
            "converse: human> hi model> hello human> bye"
        );
    }
}
