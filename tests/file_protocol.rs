//! End-to-end checks of the file-based model protocol with `sh` standing in
//! for the model process.

use async_trait::async_trait;
use convai::checkpoint::CheckpointSelector;
use convai::config::{CheckpointResolution, Config};
use convai::error::{GatewayError, SessionError};
use convai::gateway::{
    backend_from_config, CommandProcess, FileProtocolBackend, ModelBackend, ModelParams,
};
use convai::session::Session;
use convai::ui::{InputEvent, InputSource, RenderSink};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Answers the first prompt into `{output}0` and the rest into `{output}1`,
/// tagging each reply with the checkpoint step.
const SPLIT_REPLY_SCRIPT: &str = r#"
sed -n '1p' "$1" | sed "s/^/reply@$3: /" > "${2}0"
sed -n '2,$p' "$1" | sed "s/^/reply@$3: /" > "${2}1"
"#;

fn model_dir(steps: &[u64]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for step in steps {
        fs::write(dir.path().join(format!("model.ckpt-{step}.meta")), "").unwrap();
    }
    dir
}

fn sh_process(script: &str) -> CommandProcess {
    CommandProcess::new(
        "sh",
        vec![
            "-c".into(),
            script.into(),
            "model".into(),
            "{input}".into(),
            "{output}".into(),
            "{step}".into(),
        ],
    )
}

fn prompts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn fragments_from_a_real_process_keep_prompt_order() {
    let dir = model_dir(&[3, 10, 7]);
    let backend = FileProtocolBackend::new(
        sh_process(SPLIT_REPLY_SCRIPT),
        dir.path(),
        CheckpointSelector::Latest,
    );

    let out = backend
        .predict(&prompts(&["first", "second", "third"]), &ModelParams::default())
        .await
        .unwrap();

    assert_eq!(
        out,
        ["reply@10: first", "reply@10: second", "reply@10: third"]
    );
}

#[tokio::test]
async fn explicit_step_skips_directory_scan() {
    let dir = model_dir(&[]);
    let backend = FileProtocolBackend::new(
        sh_process(SPLIT_REPLY_SCRIPT),
        dir.path(),
        CheckpointSelector::Step(42),
    )
    .with_resolution(CheckpointResolution::OncePerSession);

    let out = backend
        .predict(&prompts(&["only"]), &ModelParams::default())
        .await
        .unwrap();

    assert_eq!(out, ["reply@42: only"]);
}

#[tokio::test]
async fn failing_process_surfaces_stderr() {
    let dir = model_dir(&[1]);
    let backend = FileProtocolBackend::new(
        sh_process("echo 'out of memory' >&2; exit 2"),
        dir.path(),
        CheckpointSelector::Latest,
    );

    let err = backend
        .predict(&prompts(&["hi"]), &ModelParams::default())
        .await
        .unwrap_err();

    match err {
        GatewayError::ModelProcessFailed(msg) => {
            assert!(msg.contains("exit code 2"), "got: {msg}");
            assert!(msg.contains("out of memory"), "got: {msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn silent_process_is_empty_output() {
    let dir = model_dir(&[1]);
    let backend = FileProtocolBackend::new(
        sh_process("exit 0"),
        dir.path(),
        CheckpointSelector::Latest,
    );

    let err = backend
        .predict(&prompts(&["hi"]), &ModelParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::EmptyOutput(_)), "got: {err}");
}

struct Lines(VecDeque<String>);

#[async_trait]
impl InputSource for Lines {
    async fn read_line(&mut self) -> io::Result<InputEvent> {
        Ok(match self.0.pop_front() {
            Some(line) => InputEvent::Line(line),
            None => InputEvent::Eof,
        })
    }
}

#[derive(Default)]
struct Replies(Mutex<Vec<String>>);

impl RenderSink for Replies {
    fn prompt(&self, _prompt: &str) {}

    fn reply(&self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }

    fn info(&self, _text: &str) {}

    fn warn(&self, _msg: &str) {}

    fn error(&self, _msg: &str) {}
}

fn session_config(model_dir: &Path, chats_dir: &Path, script: &str) -> Config {
    let mut config = Config::default();
    config.model.model_dir = Some(model_dir.to_path_buf());
    config.model.command = vec!["sh".into(), "-c".into(), script.into(), "model".into()];
    config.model.args = vec!["{input}".into(), "{output}".into(), "{step}".into()];
    config.model.env.clear();
    config.transcript.dir = chats_dir.to_path_buf();
    config.transcript.output_file = "{run}/chat.txt".into();
    config.transcript.config_log_file = "{run}/chat.toml".into();
    config
}

#[tokio::test]
async fn session_runs_against_external_process_and_saves_transcript() {
    let models = TempDir::new().unwrap();
    let run_dir = models.path().join("t5-small");
    fs::create_dir(&run_dir).unwrap();
    fs::write(run_dir.join("model.ckpt-500.index"), "").unwrap();
    let chats = TempDir::new().unwrap();

    // Echo the last prompt line, then hallucinate a human turn.
    let script = r#"printf 'b"ok %s human> more"\n' "$(tail -c 2 "$1")" > "${2}-500""#;
    let config = session_config(&run_dir, chats.path(), script);
    let backend = backend_from_config(&config.model).unwrap();
    let sink = Arc::new(Replies::default());
    let mut session = Session::new(config, backend, sink.clone()).unwrap();
    let mut input = Lines(VecDeque::from(["hi".to_string()]));

    session.run(&mut input).await.unwrap();

    assert_eq!(*sink.0.lock().unwrap(), ["ok hi"]);
    assert_eq!(session.history().turns(), ["hi", "ok hi"]);
    let transcript = fs::read_to_string(chats.path().join("t5-small/chat.txt")).unwrap();
    assert_eq!(transcript, "human: hi\nmodel: ok hi");
    assert!(chats.path().join("t5-small/chat.toml").exists());
}

#[tokio::test]
async fn session_ends_with_error_when_no_checkpoint_exists() {
    let models = TempDir::new().unwrap();
    let chats = TempDir::new().unwrap();
    let config = session_config(models.path(), chats.path(), "exit 0");
    let backend = backend_from_config(&config.model).unwrap();
    let mut session = Session::new(config, backend, Arc::new(Replies::default())).unwrap();
    let mut input = Lines(VecDeque::from(["hi".to_string()]));

    let err = session.run(&mut input).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Gateway(GatewayError::NoCheckpointFound(_))
    ));
    assert_eq!(session.history().turns(), ["hi"]);
}
