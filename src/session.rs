//! Interactive session controller.
//!
//! One session owns one [`History`] and drives each turn through formatting,
//! inference, postprocessing and persistence. The only suspension points are
//! the input read and the model call; both race against the cancellation
//! signal, and cancellation ends the session without an error.

use crate::config::{CompletionPolicy, Config, FailurePolicy};
use crate::error::{ConfigError, GatewayError, SessionError};
use crate::gateway::{ModelBackend, ModelParams};
use crate::history::{History, Speaker};
use crate::postprocess::postprocess;
use crate::transcript::{persist, PathVars, SessionPaths};
use crate::ui::{InputEvent, InputSource, RenderSink};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const RETRY_HINT: &str = "press Enter to retry the last message";

/// Where the controller is in the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Formatting,
    Inferring,
    Postprocessing,
    Persisting,
    Ended,
}

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered; the reply is now the last history entry.
    Replied(String),
    /// Inference failed; the input stays in the history awaiting a reply.
    Unanswered,
    /// Cancellation arrived while the model was running.
    Cancelled,
}

/// One interactive conversation against a model backend.
pub struct Session {
    /// Effective configuration, validated at construction.
    config: Config,
    backend: Arc<dyn ModelBackend>,
    sink: Arc<dyn RenderSink>,
    history: History,
    params: ModelParams,
    stop_markers: [String; 2],
    /// Transcript and snapshot targets, fixed for the whole session.
    paths: Option<SessionPaths>,
    state: SessionState,
    /// Optional cancellation signal (Ctrl-C).
    cancellation_rx: Option<watch::Receiver<bool>>,
}

impl Session {
    /// Validate `config` and capture the session's transcript paths.
    pub fn new(
        config: Config,
        backend: Arc<dyn ModelBackend>,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let vars = PathVars::capture(
            &config.model,
            config.transcript.utc_offset_hours,
            Utc::now(),
        );
        let paths = SessionPaths::resolve(&config.transcript, &vars);
        let params = ModelParams::from_config(&config.model);
        let stop_markers = config.chat.effective_stop_markers();
        Ok(Self {
            config,
            backend,
            sink,
            history: History::new(),
            params,
            stop_markers,
            paths,
            state: SessionState::AwaitingInput,
            cancellation_rx: None,
        })
    }

    /// Override where this session persists (`None` disables persistence).
    pub fn with_paths(mut self, paths: Option<SessionPaths>) -> Self {
        self.paths = paths;
        self
    }

    pub fn set_cancellation_receiver(&mut self, rx: Option<watch::Receiver<bool>>) {
        self.cancellation_rx = rx;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn into_history(self) -> History {
        self.history
    }

    pub fn paths(&self) -> Option<&SessionPaths> {
        self.paths.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read and answer lines until end of input, cancellation, or a
    /// session-ending error. The configuration snapshot is written on every
    /// exit path once the history reaches the save threshold.
    pub async fn run(&mut self, input: &mut dyn InputSource) -> Result<(), SessionError> {
        let result = self.run_loop(input).await;
        self.transition(SessionState::Ended);
        self.save(true);
        info!(turns = self.history.len(), ok = result.is_ok(), "session ended");
        result
    }

    async fn run_loop(&mut self, input: &mut dyn InputSource) -> Result<(), SessionError> {
        loop {
            self.transition(SessionState::AwaitingInput);
            self.sink.prompt(&self.config.chat.prompt);
            let event = match self.cancellation_rx.clone() {
                Some(mut cancel_rx) => {
                    tokio::select! {
                        _ = wait_for_cancellation(&mut cancel_rx) => return Ok(()),
                        event = input.read_line() => event,
                    }
                }
                None => input.read_line().await,
            };
            let line = match event.map_err(SessionError::Input)? {
                InputEvent::Line(line) => line,
                InputEvent::Eof => return Ok(()),
            };
            match self.respond(&line).await? {
                TurnOutcome::Replied(_) | TurnOutcome::Unanswered => {}
                TurnOutcome::Cancelled => return Ok(()),
            }
        }
    }

    /// Answer one user utterance.
    ///
    /// The utterance is appended before inference. On a turn-level model
    /// failure nothing else is appended. While the last human turn is still
    /// unanswered (after a failure under [`FailurePolicy::Retry`]) the next
    /// call re-submits the current window and `user_input` is not appended,
    /// so speakers keep alternating.
    pub async fn respond(&mut self, user_input: &str) -> Result<TurnOutcome, SessionError> {
        if self.history.next_speaker() == Speaker::Human {
            self.history.push(user_input);
        } else {
            info!(turns = self.history.len(), "re-submitting unanswered turn");
        }

        self.transition(SessionState::Formatting);
        let window = self.history.window(self.config.chat.context_window)?;
        let offset = self.history.len() - window.len();
        let prompt = self.config.chat.turn_format().render_at(window, offset);
        debug!(window_turns = window.len(), prompt_chars = prompt.len(), "formatted prompt");

        self.transition(SessionState::Inferring);
        let prompts = [prompt];
        let result = match self.cancellation_rx.clone() {
            Some(mut cancel_rx) => {
                tokio::select! {
                    // Dropping the predict future kills the model process and
                    // removes its scratch directory.
                    _ = wait_for_cancellation(&mut cancel_rx) => {
                        info!("inference cancelled");
                        return Ok(TurnOutcome::Cancelled);
                    }
                    result = self.backend.predict(&prompts, &self.params) => result,
                }
            }
            None => self.backend.predict(&prompts, &self.params).await,
        };

        let raw = match result.and_then(|completions| self.join_completions(completions)) {
            Ok(raw) => raw,
            Err(err) => return self.handle_inference_failure(err),
        };

        self.transition(SessionState::Postprocessing);
        let reply = postprocess(&raw, &self.stop_markers);
        self.history.push(reply.clone());
        self.sink.reply(&reply);

        self.transition(SessionState::Persisting);
        self.save(false);
        Ok(TurnOutcome::Replied(reply))
    }

    fn join_completions(&self, completions: Vec<String>) -> Result<String, GatewayError> {
        if completions.len() > 1 {
            debug!(count = completions.len(), policy = ?self.config.chat.completions, "multiple completions");
        }
        let mut completions = completions.into_iter();
        let raw = match self.config.chat.completions {
            CompletionPolicy::First => completions.next(),
            CompletionPolicy::JoinAll => {
                let all: Vec<String> = completions.collect();
                (!all.is_empty()).then(|| all.join("\n"))
            }
        };
        raw.ok_or_else(|| GatewayError::EmptyOutput("backend returned no completions".into()))
    }

    fn handle_inference_failure(&mut self, err: GatewayError) -> Result<TurnOutcome, SessionError> {
        if !err.is_turn_fatal() {
            return Err(err.into());
        }
        match self.config.chat.on_inference_failure {
            FailurePolicy::EndSession => Err(err.into()),
            FailurePolicy::Retry => {
                warn!(error = %err, "inference failed; turn left unanswered");
                self.sink.error(&err.to_string());
                self.sink.info(RETRY_HINT);
                Ok(TurnOutcome::Unanswered)
            }
        }
    }

    /// Persist the transcript, plus the config snapshot at session end.
    /// Failures are reported and never end the session.
    fn save(&self, at_exit: bool) {
        let Some(paths) = &self.paths else {
            return;
        };
        if self.history.len() < self.config.transcript.save_threshold {
            return;
        }
        let snapshot = if at_exit && paths.config_log.is_some() {
            match self.config.snapshot() {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(error = %err, "config snapshot not saved");
                    self.sink.warn(&err.to_string());
                    None
                }
            }
        } else {
            None
        };
        let labels = &self.config.transcript.turn_labels;
        if let Err(err) = persist(
            self.history.turns(),
            [&labels[0], &labels[1]],
            paths,
            snapshot.as_deref(),
        ) {
            warn!(error = %err, "session not saved");
            self.sink.warn(&err.to_string());
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, turns = self.history.len(), "session state");
            self.state = next;
        }
    }
}

/// Resolve once the cancellation flag is set. A dropped sender never cancels.
async fn wait_for_cancellation(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
