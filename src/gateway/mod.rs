//! Inference gateway: the only path from the chat loop to the model.
//!
//! The public contract is [`ModelBackend::predict`]: prompts in, completions
//! out, blocking until the model is done. The file-based request/response
//! protocol used by the external process lives in [`file_protocol`] and is one
//! backend among possible others.
//!
//! Each call uses its own scratch directory, so sessions may share one
//! backend concurrently. A model that can only serve one request at a time is
//! wrapped in [`ExclusiveBackend`], a single global critical section.

use crate::config::ModelConfig;
use crate::error::{ConfigError, GatewayError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod file_protocol;
pub mod fragments;
pub mod process;

pub use file_protocol::FileProtocolBackend;
pub use process::{CommandProcess, InferenceJob, ModelProcess};

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub temperature: f64,
    pub max_length: Option<u32>,
    pub num_samples: u32,
}

impl ModelParams {
    pub fn from_config(model: &ModelConfig) -> Self {
        Self {
            temperature: model.temperature,
            max_length: model.max_length,
            num_samples: model.num_samples,
        }
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_length: None,
            num_samples: 1,
        }
    }
}

/// Minimal model interface used by the session loop.
///
/// Completions come back in prompt order. Tests provide deterministic
/// implementations; production uses [`FileProtocolBackend`].
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn predict(
        &self,
        prompts: &[String],
        params: &ModelParams,
    ) -> Result<Vec<String>, GatewayError>;
}

#[async_trait]
impl<B: ModelBackend + ?Sized> ModelBackend for Arc<B> {
    async fn predict(
        &self,
        prompts: &[String],
        params: &ModelParams,
    ) -> Result<Vec<String>, GatewayError> {
        (**self).predict(prompts, params).await
    }
}

/// Admits one request at a time into the wrapped backend.
pub struct ExclusiveBackend<B> {
    inner: B,
    admission: Mutex<()>,
}

impl<B: ModelBackend> ExclusiveBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            admission: Mutex::new(()),
        }
    }
}

#[async_trait]
impl<B: ModelBackend> ModelBackend for ExclusiveBackend<B> {
    async fn predict(
        &self,
        prompts: &[String],
        params: &ModelParams,
    ) -> Result<Vec<String>, GatewayError> {
        // tokio's mutex queues waiters in FIFO order.
        let _admitted = self.admission.lock().await;
        self.inner.predict(prompts, params).await
    }
}

/// Build the configured backend for a resolved model directory.
pub fn backend_from_config(model: &ModelConfig) -> Result<Arc<dyn ModelBackend>, ConfigError> {
    let model_dir = model
        .model_dir
        .clone()
        .ok_or_else(|| ConfigError::Invalid("model.model_dir has not been resolved".into()))?;
    let process = CommandProcess::from_config(model)?;
    let backend = FileProtocolBackend::new(process, model_dir, model.step)
        .with_resolution(model.checkpoint_resolution);
    if model.exclusive {
        Ok(Arc::new(ExclusiveBackend::new(backend)))
    } else {
        Ok(Arc::new(backend))
    }
}
