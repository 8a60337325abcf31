//! convai: an interactive chat harness for research conversational models.
//!
//! A [`session::Session`] reads user turns, formats a windowed history into a
//! model prompt, asks a [`gateway::ModelBackend`] for completions, cleans the
//! reply and persists a transcript. The default backend drives an external
//! model process through request/response files.
//!
//! # Quick start
//!
//! ```no_run
//! use convai::config::load_config;
//! use convai::gateway::backend_from_config;
//! use convai::session::Session;
//! use convai::ui::Renderer;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let mut config = load_config(None).unwrap().config;
//! config.resolve_model_dir().unwrap();
//! let backend = backend_from_config(&config.model).unwrap();
//! let mut session = Session::new(config, backend, Arc::new(Renderer::new(true))).unwrap();
//! let reply = session.respond("hi").await.unwrap();
//! println!("{reply:?}");
//! # }
//! ```

pub mod build_info;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod postprocess;
pub mod prompt;
pub mod session;
pub mod textutil;
pub mod transcript;
pub mod ui;
