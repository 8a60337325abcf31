//! Terminal-facing UI: output rendering and line input.

pub mod input;
pub mod render;

pub use input::{InputEvent, InputSource, StdinInput};
pub use render::{RenderSink, Renderer};
