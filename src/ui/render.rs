//! Rendering contract and the default terminal renderer.
//!
//! Model replies go to stdout so a transcript can be piped; prompts and
//! status lines go to stderr.

use crossterm::style::{Color, Stylize};
use std::io::{self, Write};

const LABEL_WARNING: &str = "warning:";
const LABEL_ERROR: &str = "error:";
const GLYPH_INFO: &str = "•";

/// Injectable rendering interface used by the session loop.
///
/// `Renderer` is the terminal implementation; tests substitute a recording
/// sink.
pub trait RenderSink: Send + Sync {
    /// Render the input prompt, without a trailing newline.
    fn prompt(&self, prompt: &str);
    /// Render one model reply.
    fn reply(&self, text: &str);
    /// Render startup or lifecycle text.
    fn info(&self, text: &str);
    /// Render a warning line.
    fn warn(&self, msg: &str);
    /// Render an error line.
    fn error(&self, msg: &str);
}

/// Terminal renderer with optional ANSI color.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn status_line(&self, label: &str, color: Color, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", label.with(color).bold());
        } else {
            eprintln!("{label} {msg}");
        }
    }
}

impl RenderSink for Renderer {
    fn prompt(&self, prompt: &str) {
        if self.color {
            eprint!("{}", prompt.with(Color::Cyan).bold());
        } else {
            eprint!("{prompt}");
        }
        let _ = io::stderr().flush();
    }

    fn reply(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn info(&self, text: &str) {
        if self.color {
            eprintln!("{} {}", GLYPH_INFO.with(Color::DarkGrey), text.with(Color::DarkGrey));
        } else {
            eprintln!("{text}");
        }
    }

    fn warn(&self, msg: &str) {
        self.status_line(LABEL_WARNING, Color::Yellow, msg);
    }

    fn error(&self, msg: &str) {
        self.status_line(LABEL_ERROR, Color::Red, msg);
    }
}
