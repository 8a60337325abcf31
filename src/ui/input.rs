//! Line-oriented user input.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Result of one read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A full line, without its line terminator.
    Line(String),
    /// End of input (Ctrl-D or a closed pipe).
    Eof,
}

/// Source of user utterances for the session loop.
#[async_trait]
pub trait InputSource: Send {
    async fn read_line(&mut self) -> io::Result<InputEvent>;
}

/// Reads lines from the process's standard input.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn read_line(&mut self) -> io::Result<InputEvent> {
        Ok(match self.lines.next_line().await? {
            Some(line) => InputEvent::Line(line.trim_end_matches('\r').to_string()),
            None => InputEvent::Eof,
        })
    }
}
