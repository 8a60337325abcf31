//! Conversation history and the trailing window passed to the model.
//!
//! Turns alternate by position: even indices are the human, odd indices the
//! model. The history itself is never truncated; only the view handed to the
//! prompt formatter is windowed.

use crate::error::ConfigError;

/// Who produced a turn, derived from its position in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Human,
    Model,
}

impl Speaker {
    /// Speaker of the turn at `index` (human speaks first).
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Human
        } else {
            Self::Model
        }
    }

    /// Position of this speaker inside a two-entry prefix/label pair.
    pub fn slot(self) -> usize {
        match self {
            Self::Human => 0,
            Self::Model => 1,
        }
    }
}

/// Ordered, append-only record of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    turns: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one turn.
    pub fn push(&mut self, turn: impl Into<String>) {
        self.turns.push(turn.into());
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[String] {
        &self.turns
    }

    /// Speaker expected to produce the next appended turn.
    pub fn next_speaker(&self) -> Speaker {
        Speaker::for_index(self.turns.len())
    }

    /// Trailing `max_turns` turns, see [`window`].
    pub fn window(&self, max_turns: usize) -> Result<&[String], ConfigError> {
        window(&self.turns, max_turns)
    }

    pub fn into_turns(self) -> Vec<String> {
        self.turns
    }
}

impl From<Vec<String>> for History {
    fn from(turns: Vec<String>) -> Self {
        Self { turns }
    }
}

/// Return the trailing `max_turns` elements of `history`, preserving order.
///
/// A zero window is a configuration error rather than an empty prompt.
pub fn window(history: &[String], max_turns: usize) -> Result<&[String], ConfigError> {
    if max_turns == 0 {
        return Err(ConfigError::Invalid(
            "context window must be a positive number of turns".to_string(),
        ));
    }
    let start = history.len().saturating_sub(max_turns);
    Ok(&history[start..])
}
