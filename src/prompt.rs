//! Rendering conversation turns into model-ready text.

use crate::history::Speaker;

/// Static pieces that wrap a window of turns into one model input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TurnFormat<'a> {
    /// Prepended once to the whole prompt (e.g. `"converse: "`).
    pub task_prefix: &'a str,
    /// Per-speaker prefixes: `[human, model]`.
    pub turn_prefixes: [&'a str; 2],
    /// Joined between consecutive prefixed turns.
    pub turn_separator: &'a str,
}

impl TurnFormat<'_> {
    /// Render `turns` (first turn is the human's) into a single string.
    pub fn render(&self, turns: &[String]) -> String {
        format_turns(
            turns,
            self.task_prefix,
            self.turn_prefixes,
            self.turn_separator,
        )
    }

    /// Render a window whose first element sits at `offset` in the full
    /// history, so speaker prefixes follow absolute positions.
    pub fn render_at(&self, turns: &[String], offset: usize) -> String {
        let body = prefix_cycle_from(turns, self.turn_prefixes, offset).join(self.turn_separator);
        format!("{}{body}", self.task_prefix)
    }
}

/// Prefix each turn by position parity, join with `turn_separator`, and
/// prepend `task_prefix`. An empty `turns` yields `task_prefix` alone.
pub fn format_turns(
    turns: &[String],
    task_prefix: &str,
    turn_prefixes: [&str; 2],
    turn_separator: &str,
) -> String {
    let body = prefix_cycle(turns, turn_prefixes).join(turn_separator);
    format!("{task_prefix}{body}")
}

/// Prepend alternating labels to each turn, starting with the human's.
pub fn prefix_cycle(turns: &[String], prefixes: [&str; 2]) -> Vec<String> {
    prefix_cycle_from(turns, prefixes, 0)
}

fn prefix_cycle_from(turns: &[String], prefixes: [&str; 2], offset: usize) -> Vec<String> {
    turns
        .iter()
        .enumerate()
        .map(|(idx, turn)| {
            let speaker = Speaker::for_index(offset + idx);
            format!("{}{turn}", prefixes[speaker.slot()])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const CONVERSE: TurnFormat<'static> = TurnFormat {
        task_prefix: "converse: ",
        turn_prefixes: ["human> ", "model> "],
        turn_separator: "\n",
    };

    #[test]
    fn first_human_turn_renders_with_task_prefix() {
        assert_eq!(CONVERSE.render(&turns(&["hi"])), "converse: human> hi");
    }

    #[test]
    fn turns_alternate_prefixes_and_join_with_separator() {
        let rendered = CONVERSE.render(&turns(&["hi", "hello", "how are you?"]));
        assert_eq!(
            rendered,
            "converse: human> hi\nmodel> hello\nhuman> how are you?"
        );
    }

    #[test]
    fn empty_turns_yield_task_prefix_alone() {
        assert_eq!(CONVERSE.render(&[]), "converse: ");
    }

    #[test]
    fn empty_prefixes_degrade_to_concatenation() {
        let rendered = format_turns(&turns(&["a", "b", "c"]), "", ["", ""], "");
        assert_eq!(rendered, "abc");
    }

    #[test]
    fn render_at_labels_by_absolute_position() {
        let window = turns(&["fine thanks", "and you?"]);
        assert_eq!(
            CONVERSE.render_at(&window, 1),
            "converse: model> fine thanks\nhuman> and you?"
        );
        assert_eq!(CONVERSE.render_at(&window, 0), CONVERSE.render(&window));
    }

    #[cfg(feature = "fuzz-tests")]
    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn formatting_is_deterministic(
                items in proptest::collection::vec("[ -~]{0,12}", 0..10),
                prefix in "[ -~]{0,8}",
                sep in "[ -~\n]{0,3}"
            ) {
                let a = format_turns(&items, &prefix, ["h: ", "m: "], &sep);
                let b = format_turns(&items, &prefix, ["h: ", "m: "], &sep);
                prop_assert_eq!(&a, &b);
                prop_assert!(a.starts_with(&prefix));
            }
        }
    }
}
