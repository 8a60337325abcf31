//! Turn-boundary cleanup of raw model completions.
//!
//! The model is prompted with the whole conversation, so a completion often
//! runs past the reply into an invented next human turn. Cleanup is a linear
//! pass: cut at the first "human speaks next" marker, drop every echoed
//! "model speaks" marker, trim. If nothing is left the trimmed raw text is
//! returned instead of an empty reply.

/// Clean a raw completion using `stop_markers` (`[human, model]`).
///
/// Extra markers past the first two are ignored; empty markers are treated
/// as absent.
pub fn postprocess<S: AsRef<str>>(raw: &str, stop_markers: &[S]) -> String {
    let human = stop_markers
        .first()
        .map(AsRef::as_ref)
        .filter(|m| !m.is_empty());
    let model = stop_markers
        .get(1)
        .map(AsRef::as_ref)
        .filter(|m| !m.is_empty());

    // Stripping a model marker can splice a new human marker together, so
    // repeat until a pass changes nothing; each pass only shrinks the text.
    let mut current = raw.to_string();
    loop {
        let next = clean_once(&current, human, model);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        raw.trim().to_string()
    } else {
        current
    }
}

fn clean_once(text: &str, human: Option<&str>, model: Option<&str>) -> String {
    let truncated = match human.and_then(|marker| text.find(marker)) {
        Some(cut) => &text[..cut],
        None => text,
    };
    let stripped = match model {
        Some(marker) => truncated.replace(marker, ""),
        None => truncated.to_string(),
    };
    stripped.trim().to_string()
}
