//! Output-fragment discovery and line decoding.
//!
//! The model process may split its output across several files sharing the
//! requested output stem (one per evaluated checkpoint, for example
//! `output.txt-12000`). Fragments are concatenated in file-name order and
//! split into non-blank lines. Lines may be printed as Python byte-string
//! literals (`b'caf\xc3\xa9'`) and are decoded back to text.

use crate::error::GatewayError;
use std::fs;
use std::path::{Path, PathBuf};

/// Files in `dir` whose name starts with `stem`, sorted by file name.
pub fn discover_fragments(dir: &Path, stem: &str) -> Result<Vec<PathBuf>, GatewayError> {
    let mut fragments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_some_and(|name| name.starts_with(stem)) {
            fragments.push(entry.path());
        }
    }
    fragments.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(fragments)
}

/// Read, concatenate and decode every fragment for `stem` in `dir`.
pub fn read_completions(dir: &Path, stem: &str) -> Result<Vec<String>, GatewayError> {
    let fragments = discover_fragments(dir, stem)?;
    if fragments.is_empty() {
        return Err(GatewayError::EmptyOutput(format!(
            "no output files matching `{stem}*`"
        )));
    }

    let mut texts = Vec::with_capacity(fragments.len());
    for path in &fragments {
        texts.push(read_fragment(path)?);
    }
    let joined = texts.join("\n");

    let completions = joined
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(decode_line)
        .collect::<Result<Vec<_>, _>>()?;
    if completions.is_empty() {
        return Err(GatewayError::EmptyOutput(format!(
            "{} output file(s) matching `{stem}*` contained only blank lines",
            fragments.len()
        )));
    }
    Ok(completions)
}

/// Undecodable bytes fail the turn, not the session.
fn read_fragment(path: &Path) -> Result<String, GatewayError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData => {
            GatewayError::Decode(format!("{} is not valid UTF-8", path.display()))
        }
        _ => GatewayError::Io(e),
    })
}

/// Decode one output line; plain lines pass through trimmed.
pub fn decode_line(line: &str) -> Result<String, GatewayError> {
    let trimmed = line.trim();
    let Some(body) = byte_literal_body(trimmed) else {
        return Ok(trimmed.to_string());
    };
    let bytes = unescape_bytes(body)
        .map_err(|msg| GatewayError::Decode(format!("{msg} in `{trimmed}`")))?;
    String::from_utf8(bytes)
        .map_err(|e| GatewayError::Decode(format!("invalid UTF-8 in `{trimmed}`: {e}")))
}

/// Inner text of `b'...'` / `b"..."`, if `text` is such a literal.
fn byte_literal_body(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('b')?;
    for quote in ['\'', '"'] {
        if let Some(body) = rest
            .strip_prefix(quote)
            .and_then(|inner| inner.strip_suffix(quote))
        {
            return Some(body);
        }
    }
    None
}

fn unescape_bytes(body: &str) -> Result<Vec<u8>, String> {
    let raw = body.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let byte = raw[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }
        let Some(&escape) = raw.get(i + 1) else {
            return Err("dangling backslash".to_string());
        };
        i += 2;
        match escape {
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'"' => out.push(b'"'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'x' => {
                let hex = raw
                    .get(i..i + 2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| "truncated \\x escape".to_string())?;
                out.push(hex);
                i += 2;
            }
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            // Unknown escapes keep their backslash.
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}
