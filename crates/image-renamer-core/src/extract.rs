//! Recovery of structured analysis records from free-text model output.
//!
//! Responses are expected to contain a single JSON object but arrive
//! wrapped in reasoning blocks, prose, or code fences, and are
//! sometimes truncated mid-object. Everything here is pure so the
//! repair rules can be tested without an endpoint.

use serde_json::Value;

use crate::config::{CaseStyle, Config};
use crate::error::{Error, Result};
use crate::types::VisionAnalysis;

const REASONING_CLOSE: &str = "</think>";

/// Characters that are illegal in filenames on at least one target OS
const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Locate the JSON object inside raw model output, repairing a
/// truncated tail if needed. Returns None when no object can be found.
pub fn extract_json_object(raw: &str) -> Option<String> {
    // Discard any reasoning preamble up to and including its closing marker
    let body = match raw.find(REASONING_CLOSE) {
        Some(idx) => &raw[idx + REASONING_CLOSE.len()..],
        None => raw,
    };

    let body = strip_code_fences(body);

    let start = body.find('{')?;
    let candidate = &body[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    // Open braces/brackets seen so far, for truncation repair
    let mut open_stack: Vec<char> = Vec::new();

    for (idx, ch) in candidate.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => {
                open_stack.push(ch);
                if ch == '{' {
                    depth += 1;
                }
            }
            '}' | ']' => {
                open_stack.pop();
                if ch == '}' {
                    depth -= 1;
                    if depth == 0 {
                        return Some(candidate[..=idx].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    // No matching closer before input end: treat as truncated and
    // append the minimal closing sequence.
    let mut repaired = candidate.to_string();
    if in_string {
        repaired.push('"');
    }
    repaired = repair_tail(repaired, &open_stack);
    for opener in open_stack.iter().rev() {
        repaired.push(match opener {
            '[' => ']',
            _ => '}',
        });
    }

    Some(repaired)
}

/// Strip markdown code-fence markers, keeping the fenced content
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag on the fence line
    let after_tag = match after_open.find('\n') {
        Some(idx) => &after_open[idx + 1..],
        None => after_open,
    };
    after_tag.strip_suffix("```").unwrap_or(after_tag)
}

/// Trim a truncated tail back to something that closers can complete
///
/// Handles a trailing comma, a key with no value, a dangling key
/// string, and a half-written bare literal like `tru`.
fn repair_tail(mut s: String, open_stack: &[char]) -> String {
    loop {
        let trimmed = s.trim_end().len();
        s.truncate(trimmed);

        if s.ends_with(',') {
            s.pop();
            continue;
        }
        if s.ends_with(':') {
            s.push_str(" null");
            break;
        }
        // Half-written bare literal cannot be closed into valid JSON
        if s.chars().last().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
            let start = s
                .rfind(|c: char| !c.is_ascii_alphabetic())
                .map(|i| i + 1)
                .unwrap_or(0);
            if !matches!(&s[start..], "true" | "false" | "null") {
                s.truncate(start);
                continue;
            }
        }
        // A string that closes the input while an object member key is
        // still awaiting its colon must be dropped
        if s.ends_with('"') && matches!(open_stack.last(), Some('{')) {
            if let Some(cut) = dangling_key_start(&s) {
                s.truncate(cut);
                continue;
            }
        }
        break;
    }
    s
}

/// Start of a trailing `"key"` member that never got a colon, if any
fn dangling_key_start(s: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    let mut last_sep = None;
    let mut last_colon = None;
    for (idx, ch) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            ',' | '{' => last_sep = Some(idx),
            ':' => last_colon = Some(idx),
            _ => {}
        }
    }
    match (last_sep, last_colon) {
        (Some(sep), Some(colon)) if colon > sep => None,
        (Some(sep), _) => {
            if s.as_bytes()[sep] == b'{' {
                Some(sep + 1)
            } else {
                Some(sep)
            }
        }
        _ => None,
    }
}

/// Parse repaired JSON into a validated analysis, case-insensitively
///
/// The suggested filename is always sanitized on the way through, so a
/// returned record is directly usable as a filename stem.
pub fn parse_analysis(json_text: &str, config: &Config) -> Result<VisionAnalysis> {
    let value: Value = serde_json::from_str(json_text)
        .map_err(|e| Error::Parse(format!("Model output is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::Parse("Model output is not a JSON object".to_string()))?;

    // Fold keys so e.g. "Suggested_Filename" still matches
    let lookup = |key: &str| -> Option<&Value> {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    };

    let raw_stem = lookup("suggested_filename")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let suggested_filename = sanitize_filename(raw_stem, config);
    if suggested_filename.is_empty() {
        return Err(Error::Parse(
            "Model output contains no usable suggested_filename".to_string(),
        ));
    }

    let text_field = |key: &str| -> Option<String> {
        lookup(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(VisionAnalysis {
        suggested_filename,
        title: text_field("title"),
        subject: text_field("subject"),
        description: text_field("description"),
        tags: coerce_tag_list(lookup("tags"), config.max_tags),
        comments: text_field("comments"),
        authors: text_field("authors"),
        copyright: text_field("copyright"),
        visible_date: text_field("visible_date"),
    })
}

/// Clean a raw tag value into a bounded, deduplicated list
///
/// Accepts either a JSON array of strings or a single comma-separated
/// string, since smaller models produce both.
fn coerce_tag_list(value: Option<&Value>, max_tags: usize) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };

    let mut raw_items: Vec<String> = Vec::new();
    match value {
        Value::Array(rows) => {
            for row in rows {
                if let Some(text) = row.as_str() {
                    raw_items.push(text.to_string());
                }
            }
        }
        Value::String(text) => {
            raw_items.extend(text.split(',').map(str::to_string));
        }
        _ => {}
    }

    let mut cleaned = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for row in raw_items {
        let text = row.split_whitespace().collect::<Vec<&str>>().join(" ");
        if text.is_empty() {
            continue;
        }
        let key = text.to_ascii_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        cleaned.push(text);
        if cleaned.len() >= max_tags {
            break;
        }
    }
    cleaned
}

/// Force a model-suggested name into a legal filename stem
pub fn sanitize_filename(raw: &str, config: &Config) -> String {
    let mut stem = raw.trim().to_string();

    // Strip an echoed image extension
    for ext in crate::discovery::IMAGE_EXTENSIONS {
        let suffix = format!(".{}", ext);
        if stem.to_lowercase().ends_with(&suffix) {
            stem.truncate(stem.len() - suffix.len());
            break;
        }
    }

    let mut out = String::with_capacity(stem.len());
    for ch in stem.chars() {
        if ch.is_whitespace() || ILLEGAL_FILENAME_CHARS.contains(&ch) || ch.is_control() {
            out.push('_');
        } else {
            out.push(ch);
        }
    }

    // Collapse repeated separators
    let mut collapsed = String::with_capacity(out.len());
    let mut prev_sep = false;
    for ch in out.chars() {
        let is_sep = ch == '_';
        if is_sep && prev_sep {
            continue;
        }
        prev_sep = is_sep;
        collapsed.push(ch);
    }
    let mut collapsed = collapsed.trim_matches('_').to_string();

    if collapsed.chars().count() > config.max_filename_len {
        collapsed = collapsed.chars().take(config.max_filename_len).collect();
        collapsed = collapsed.trim_end_matches('_').to_string();
    }

    match config.filename_case {
        CaseStyle::Lower => collapsed.to_lowercase(),
        CaseStyle::Preserve => collapsed,
    }
}

// -- Tests --
