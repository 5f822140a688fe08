//! Turns whatever the upstream sent back into text (or a trusted upstream envelope).
//!
//! Shapes are tried in a fixed order of decreasing confidence; the first one that yields
//! non-blank text wins, and the raw body is always the last resort.

use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::{Map, Value};

/// Outcome of normalizing one upstream body.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Upstream already answered with a `choices` envelope; forwarded with its own status.
    Passthrough { status: StatusCode, body: Value },
    /// Text for a freshly built envelope.
    Content(String),
}

type Recognizer = fn(&Map<String, Value>) -> Option<String>;

/// Recognizers consulted after the `choices` check. Order is significant.
const RECOGNIZERS: &[(&str, Recognizer)] = &[
    ("output_text", output_text),
    ("candidates", candidate_parts),
    ("field_probe", field_probe),
];

const PROBE_KEYS: [&str; 3] = ["text", "message", "content"];

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn non_blank_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(Value::as_str).filter(|s| !is_blank(s))
}

pub fn empty_body_message(status: StatusCode) -> String {
    format!("Upstream returned empty response (status {})", status)
}

pub fn normalize(status: StatusCode, raw: &Bytes) -> Normalized {
    if raw.is_empty() {
        return Normalized::Content(empty_body_message(status));
    }

    let raw_text = String::from_utf8_lossy(raw).into_owned();
    let mut doc = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => return Normalized::Content(raw_text),
    };

    if has_choices(&doc) {
        patch_blank_choice_content(&mut doc, &raw_text);
        return Normalized::Passthrough {
            status,
            body: Value::Object(doc),
        };
    }

    for (name, recognize) in RECOGNIZERS {
        if let Some(text) = recognize(&doc).filter(|t| !is_blank(t)) {
            tracing::debug!(shape = *name, "extracted upstream content");
            return Normalized::Content(text);
        }
    }

    tracing::debug!("no known response shape matched; returning raw body");
    Normalized::Content(raw_text)
}

fn has_choices(doc: &Map<String, Value>) -> bool {
    doc.get("choices")
        .and_then(Value::as_array)
        .is_some_and(|c| !c.is_empty())
}

/// Fills `choices[0].message.content` with the raw body when it is a blank string.
fn patch_blank_choice_content(doc: &mut Map<String, Value>, raw_text: &str) {
    let Some(message) = doc
        .get_mut("choices")
        .and_then(|c| c.get_mut(0))
        .and_then(|first| first.get_mut("message"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let blank = message
        .get("content")
        .and_then(Value::as_str)
        .is_some_and(is_blank);
    if blank {
        message.insert("content".to_string(), Value::String(raw_text.to_string()));
    }
}

fn output_text(doc: &Map<String, Value>) -> Option<String> {
    non_blank_str(doc.get("output_text")).map(str::to_string)
}

/// `candidates[*].content.parts[*].text`, falling back to `candidates[*].parts[*].text`.
fn candidate_parts(doc: &Map<String, Value>) -> Option<String> {
    let candidates = doc.get("candidates")?.as_array()?;
    let mut out = String::new();
    for candidate in candidates {
        let nested = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .filter(|p| !p.is_empty());
        let parts = nested.or_else(|| candidate.get("parts").and_then(Value::as_array));
        for part in parts.into_iter().flatten() {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
    }
    Some(out)
}

fn field_probe(doc: &Map<String, Value>) -> Option<String> {
    PROBE_KEYS.iter().find_map(|key| {
        let value = doc.get(*key)?;
        non_blank_str(Some(value))
            .or_else(|| non_blank_str(value.as_object().and_then(|m| m.get("content"))))
            .map(str::to_string)
    })
}
