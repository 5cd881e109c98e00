//! Parse-or-fail steps for capability output.
//!
//! The decision capability answers with free-form text. Anything the
//! pipelines rely on (a postable text, a poll) is pulled out here against a
//! declared shape; output that does not fit is `MalformedCapabilityOutput`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::capabilities::Poll;
use crate::error::JobError;

/// Platform limit for one post.
pub const MAX_POST_CHARS: usize = 280;
/// Platform limit for one poll option.
pub const MAX_POLL_OPTION_CHARS: usize = 25;
pub const POLL_OPTION_COUNT: usize = 4;

const MAX_HEADLINE_CHARS: usize = 500;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex"));

/// Scraped headline text: entity decode, tag strip, quote folding, whitespace collapse.
pub fn normalize_headline(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let quoted = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let collapsed = RE_WS.replace_all(&quoted, " ");
    let out = collapsed.trim();
    if out.chars().count() > MAX_HEADLINE_CHARS {
        out.chars().take(MAX_HEADLINE_CHARS).collect()
    } else {
        out.to_string()
    }
}

/// Generated text ready to post: trimmed, wrapping quotes removed, capped at
/// [`MAX_POST_CHARS`]. Empty output is malformed.
pub fn parse_post_text(call: &str, raw: &str) -> Result<String, JobError> {
    let mut text = raw.trim();
    for (open, close) in [('"', '"'), ('\u{201C}', '\u{201D}'), ('\'', '\'')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }
    if text.is_empty() {
        return Err(JobError::malformed(call, "empty text"));
    }
    Ok(if text.chars().count() > MAX_POST_CHARS {
        text.chars().take(MAX_POST_CHARS).collect()
    } else {
        text.to_string()
    })
}

#[derive(Deserialize)]
struct PollShape {
    question: String,
    options: Vec<String>,
}

/// Poll JSON `{ "question": .., "options": [..] }`, bare or in a fenced block.
/// Exactly [`POLL_OPTION_COUNT`] non-blank options of at most
/// [`MAX_POLL_OPTION_CHARS`] characters.
pub fn parse_poll(call: &str, raw: &str, duration_minutes: u32) -> Result<Poll, JobError> {
    let body = RE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    let shape: PollShape = serde_json::from_str(body)
        .map_err(|e| JobError::malformed(call, format!("poll is not the expected JSON: {e}")))?;

    let question = shape.question.trim().to_string();
    if question.is_empty() {
        return Err(JobError::malformed(call, "poll question is empty"));
    }
    if shape.options.len() != POLL_OPTION_COUNT {
        return Err(JobError::malformed(
            call,
            format!(
                "poll needs exactly {POLL_OPTION_COUNT} options, got {}",
                shape.options.len()
            ),
        ));
    }
    let mut options = Vec::with_capacity(POLL_OPTION_COUNT);
    for opt in shape.options {
        let opt = opt.trim();
        if opt.is_empty() || opt.chars().count() > MAX_POLL_OPTION_CHARS {
            return Err(JobError::malformed(
                call,
                format!("poll option {opt:?} is blank or longer than {MAX_POLL_OPTION_CHARS} chars"),
            ));
        }
        options.push(opt.to_string());
    }

    Ok(Poll {
        question: parse_post_text(call, &question)?,
        options,
        duration_minutes,
    })
}
