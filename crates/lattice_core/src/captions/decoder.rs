//! Converts caption payloads into plain text.
//!
//! Each decoder drops timing lines and inline markup tags; `clean` then
//! normalizes whitespace and removes known noise annotations.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum CaptionDecodeError {
    #[error("malformed segment-json caption document: {0}")]
    MalformedSegments(#[from] serde_json::Error),
}

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(music|applause|laughter)\]").unwrap());

// WebVTT structure
static VTT_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^NOTE.*$").unwrap());
static VTT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^STYLE[ \t]*\n.*?(\n[ \t]*\n|\z)").unwrap());

const TIME_RANGE: &str = "-->";

//=========================================================================================
// Segment JSON
//=========================================================================================

#[derive(Deserialize)]
struct SegmentDocument {
    #[serde(default)]
    events: Vec<SegmentEvent>,
}

#[derive(Deserialize)]
struct SegmentEvent {
    #[serde(default)]
    segs: Option<Vec<Segment>>,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    utf8: Option<String>,
}

/// `{"events": [{"segs": [{"utf8": "text"}]}]}`
pub fn decode_segment_json(data: &[u8]) -> Result<String, CaptionDecodeError> {
    let doc: SegmentDocument = serde_json::from_slice(data)?;

    let parts: Vec<String> = doc
        .events
        .into_iter()
        .flat_map(|event| event.segs.unwrap_or_default())
        .filter_map(|seg| seg.utf8)
        .filter(|text| !text.is_empty() && text != "\n")
        .map(|text| strip_markup(&text))
        .collect();

    Ok(join_trimmed(parts))
}

//=========================================================================================
// SubRip
//=========================================================================================

/// Blocks of: sequence number, time range, one or more text lines.
pub fn decode_srt(data: &[u8]) -> String {
    let content = normalize_newlines(data);

    let parts: Vec<String> = BLANK_LINE
        .split(&content)
        .filter_map(|block| {
            let lines: Vec<&str> = block.trim().lines().collect();
            if lines.len() < 3 {
                return None;
            }
            let text = lines[2..]
                .iter()
                .filter(|line| !line.contains(TIME_RANGE))
                .map(|line| strip_markup(line))
                .collect::<Vec<_>>()
                .join(" ");
            Some(text)
        })
        .collect();

    join_trimmed(parts)
}

//=========================================================================================
// WebVTT
//=========================================================================================

pub fn decode_vtt(data: &[u8]) -> String {
    let content = normalize_newlines(data);
    let content = strip_vtt_header(&content);
    let content = VTT_NOTE.replace_all(content, "");
    let content = VTT_STYLE.replace_all(&content, "");

    let mut parts = Vec::new();
    for block in BLANK_LINE.split(&content) {
        let lines: Vec<&str> = block.trim().lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.contains(TIME_RANGE) || line.trim().is_empty() {
                continue;
            }
            // cue identifier
            if lines.get(i + 1).is_some_and(|next| next.contains(TIME_RANGE)) {
                continue;
            }
            parts.push(strip_markup(line));
        }
    }

    join_trimmed(parts)
}

/// Drops the `WEBVTT` line and any `Key: value` header lines after it.
/// The header ends at the first blank line or the first cue timing line.
fn strip_vtt_header(content: &str) -> &str {
    let body = content.trim_start();
    if !body.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("WEBVTT")) {
        return content;
    }

    let mut rest = body.split_once('\n').map_or("", |(_, tail)| tail);
    loop {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        if line.trim().is_empty() || line.contains(TIME_RANGE) {
            return rest;
        }
        rest = tail;
    }
}

//=========================================================================================
// Cleanup
//=========================================================================================

/// Removes noise annotations, collapses whitespace runs, and trims.
/// Idempotent.
pub fn clean(text: &str) -> String {
    // tokens become spaces so neighbouring words never splice together
    let without_noise = NOISE.replace_all(text, " ");
    WHITESPACE.replace_all(&without_noise, " ").trim().to_string()
}

fn strip_markup(line: &str) -> String {
    let without_tags = TAG.replace_all(line, "");
    without_tags.replace(TIME_RANGE, " ").trim().to_string()
}

fn normalize_newlines(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Joins non-empty parts and strips again, since a tag can span two lines.
fn join_trimmed(parts: Vec<String>) -> String {
    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    strip_markup(&joined)
}
