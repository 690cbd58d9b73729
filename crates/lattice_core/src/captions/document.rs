//! Typed view over the metadata tool's JSON document.
//!
//! The tool's output is loosely shaped. Every field here is optional and every
//! accessor treats "absent" and "wrong type" as the same outcome.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::VideoMetadata;

/// Which caption collection of the document to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionKind {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackEntry {
    pub ext: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoDocument {
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    automatic_captions: HashMap<String, Vec<TrackEntry>>,
    subtitles: HashMap<String, Vec<TrackEntry>>,
}

impl VideoDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_value(&value))
    }

    /// Never fails: a non-object root yields an empty document.
    pub fn from_value(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            return Self::default();
        };

        Self {
            title: string_field(root, "title"),
            duration_seconds: root.get("duration").and_then(Value::as_f64),
            channel: string_field(root, "channel"),
            uploader: string_field(root, "uploader"),
            automatic_captions: caption_index(root.get("automatic_captions")),
            subtitles: caption_index(root.get("subtitles")),
        }
    }

    /// Tracks for `language` in the given collection, in document order.
    pub fn tracks(&self, kind: CaptionKind, language: &str) -> &[TrackEntry] {
        let index = match kind {
            CaptionKind::Automatic => &self.automatic_captions,
            CaptionKind::Manual => &self.subtitles,
        };
        index.get(language).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Channel falls back to the uploader name; a negative or missing
    /// duration becomes zero.
    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            title: self.title.clone().unwrap_or_default(),
            duration_seconds: self
                .duration_seconds
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d as u64)
                .unwrap_or(0),
            channel_name: self
                .channel
                .clone()
                .or_else(|| self.uploader.clone())
                .unwrap_or_default(),
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn caption_index(value: Option<&Value>) -> HashMap<String, Vec<TrackEntry>> {
    let Some(languages) = value.and_then(Value::as_object) else {
        return HashMap::new();
    };

    languages
        .iter()
        .filter_map(|(language, entries)| {
            let entries = entries.as_array()?;
            let tracks = entries
                .iter()
                .map(|entry| match entry.as_object() {
                    Some(obj) => TrackEntry {
                        ext: string_field(obj, "ext"),
                        url: string_field(obj, "url"),
                    },
                    None => TrackEntry::default(),
                })
                .collect();
            Some((language.clone(), tracks))
        })
        .collect()
}
