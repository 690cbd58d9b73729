//! Picks the caption track to download from a video document.

use std::fmt;

use super::document::{CaptionKind, TrackEntry, VideoDocument};

/// Caption encodings, identified by the track's declared extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionEncoding {
    /// Segment-event JSON (`json3`).
    Json3,
    Vtt,
    Srv3,
    Srv2,
    Srv1,
    /// SubRip (`srt`).
    Srt,
    Other(String),
    Unknown,
}

impl CaptionEncoding {
    pub fn from_ext(ext: &str) -> Self {
        match ext {
            "json3" => CaptionEncoding::Json3,
            "vtt" => CaptionEncoding::Vtt,
            "srv3" => CaptionEncoding::Srv3,
            "srv2" => CaptionEncoding::Srv2,
            "srv1" => CaptionEncoding::Srv1,
            "srt" => CaptionEncoding::Srt,
            "" => CaptionEncoding::Unknown,
            other => CaptionEncoding::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CaptionEncoding::Json3 => "json3",
            CaptionEncoding::Vtt => "vtt",
            CaptionEncoding::Srv3 => "srv3",
            CaptionEncoding::Srv2 => "srv2",
            CaptionEncoding::Srv1 => "srv1",
            CaptionEncoding::Srt => "srt",
            CaptionEncoding::Other(ext) => ext,
            CaptionEncoding::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CaptionEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub url: String,
    pub encoding: CaptionEncoding,
}

/// Most preferred first.
pub const FORMAT_PREFERENCE: [&str; 5] = ["json3", "vtt", "srv3", "srv2", "srv1"];

const CAPTION_LANGUAGE: &str = "en";

/// Automatic captions are checked before manual ones; within a collection
/// the English tracks are scanned by `FORMAT_PREFERENCE`, then the first
/// track carrying a url is taken as-is.
pub fn locate(doc: &VideoDocument) -> Option<CaptionTrack> {
    [CaptionKind::Automatic, CaptionKind::Manual]
        .into_iter()
        .find_map(|kind| pick_track(doc.tracks(kind, CAPTION_LANGUAGE)))
}

fn pick_track(tracks: &[TrackEntry]) -> Option<CaptionTrack> {
    if tracks.is_empty() {
        return None;
    }

    for preferred in FORMAT_PREFERENCE {
        let hit = tracks
            .iter()
            .find(|t| t.ext.as_deref() == Some(preferred) && t.url.is_some());
        if let Some(track) = hit {
            return Some(CaptionTrack {
                url: track.url.clone().unwrap_or_default(),
                encoding: CaptionEncoding::from_ext(preferred),
            });
        }
    }

    tracks.iter().find_map(|t| {
        let url = t.url.clone()?;
        let encoding = t
            .ext
            .as_deref()
            .map(CaptionEncoding::from_ext)
            .unwrap_or(CaptionEncoding::Unknown);
        Some(CaptionTrack { url, encoding })
    })
}
