//! crates/lattice_core/src/captions/mod.rs
//!
//! Caption handling: reading the metadata tool's document, choosing a track,
//! and turning the downloaded payload into plain text.

pub mod decoder;
pub mod document;
pub mod locator;

pub use decoder::{clean, decode_segment_json, decode_srt, decode_vtt, CaptionDecodeError};
pub use document::{CaptionKind, TrackEntry, VideoDocument};
pub use locator::{locate, CaptionEncoding, CaptionTrack, FORMAT_PREFERENCE};
