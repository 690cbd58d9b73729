//! crates/lattice_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::AcquisitionError;

//=========================================================================================
// Acquisition Inputs and Outputs
//=========================================================================================

static REFERENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^https?://(www\.)?youtube\.com/watch\?v=[\w-]+",
        r"^https?://(www\.)?youtu\.be/[\w-]+",
        r"^https?://(www\.)?youtube\.com/embed/[\w-]+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("reference pattern is valid"))
    .collect()
});

/// A validated video URL. The raw string is kept verbatim because it is also
/// the dedup key for stored source content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoReference(String);

impl VideoReference {
    /// Accepts `watch?v=`, short-link, and embed-link URL shapes.
    pub fn parse(raw: &str) -> Result<Self, AcquisitionError> {
        if REFERENCE_PATTERNS.iter().any(|re| re.is_match(raw)) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AcquisitionError::InvalidReference(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized plain-text transcript. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoMetadata {
    pub title: String,
    pub duration_seconds: u64,
    pub channel_name: String,
}

/// Metadata is always present; the transcript may have failed independently.
#[derive(Debug)]
pub struct VideoInfo {
    pub metadata: VideoMetadata,
    pub transcript: Result<Transcript, AcquisitionError>,
}

//=========================================================================================
// Persisted Entities
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Video,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Video => "video",
        }
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" | "youtube" => Ok(SourceType::Video),
            other => Err(format!("unknown source type '{}'", other)),
        }
    }
}

/// Represents an ingested video and its transcript. Created once per url.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContent {
    pub id: Uuid,
    pub source_type: SourceType,
    pub url: String,
    pub title: String,
    pub transcript: String,
    pub processed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSourceContent {
    pub source_type: SourceType,
    pub url: String,
    pub title: String,
    pub transcript: String,
}

/// A single learnable unit extracted from a source transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Concept {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub source_content_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewConcept {
    pub title: String,
    pub description: String,
    pub source_content_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerChoice {
    A,
    B,
    C,
    D,
}

impl AnswerChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerChoice::A => "A",
            AnswerChoice::B => "B",
            AnswerChoice::C => "C",
            AnswerChoice::D => "D",
        }
    }
}

impl FromStr for AnswerChoice {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(AnswerChoice::A),
            "B" => Ok(AnswerChoice::B),
            "C" => Ok(AnswerChoice::C),
            "D" => Ok(AnswerChoice::D),
            other => Err(format!("'{}' is not one of A, B, C, D", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub concept_id: Uuid,
    pub question: String,
    /// Options A through D, in order.
    pub options: [String; 4],
    pub correct_answer: AnswerChoice,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuizQuestion {
    pub concept_id: Uuid,
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: AnswerChoice,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    LinkedIn,
    Twitter,
    Blog,
    Email,
}

impl Platform {
    /// The platforms the pipeline generates content for, in generation order.
    pub const PIPELINE: [Platform; 3] = [Platform::LinkedIn, Platform::Twitter, Platform::Blog];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Blog => "blog",
            Platform::Email => "email",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linkedin" => Ok(Platform::LinkedIn),
            "twitter" => Ok(Platform::Twitter),
            "blog" => Ok(Platform::Blog),
            "email" => Ok(Platform::Email),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    Draft,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
        }
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            other => Err(format!("unknown content status '{}'", other)),
        }
    }
}

/// Platform content associated with an ordered set of concepts.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContentItem {
    pub id: Uuid,
    pub platform: Platform,
    pub title: String,
    pub body: String,
    pub concept_ids: Vec<Uuid>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneratedContent {
    pub platform: Platform,
    pub title: String,
    pub body: String,
    pub concept_ids: Vec<Uuid>,
    pub status: ContentStatus,
}

//=========================================================================================
// Pipeline Aggregate
//=========================================================================================

/// Everything produced (or partially produced) for one submitted reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub source: SourceContent,
    pub concepts: Vec<Concept>,
    pub quizzes: Vec<QuizQuestion>,
    pub generated_content: Vec<GeneratedContentItem>,
}

impl PipelineResult {
    pub fn source_only(source: SourceContent) -> Self {
        Self {
            source,
            concepts: Vec::new(),
            quizzes: Vec::new(),
            generated_content: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_three_url_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=abc-_123",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            let reference = VideoReference::parse(url).unwrap();
            assert_eq!(reference.as_str(), url);
        }
    }

    #[test]
    fn rejects_other_urls() {
        for url in [
            "",
            "youtube.com/watch?v=abc",
            "https://vimeo.com/12345",
            "https://www.youtube.com/channel/xyz",
            "ftp://youtu.be/abc",
        ] {
            assert!(matches!(
                VideoReference::parse(url),
                Err(AcquisitionError::InvalidReference(_))
            ));
        }
    }

    #[test]
    fn answer_choice_is_case_insensitive() {
        assert_eq!(" b ".parse::<AnswerChoice>().unwrap(), AnswerChoice::B);
        assert!("E".parse::<AnswerChoice>().is_err());
    }

    #[test]
    fn platform_names_round_trip() {
        for p in [Platform::LinkedIn, Platform::Twitter, Platform::Blog, Platform::Email] {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
    }
}
