//! crates/lattice_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases, the
//! metadata tool, or the derivation service.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::{
    Concept, GeneratedContentItem, NewConcept, NewGeneratedContent, NewQuizQuestion,
    NewSourceContent, QuizQuestion, SourceContent, VideoReference,
};

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// A generic error type for persistence operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A unique key (the source url) already exists.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures while turning a video reference into a transcript.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("invalid video URL: {0}")]
    InvalidReference(String),
    #[error("video is private, deleted, or unavailable")]
    VideoUnavailable,
    #[error("no transcript available for this video")]
    NoTranscript,
    #[error("metadata tool failed: {0}")]
    ToolExecutionFailed(String),
    #[error("metadata tool produced unreadable output: {0}")]
    MalformedMetadata(String),
    #[error("caption download failed: {0}")]
    CaptionDownload(String),
    #[error("caption payload could not be decoded: {0}")]
    CaptionDecode(String),
}

/// Failures from the generative-text service and from reading its replies.
#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error("derivation service API key is not configured")]
    AuthMissing,
    #[error("derivation service rate limit exceeded")]
    RateLimited,
    #[error("derivation service request timed out: {0}")]
    Timeout(String),
    #[error("derivation service error: {0}")]
    Service(String),
    #[error("derivation service returned an empty response")]
    EmptyResponse,
    #[error("failed to parse JSON from derivation reply: {0}")]
    MalformedJson(String),
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ContentRepository: Send + Sync {
    // --- Source Content ---
    /// Fails with `PortError::Conflict` when a source with the same url exists.
    async fn create_source(&self, source: NewSourceContent) -> PortResult<SourceContent>;

    async fn find_source_by_url(&self, url: &str) -> PortResult<Option<SourceContent>>;

    async fn get_source_by_id(&self, id: Uuid) -> PortResult<SourceContent>;

    async fn list_sources(&self) -> PortResult<Vec<SourceContent>>;

    // --- Batch Inserts (each batch commits as a whole or not at all) ---
    async fn create_concepts_batch(&self, concepts: Vec<NewConcept>) -> PortResult<Vec<Concept>>;

    async fn create_quizzes_batch(
        &self,
        questions: Vec<NewQuizQuestion>,
    ) -> PortResult<Vec<QuizQuestion>>;

    async fn create_content_batch(
        &self,
        items: Vec<NewGeneratedContent>,
    ) -> PortResult<Vec<GeneratedContentItem>>;

    // --- Related Lookups ---
    async fn find_concepts_by_source(&self, source_id: Uuid) -> PortResult<Vec<Concept>>;

    async fn find_quizzes_by_source(&self, source_id: Uuid) -> PortResult<Vec<QuizQuestion>>;

    /// Returns every item whose concept ids intersect `concept_ids`.
    async fn find_content_by_concept_ids(
        &self,
        concept_ids: &[Uuid],
    ) -> PortResult<Vec<GeneratedContentItem>>;
}

/// Which caption data the metadata tool should be asked to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionRequest {
    None,
    AutoEnglish,
}

#[async_trait]
pub trait MetadataTool: Send + Sync {
    /// Runs the external tool and returns its JSON document from stdout.
    async fn dump_json(
        &self,
        reference: &VideoReference,
        captions: CaptionRequest,
    ) -> Result<Vec<u8>, AcquisitionError>;
}

#[async_trait]
pub trait CaptionFetcher: Send + Sync {
    /// Downloads a caption payload. Any non-200 status is an error.
    async fn fetch(&self, url: &str) -> Result<Bytes, AcquisitionError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends one user prompt, optionally with a system instruction, and returns
    /// the text of the first content block.
    async fn ask(&self, system: Option<&str>, prompt: &str) -> Result<String, DerivationError>;
}
