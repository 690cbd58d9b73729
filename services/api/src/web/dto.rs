//! services/api/src/web/dto.rs
//!
//! JSON shapes of the REST API. Domain types stay free of serialization
//! concerns; these structs are the only things handlers serialize.

use chrono::{DateTime, Utc};
use lattice_core::domain::{
    Concept, GeneratedContentItem, PipelineResult, QuizQuestion, SourceContent,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request Payloads
//=========================================================================================

/// Submit a video for processing.
#[derive(Deserialize, ToSchema)]
pub struct CreateSourceContentRequest {
    /// `"video"` or `"youtube"`.
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct SourceContentDto {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub title: String,
    pub transcript: String,
    pub processed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<SourceContent> for SourceContentDto {
    fn from(s: SourceContent) -> Self {
        Self {
            id: s.id,
            source_type: s.source_type.as_str().to_string(),
            url: s.url,
            title: s.title,
            transcript: s.transcript,
            processed_at: s.processed_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConceptDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub source_content_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Concept> for ConceptDto {
    fn from(c: Concept) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            source_content_id: c.source_content_id,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuizQuestionDto {
    pub id: Uuid,
    pub concept_id: Uuid,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    /// One of `A`, `B`, `C`, `D`.
    pub correct_answer: String,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl From<QuizQuestion> for QuizQuestionDto {
    fn from(q: QuizQuestion) -> Self {
        let [option_a, option_b, option_c, option_d] = q.options;
        Self {
            id: q.id,
            concept_id: q.concept_id,
            question: q.question,
            option_a,
            option_b,
            option_c,
            option_d,
            correct_answer: q.correct_answer.as_str().to_string(),
            explanation: q.explanation,
            created_at: q.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GeneratedContentDto {
    pub id: Uuid,
    pub platform: String,
    pub title: String,
    pub body: String,
    pub concept_ids: Vec<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<GeneratedContentItem> for GeneratedContentDto {
    fn from(i: GeneratedContentItem) -> Self {
        Self {
            id: i.id,
            platform: i.platform.as_str().to_string(),
            title: i.title,
            body: i.body,
            concept_ids: i.concept_ids,
            status: i.status.as_str().to_string(),
            created_at: i.created_at,
        }
    }
}

/// Everything stored for one source.
#[derive(Serialize, ToSchema)]
pub struct ProcessResultDto {
    pub source_content: SourceContentDto,
    pub concepts: Vec<ConceptDto>,
    pub quizzes: Vec<QuizQuestionDto>,
    pub generated_content: Vec<GeneratedContentDto>,
}

impl From<PipelineResult> for ProcessResultDto {
    fn from(r: PipelineResult) -> Self {
        Self {
            source_content: r.source.into(),
            concepts: r.concepts.into_iter().map(Into::into).collect(),
            quizzes: r.quizzes.into_iter().map(Into::into).collect(),
            generated_content: r.generated_content.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SourceContentList {
    pub source_contents: Vec<SourceContentDto>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ConceptList {
    pub concepts: Vec<ConceptDto>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct QuizList {
    pub quizzes: Vec<QuizQuestionDto>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct GeneratedContentList {
    pub generated_content: Vec<GeneratedContentDto>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Body of every non-2xx response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}
