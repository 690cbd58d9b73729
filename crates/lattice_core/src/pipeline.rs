//! crates/lattice_core/src/pipeline.rs
//!
//! The content pipeline: takes a submitted video url through transcript
//! acquisition, source persistence, and the three derivation stages.
//!
//! Only the first steps can fail a run. Once the source row exists, every
//! later stage degrades to an empty collection and the run still succeeds.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::derivation::Deriver;
use crate::domain::{
    Concept, GeneratedContentItem, NewSourceContent, Platform, PipelineResult, QuizQuestion,
    SourceContent, SourceType,
};
use crate::ports::{AcquisitionError, ContentRepository, PortError};
use crate::transcript::TranscriptAcquirer;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] PortError),
    #[error("processing was cancelled")]
    Cancelled,
}

/// Races `fut` against the token. A dropped future releases whatever it
/// holds (child process, HTTP request, open transaction).
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        out = fut => Ok(out),
    }
}

#[derive(Clone)]
pub struct ContentPipeline {
    repo: Arc<dyn ContentRepository>,
    acquirer: TranscriptAcquirer,
    deriver: Deriver,
}

impl ContentPipeline {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        acquirer: TranscriptAcquirer,
        deriver: Deriver,
    ) -> Self {
        Self {
            repo,
            acquirer,
            deriver,
        }
    }

    /// Runs the full pipeline for `url`, or returns what is already stored
    /// for it.
    #[instrument(skip(self, cancel))]
    pub async fn process(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        // --- Duplicate check ---
        if let Some(existing) = until_cancelled(cancel, self.repo.find_source_by_url(url)).await?? {
            info!(source_id = %existing.id, "Url already processed; returning stored results");
            return until_cancelled(cancel, self.assemble(existing)).await;
        }

        // --- Transcript ---
        info!("Fetching video info");
        let info = until_cancelled(cancel, self.acquirer.fetch_video_info(url)).await??;
        let transcript = info.transcript?;

        // --- Source ---
        let new_source = NewSourceContent {
            source_type: SourceType::Video,
            url: url.to_string(),
            title: info.metadata.title,
            transcript: transcript.text,
        };
        let source = match until_cancelled(cancel, self.repo.create_source(new_source)).await? {
            Ok(source) => source,
            Err(PortError::Conflict(reason)) => {
                // Lost a race with a concurrent submission of the same url.
                warn!(reason = reason.as_str(), "Source was stored concurrently; returning stored results");
                let existing = until_cancelled(cancel, self.repo.find_source_by_url(url))
                    .await??
                    .ok_or(PortError::Conflict(reason))?;
                return until_cancelled(cancel, self.assemble(existing)).await;
            }
            Err(e) => return Err(e.into()),
        };
        info!(source_id = %source.id, "Source content saved");

        // --- Concepts ---
        let extracted = match until_cancelled(
            cancel,
            self.deriver.extract_concepts(&source.transcript, source.id),
        )
        .await?
        {
            Ok(concepts) => concepts,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "Concept extraction failed; returning source only");
                return Ok(PipelineResult::source_only(source));
            }
        };
        let concepts = match until_cancelled(cancel, self.repo.create_concepts_batch(extracted))
            .await?
        {
            Ok(concepts) => concepts,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "Saving concepts failed; returning source only");
                return Ok(PipelineResult::source_only(source));
            }
        };
        info!(source_id = %source.id, count = concepts.len(), "Concepts saved");

        if concepts.is_empty() {
            warn!(source_id = %source.id, "No concepts extracted; skipping quizzes and content");
            return Ok(PipelineResult::source_only(source));
        }

        let quizzes = self.quiz_stage(&concepts, cancel).await?;
        let generated_content = self.content_stage(&concepts, cancel).await?;

        info!(
            source_id = %source.id,
            concepts = concepts.len(),
            quizzes = quizzes.len(),
            content = generated_content.len(),
            "Processing complete"
        );
        Ok(PipelineResult {
            source,
            concepts,
            quizzes,
            generated_content,
        })
    }

    async fn quiz_stage(
        &self,
        concepts: &[Concept],
        cancel: &CancellationToken,
    ) -> Result<Vec<QuizQuestion>, PipelineError> {
        info!(concepts = concepts.len(), "Generating quizzes");
        let mut pending = Vec::new();
        for concept in concepts {
            match until_cancelled(cancel, self.deriver.generate_quiz(concept)).await? {
                Ok(questions) => pending.extend(questions),
                Err(e) => {
                    warn!(concept_id = %concept.id, error = %e, "Quiz generation failed; skipping concept");
                }
            }
        }

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let count = pending.len();
        match until_cancelled(cancel, self.repo.create_quizzes_batch(pending)).await? {
            Ok(saved) => {
                info!(count, "Quizzes saved");
                Ok(saved)
            }
            Err(e) => {
                warn!(count, error = %e, "Saving quizzes failed; dropping all quizzes");
                Ok(Vec::new())
            }
        }
    }

    async fn content_stage(
        &self,
        concepts: &[Concept],
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedContentItem>, PipelineError> {
        info!("Generating platform content");
        let mut pending = Vec::new();
        for platform in Platform::PIPELINE {
            match until_cancelled(cancel, self.deriver.generate_content(platform, concepts)).await? {
                Ok(item) => pending.push(item),
                Err(e) => {
                    warn!(%platform, error = %e, "Content generation failed; skipping platform");
                }
            }
        }

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let count = pending.len();
        match until_cancelled(cancel, self.repo.create_content_batch(pending)).await? {
            Ok(saved) => {
                info!(count, "Generated content saved");
                Ok(saved)
            }
            Err(e) => {
                warn!(count, error = %e, "Saving generated content failed; dropping all content");
                Ok(Vec::new())
            }
        }
    }

    /// Rebuilds the aggregate for a stored source. Read failures of the
    /// related collections degrade to empty.
    pub async fn assemble(&self, source: SourceContent) -> PipelineResult {
        let concepts = self
            .repo
            .find_concepts_by_source(source.id)
            .await
            .unwrap_or_else(|e| {
                warn!(source_id = %source.id, error = %e, "Failed to load concepts");
                Vec::new()
            });

        let quizzes = self
            .repo
            .find_quizzes_by_source(source.id)
            .await
            .unwrap_or_else(|e| {
                warn!(source_id = %source.id, error = %e, "Failed to load quizzes");
                Vec::new()
            });

        let generated_content = if concepts.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<Uuid> = concepts.iter().map(|c| c.id).collect();
            self.repo
                .find_content_by_concept_ids(&ids)
                .await
                .unwrap_or_else(|e| {
                    warn!(source_id = %source.id, error = %e, "Failed to load generated content");
                    Vec::new()
                })
        };

        PipelineResult {
            source,
            concepts,
            quizzes,
            generated_content,
        }
    }

    pub async fn get_with_related(&self, id: Uuid) -> Result<PipelineResult, PipelineError> {
        let source = self.repo.get_source_by_id(id).await?;
        Ok(self.assemble(source).await)
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceContent>, PipelineError> {
        Ok(self.repo.list_sources().await?)
    }
}
