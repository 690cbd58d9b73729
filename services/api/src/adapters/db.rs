//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ContentRepository` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lattice_core::domain::{
    AnswerChoice, Concept, ContentStatus, GeneratedContentItem, NewConcept, NewGeneratedContent,
    NewQuizQuestion, NewSourceContent, Platform, QuizQuestion, SourceContent, SourceType,
};
use lattice_core::ports::{ContentRepository, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ContentRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn corrupt(column: &str, reason: String) -> PortError {
    PortError::Unexpected(format!("invalid {} in database: {}", column, reason))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SourceRecord {
    id: Uuid,
    source_type: String,
    url: String,
    title: String,
    transcript: String,
    processed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl SourceRecord {
    fn to_domain(self) -> PortResult<SourceContent> {
        Ok(SourceContent {
            id: self.id,
            source_type: self
                .source_type
                .parse::<SourceType>()
                .map_err(|e| corrupt("source_type", e))?,
            url: self.url,
            title: self.title,
            transcript: self.transcript,
            processed_at: self.processed_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ConceptRecord {
    id: Uuid,
    source_content_id: Uuid,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
}
impl ConceptRecord {
    fn to_domain(self) -> Concept {
        Concept {
            id: self.id,
            title: self.title,
            description: self.description,
            source_content_id: self.source_content_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    concept_id: Uuid,
    question: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_answer: String,
    explanation: String,
    created_at: DateTime<Utc>,
}
impl QuizRecord {
    fn to_domain(self) -> PortResult<QuizQuestion> {
        Ok(QuizQuestion {
            id: self.id,
            concept_id: self.concept_id,
            question: self.question,
            options: [self.option_a, self.option_b, self.option_c, self.option_d],
            correct_answer: self
                .correct_answer
                .parse::<AnswerChoice>()
                .map_err(|e| corrupt("correct_answer", e))?,
            explanation: self.explanation,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ContentRecord {
    id: Uuid,
    platform: String,
    title: String,
    body: String,
    status: String,
    created_at: DateTime<Utc>,
    /// Aggregated from the join table, in stored position order.
    concept_ids: Vec<Uuid>,
}
impl ContentRecord {
    fn to_domain(self) -> PortResult<GeneratedContentItem> {
        Ok(GeneratedContentItem {
            id: self.id,
            platform: self
                .platform
                .parse::<Platform>()
                .map_err(|e| corrupt("platform", e))?,
            title: self.title,
            body: self.body,
            concept_ids: self.concept_ids,
            status: self
                .status
                .parse::<ContentStatus>()
                .map_err(|e| corrupt("status", e))?,
            created_at: self.created_at,
        })
    }
}

const SOURCE_COLUMNS: &str = "id, source_type, url, title, transcript, processed_at, created_at";
const CONCEPT_COLUMNS: &str = "id, source_content_id, title, description, created_at";
const QUIZ_COLUMNS: &str = "id, concept_id, question, option_a, option_b, option_c, option_d, \
                            correct_answer, explanation, created_at";

//=========================================================================================
// `ContentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentRepository for DbAdapter {
    async fn create_source(&self, source: NewSourceContent) -> PortResult<SourceContent> {
        let sql = format!(
            "INSERT INTO source_contents (id, source_type, url, title, transcript) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (url) DO NOTHING \
             RETURNING {}",
            SOURCE_COLUMNS
        );
        let record = sqlx::query_as::<_, SourceRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(source.source_type.as_str())
            .bind(&source.url)
            .bind(&source.title)
            .bind(&source.transcript)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match record {
            Some(record) => record.to_domain(),
            None => Err(PortError::Conflict(format!(
                "Source content for url {} already exists",
                source.url
            ))),
        }
    }

    async fn find_source_by_url(&self, url: &str) -> PortResult<Option<SourceContent>> {
        let sql = format!("SELECT {} FROM source_contents WHERE url = $1", SOURCE_COLUMNS);
        let record = sqlx::query_as::<_, SourceRecord>(&sql)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(SourceRecord::to_domain).transpose()
    }

    async fn get_source_by_id(&self, id: Uuid) -> PortResult<SourceContent> {
        let sql = format!("SELECT {} FROM source_contents WHERE id = $1", SOURCE_COLUMNS);
        let record = sqlx::query_as::<_, SourceRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Source content {} not found", id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        record.to_domain()
    }

    async fn list_sources(&self) -> PortResult<Vec<SourceContent>> {
        let sql = format!(
            "SELECT {} FROM source_contents ORDER BY created_at DESC, seq DESC",
            SOURCE_COLUMNS
        );
        let records = sqlx::query_as::<_, SourceRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(SourceRecord::to_domain).collect()
    }

    async fn create_concepts_batch(&self, concepts: Vec<NewConcept>) -> PortResult<Vec<Concept>> {
        let sql = format!(
            "INSERT INTO concepts (id, source_content_id, title, description) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            CONCEPT_COLUMNS
        );

        // Rolled back on drop unless committed.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut saved = Vec::with_capacity(concepts.len());
        for concept in concepts {
            let record = sqlx::query_as::<_, ConceptRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(concept.source_content_id)
                .bind(&concept.title)
                .bind(&concept.description)
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
            saved.push(record.to_domain());
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(saved)
    }

    async fn create_quizzes_batch(
        &self,
        questions: Vec<NewQuizQuestion>,
    ) -> PortResult<Vec<QuizQuestion>> {
        let sql = format!(
            "INSERT INTO quiz_questions \
             (id, concept_id, question, option_a, option_b, option_c, option_d, correct_answer, explanation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            QUIZ_COLUMNS
        );

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut saved = Vec::with_capacity(questions.len());
        for q in questions {
            let [a, b, c, d] = q.options;
            let record = sqlx::query_as::<_, QuizRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(q.concept_id)
                .bind(q.question)
                .bind(a)
                .bind(b)
                .bind(c)
                .bind(d)
                .bind(q.correct_answer.as_str())
                .bind(q.explanation)
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
            saved.push(record.to_domain()?);
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(saved)
    }

    async fn create_content_batch(
        &self,
        items: Vec<NewGeneratedContent>,
    ) -> PortResult<Vec<GeneratedContentItem>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            let (id, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
                "INSERT INTO generated_contents (id, platform, title, body, status) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id, created_at",
            )
            .bind(Uuid::new_v4())
            .bind(item.platform.as_str())
            .bind(&item.title)
            .bind(&item.body)
            .bind(item.status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;

            for (position, concept_id) in item.concept_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO generated_content_concepts (content_id, concept_id, position) \
                     VALUES ($1, $2, $3)",
                )
                .bind(id)
                .bind(concept_id)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
            }

            saved.push(GeneratedContentItem {
                id,
                platform: item.platform,
                title: item.title,
                body: item.body,
                concept_ids: item.concept_ids,
                status: item.status,
                created_at,
            });
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(saved)
    }

    async fn find_concepts_by_source(&self, source_id: Uuid) -> PortResult<Vec<Concept>> {
        let sql = format!(
            "SELECT {} FROM concepts WHERE source_content_id = $1 ORDER BY seq ASC",
            CONCEPT_COLUMNS
        );
        let records = sqlx::query_as::<_, ConceptRecord>(&sql)
            .bind(source_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_quizzes_by_source(&self, source_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        let records = sqlx::query_as::<_, QuizRecord>(
            "SELECT q.id, q.concept_id, q.question, q.option_a, q.option_b, q.option_c, q.option_d, \
                    q.correct_answer, q.explanation, q.created_at \
             FROM quiz_questions q \
             JOIN concepts c ON c.id = q.concept_id \
             WHERE c.source_content_id = $1 \
             ORDER BY q.seq ASC",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(QuizRecord::to_domain).collect()
    }

    async fn find_content_by_concept_ids(
        &self,
        concept_ids: &[Uuid],
    ) -> PortResult<Vec<GeneratedContentItem>> {
        if concept_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, ContentRecord>(
            "SELECT gc.id, gc.platform, gc.title, gc.body, gc.status, gc.created_at, \
                    ARRAY( \
                        SELECT gcc.concept_id FROM generated_content_concepts gcc \
                        WHERE gcc.content_id = gc.id ORDER BY gcc.position \
                    ) AS concept_ids \
             FROM generated_contents gc \
             WHERE EXISTS ( \
                 SELECT 1 FROM generated_content_concepts m \
                 WHERE m.content_id = gc.id AND m.concept_id = ANY($1) \
             ) \
             ORDER BY gc.seq ASC",
        )
        .bind(concept_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ContentRecord::to_domain).collect()
    }
}
