//! End-to-end runs of `ContentPipeline` against in-memory ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use lattice_core::domain::{NewConcept, NewGeneratedContent, NewQuizQuestion, NewSourceContent};
use lattice_core::{
    AcquisitionError, CaptionFetcher, CaptionRequest, Concept, ConceptRange, ContentPipeline,
    ContentRepository, DerivationError, Deriver, GeneratedContentItem, LanguageModel,
    MetadataTool, PipelineError, Platform, PortError, PortResult, QuizQuestion, SourceContent,
    TranscriptAcquirer, VideoReference,
};

const URL: &str = "https://www.youtube.com/watch?v=pipeline01";

//=========================================================================================
// Test Doubles
//=========================================================================================

#[derive(Default)]
struct Store {
    sources: Vec<SourceContent>,
    concepts: Vec<Concept>,
    quizzes: Vec<QuizQuestion>,
    content: Vec<GeneratedContentItem>,
}

#[derive(Default)]
struct MemoryRepo {
    store: Mutex<Store>,
    fail_create_source: bool,
    fail_concepts: bool,
    fail_quizzes: bool,
    fail_content: bool,
    /// Inserted by a "concurrent" writer the moment `create_source` runs.
    racing_source: Mutex<Option<SourceContent>>,
    create_source_calls: AtomicUsize,
    concept_batch_calls: AtomicUsize,
    quiz_batch_calls: AtomicUsize,
    content_batch_sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl ContentRepository for MemoryRepo {
    async fn create_source(&self, source: NewSourceContent) -> PortResult<SourceContent> {
        self.create_source_calls.fetch_add(1, Ordering::SeqCst);
        let mut store = self.store.lock().unwrap();
        if let Some(raced) = self.racing_source.lock().unwrap().take() {
            store.sources.push(raced);
            return Err(PortError::Conflict(format!("url {} already exists", source.url)));
        }
        if self.fail_create_source {
            return Err(PortError::Unexpected("disk full".into()));
        }
        let now = Utc::now();
        let saved = SourceContent {
            id: Uuid::new_v4(),
            source_type: source.source_type,
            url: source.url,
            title: source.title,
            transcript: source.transcript,
            processed_at: now,
            created_at: now,
        };
        store.sources.push(saved.clone());
        Ok(saved)
    }

    async fn find_source_by_url(&self, url: &str) -> PortResult<Option<SourceContent>> {
        let store = self.store.lock().unwrap();
        Ok(store.sources.iter().find(|s| s.url == url).cloned())
    }

    async fn get_source_by_id(&self, id: Uuid) -> PortResult<SourceContent> {
        let store = self.store.lock().unwrap();
        store
            .sources
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("source {}", id)))
    }

    async fn list_sources(&self) -> PortResult<Vec<SourceContent>> {
        Ok(self.store.lock().unwrap().sources.clone())
    }

    async fn create_concepts_batch(&self, concepts: Vec<NewConcept>) -> PortResult<Vec<Concept>> {
        self.concept_batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_concepts {
            return Err(PortError::Unexpected("concept insert failed".into()));
        }
        let saved: Vec<Concept> = concepts
            .into_iter()
            .map(|c| Concept {
                id: Uuid::new_v4(),
                title: c.title,
                description: c.description,
                source_content_id: c.source_content_id,
                created_at: Utc::now(),
            })
            .collect();
        self.store.lock().unwrap().concepts.extend(saved.clone());
        Ok(saved)
    }

    async fn create_quizzes_batch(
        &self,
        questions: Vec<NewQuizQuestion>,
    ) -> PortResult<Vec<QuizQuestion>> {
        self.quiz_batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_quizzes {
            return Err(PortError::Unexpected("quiz insert failed".into()));
        }
        let saved: Vec<QuizQuestion> = questions
            .into_iter()
            .map(|q| QuizQuestion {
                id: Uuid::new_v4(),
                concept_id: q.concept_id,
                question: q.question,
                options: q.options,
                correct_answer: q.correct_answer,
                explanation: q.explanation,
                created_at: Utc::now(),
            })
            .collect();
        self.store.lock().unwrap().quizzes.extend(saved.clone());
        Ok(saved)
    }

    async fn create_content_batch(
        &self,
        items: Vec<NewGeneratedContent>,
    ) -> PortResult<Vec<GeneratedContentItem>> {
        self.content_batch_sizes.lock().unwrap().push(items.len());
        if self.fail_content {
            return Err(PortError::Unexpected("content insert failed".into()));
        }
        let saved: Vec<GeneratedContentItem> = items
            .into_iter()
            .map(|i| GeneratedContentItem {
                id: Uuid::new_v4(),
                platform: i.platform,
                title: i.title,
                body: i.body,
                concept_ids: i.concept_ids,
                status: i.status,
                created_at: Utc::now(),
            })
            .collect();
        self.store.lock().unwrap().content.extend(saved.clone());
        Ok(saved)
    }

    async fn find_concepts_by_source(&self, source_id: Uuid) -> PortResult<Vec<Concept>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .concepts
            .iter()
            .filter(|c| c.source_content_id == source_id)
            .cloned()
            .collect())
    }

    async fn find_quizzes_by_source(&self, source_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        let store = self.store.lock().unwrap();
        let concept_ids: Vec<Uuid> = store
            .concepts
            .iter()
            .filter(|c| c.source_content_id == source_id)
            .map(|c| c.id)
            .collect();
        Ok(store
            .quizzes
            .iter()
            .filter(|q| concept_ids.contains(&q.concept_id))
            .cloned()
            .collect())
    }

    async fn find_content_by_concept_ids(
        &self,
        concept_ids: &[Uuid],
    ) -> PortResult<Vec<GeneratedContentItem>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .content
            .iter()
            .filter(|i| i.concept_ids.iter().any(|id| concept_ids.contains(id)))
            .cloned()
            .collect())
    }
}

struct CountingTool {
    document: String,
    calls: AtomicUsize,
}

impl CountingTool {
    fn with_english_captions() -> Self {
        Self::with_document(
            r#"{"title":"Intro to Rust","duration":300,"channel":"Ferris",
                "automatic_captions":{"en":[{"ext":"json3","url":"https://captions.test/en"}]}}"#,
        )
    }

    fn with_document(document: &str) -> Self {
        Self {
            document: document.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetadataTool for CountingTool {
    async fn dump_json(
        &self,
        _reference: &VideoReference,
        _captions: CaptionRequest,
    ) -> Result<Vec<u8>, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.clone().into_bytes())
    }
}

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl CaptionFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Bytes, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(
            br#"{"events":[{"segs":[{"utf8":"Ownership"},{"utf8":"moves"}]},{"segs":[{"utf8":"values."}]}]}"#,
        ))
    }
}

const CONCEPTS_REPLY: &str = r#"```json
[{"title":"Ownership","description":"Each value has one owner."},
 {"title":"Borrowing","description":"References without taking ownership."}]
```"#;

const QUIZ_REPLY: &str = r#"[
 {"question":"Q1?","option_a":"a","option_b":"b","option_c":"c","option_d":"d","correct_answer":"a","explanation":"x"},
 {"question":"Q2?","option_a":"a","option_b":"b","option_c":"c","option_d":"d","correct_answer":"D","explanation":"y"}
]"#;

/// Replies by recognising which stage a prompt belongs to.
#[derive(Default)]
struct FakeModel {
    fail_concepts: bool,
    fail_quiz_for: Option<&'static str>,
    fail_platform_system: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn ask(&self, system: Option<&str>, prompt: &str) -> Result<String, DerivationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = system.unwrap_or_default();

        if prompt.contains("Analyze this transcript") {
            if self.fail_concepts {
                return Err(DerivationError::EmptyResponse);
            }
            return Ok(CONCEPTS_REPLY.to_string());
        }
        if prompt.contains("quiz questions") {
            if let Some(title) = self.fail_quiz_for {
                if prompt.contains(&format!("Title: {}", title)) {
                    return Err(DerivationError::Timeout("deadline exceeded".into()));
                }
            }
            return Ok(QUIZ_REPLY.to_string());
        }
        if let Some(marker) = self.fail_platform_system {
            if system.contains(marker) {
                return Err(DerivationError::Service("overloaded".into()));
            }
        }
        Ok(r#"{"title":"Post","body":"Body text"}"#.to_string())
    }
}

struct Harness {
    pipeline: ContentPipeline,
    repo: Arc<MemoryRepo>,
    tool: Arc<CountingTool>,
    fetcher: Arc<CountingFetcher>,
    model: Arc<FakeModel>,
}

fn harness(repo: MemoryRepo, tool: CountingTool, model: FakeModel) -> Harness {
    let repo = Arc::new(repo);
    let tool = Arc::new(tool);
    let fetcher = Arc::new(CountingFetcher::default());
    let model = Arc::new(model);

    let acquirer = TranscriptAcquirer::new(tool.clone(), fetcher.clone());
    let deriver = Deriver::new(model.clone(), ConceptRange::default());
    let pipeline = ContentPipeline::new(repo.clone(), acquirer, deriver);

    Harness {
        pipeline,
        repo,
        tool,
        fetcher,
        model,
    }
}

fn default_harness() -> Harness {
    harness(
        MemoryRepo::default(),
        CountingTool::with_english_captions(),
        FakeModel::default(),
    )
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn full_run_produces_consistent_result() {
    let h = default_harness();
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.source.url, URL);
    assert_eq!(result.source.title, "Intro to Rust");
    assert_eq!(result.source.transcript, "Ownership moves values.");
    assert_eq!(result.concepts.len(), 2);
    assert_eq!(result.quizzes.len(), 4);
    assert_eq!(result.generated_content.len(), 3);

    let concept_ids: Vec<Uuid> = result.concepts.iter().map(|c| c.id).collect();
    assert!(result.concepts.iter().all(|c| c.source_content_id == result.source.id));
    assert!(result.quizzes.iter().all(|q| concept_ids.contains(&q.concept_id)));
    assert!(result
        .generated_content
        .iter()
        .all(|i| i.concept_ids == concept_ids));

    let platforms: Vec<Platform> = result.generated_content.iter().map(|i| i.platform).collect();
    assert_eq!(platforms, Platform::PIPELINE.to_vec());
}

#[tokio::test]
async fn second_submission_is_served_from_storage() {
    let h = default_harness();
    let cancel = CancellationToken::new();

    let first = h.pipeline.process(URL, &cancel).await.unwrap();
    let model_calls = h.model.calls.load(Ordering::SeqCst);
    let second = h.pipeline.process(URL, &cancel).await.unwrap();

    assert_eq!(second.source.id, first.source.id);
    assert_eq!(second.concepts, first.concepts);
    assert_eq!(second.quizzes, first.quizzes);
    assert_eq!(second.generated_content, first.generated_content);

    assert_eq!(h.tool.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), model_calls);
    assert_eq!(h.repo.create_source_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concept_extraction_failure_still_succeeds_with_source_only() {
    let h = harness(
        MemoryRepo::default(),
        CountingTool::with_english_captions(),
        FakeModel {
            fail_concepts: true,
            ..FakeModel::default()
        },
    );
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.source.url, URL);
    assert!(result.concepts.is_empty());
    assert!(result.quizzes.is_empty());
    assert!(result.generated_content.is_empty());
    assert_eq!(h.repo.concept_batch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concept_persistence_failure_returns_source_only() {
    let h = harness(
        MemoryRepo {
            fail_concepts: true,
            ..MemoryRepo::default()
        },
        CountingTool::with_english_captions(),
        FakeModel::default(),
    );
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert!(result.concepts.is_empty());
    assert!(result.quizzes.is_empty());
    assert!(result.generated_content.is_empty());
    assert_eq!(h.repo.quiz_batch_calls.load(Ordering::SeqCst), 0);
    assert!(h.repo.content_batch_sizes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn one_failing_platform_leaves_two_items() {
    let h = harness(
        MemoryRepo::default(),
        CountingTool::with_english_captions(),
        FakeModel {
            fail_platform_system: Some("Twitter"),
            ..FakeModel::default()
        },
    );
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.generated_content.len(), 2);
    assert!(result
        .generated_content
        .iter()
        .all(|i| i.platform != Platform::Twitter));
    assert_eq!(*h.repo.content_batch_sizes.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn quiz_failure_for_one_concept_skips_only_that_concept() {
    let h = harness(
        MemoryRepo::default(),
        CountingTool::with_english_captions(),
        FakeModel {
            fail_quiz_for: Some("Borrowing"),
            ..FakeModel::default()
        },
    );
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    let ownership = result.concepts.iter().find(|c| c.title == "Ownership").unwrap();
    assert_eq!(result.quizzes.len(), 2);
    assert!(result.quizzes.iter().all(|q| q.concept_id == ownership.id));
    assert_eq!(result.generated_content.len(), 3);
}

#[tokio::test]
async fn quiz_persistence_failure_drops_quizzes_but_keeps_the_rest() {
    let h = harness(
        MemoryRepo {
            fail_quizzes: true,
            ..MemoryRepo::default()
        },
        CountingTool::with_english_captions(),
        FakeModel::default(),
    );
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.concepts.len(), 2);
    assert!(result.quizzes.is_empty());
    assert_eq!(result.generated_content.len(), 3);
}

#[tokio::test]
async fn content_persistence_failure_drops_content_only() {
    let h = harness(
        MemoryRepo {
            fail_content: true,
            ..MemoryRepo::default()
        },
        CountingTool::with_english_captions(),
        FakeModel::default(),
    );
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.concepts.len(), 2);
    assert_eq!(result.quizzes.len(), 4);
    assert!(result.generated_content.is_empty());
}

#[tokio::test]
async fn missing_transcript_is_fatal_and_stores_nothing() {
    let h = harness(
        MemoryRepo::default(),
        CountingTool::with_document(r#"{"title":"No captions here"}"#),
        FakeModel::default(),
    );
    let err = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Acquisition(AcquisitionError::NoTranscript)
    ));
    assert_eq!(h.repo.create_source_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_reference_is_rejected() {
    let h = default_harness();
    let err = h
        .pipeline
        .process("https://example.com/video", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Acquisition(AcquisitionError::InvalidReference(_))
    ));
    assert_eq!(h.tool.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn source_persistence_failure_is_fatal() {
    let h = harness(
        MemoryRepo {
            fail_create_source: true,
            ..MemoryRepo::default()
        },
        CountingTool::with_english_captions(),
        FakeModel::default(),
    );
    let err = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Persistence(PortError::Unexpected(_))));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn losing_a_same_url_race_returns_the_stored_source() {
    let now = Utc::now();
    let winner = SourceContent {
        id: Uuid::new_v4(),
        source_type: lattice_core::SourceType::Video,
        url: URL.to_string(),
        title: "Stored by someone else".to_string(),
        transcript: "earlier transcript".to_string(),
        processed_at: now,
        created_at: now,
    };
    let repo = MemoryRepo::default();
    *repo.racing_source.lock().unwrap() = Some(winner.clone());

    let h = harness(repo, CountingTool::with_english_captions(), FakeModel::default());
    let result = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.source.id, winner.id);
    assert!(result.concepts.is_empty());
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_run_stops_before_any_external_call() {
    let h = default_harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.pipeline.process(URL, &cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(h.tool.calls.load(Ordering::SeqCst), 0);
    assert!(h.repo.list_sources().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_with_related_reassembles_and_reports_unknown_ids() {
    let h = default_harness();
    let first = h.pipeline.process(URL, &CancellationToken::new()).await.unwrap();

    let again = h.pipeline.get_with_related(first.source.id).await.unwrap();
    assert_eq!(again, first);

    let err = h.pipeline.get_with_related(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Persistence(PortError::NotFound(_))));
}
