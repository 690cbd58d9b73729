pub mod captions;
pub mod derivation;
pub mod domain;
pub mod pipeline;
pub mod ports;
pub mod transcript;

pub use derivation::{ask_for_json, ConceptRange, Deriver};
pub use domain::{
    AnswerChoice, Concept, ContentStatus, GeneratedContentItem, PipelineResult, Platform,
    QuizQuestion, SourceContent, SourceType, Transcript, VideoInfo, VideoMetadata, VideoReference,
};
pub use pipeline::{ContentPipeline, PipelineError};
pub use ports::{
    AcquisitionError, CaptionFetcher, CaptionRequest, ContentRepository, DerivationError,
    LanguageModel, MetadataTool, PortError, PortResult,
};
pub use transcript::TranscriptAcquirer;
