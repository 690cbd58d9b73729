//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::dto::{
    ConceptDto, ConceptList, CreateSourceContentRequest, ErrorResponse, GeneratedContentDto,
    GeneratedContentList, HealthResponse, ProcessResultDto, QuizList, QuizQuestionDto,
    SourceContentDto, SourceContentList,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use lattice_core::domain::SourceType;
use lattice_core::pipeline::PipelineError;
use lattice_core::ports::{AcquisitionError, PortError};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_source_content_handler,
        list_source_contents_handler,
        get_source_content_handler,
        list_concepts_handler,
        list_quizzes_handler,
        list_generated_content_handler,
        health_handler,
    ),
    components(
        schemas(
            CreateSourceContentRequest,
            ProcessResultDto,
            SourceContentDto,
            ConceptDto,
            QuizQuestionDto,
            GeneratedContentDto,
            SourceContentList,
            ConceptList,
            QuizList,
            GeneratedContentList,
            HealthResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "Lattice API", description = "Turns videos into concepts, quizzes, and platform content.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Acquisition(e) => match e {
            AcquisitionError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            AcquisitionError::NoTranscript => StatusCode::UNPROCESSABLE_ENTITY,
            AcquisitionError::VideoUnavailable => StatusCode::NOT_FOUND,
            AcquisitionError::ToolExecutionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AcquisitionError::MalformedMetadata(_)
            | AcquisitionError::CaptionDownload(_)
            | AcquisitionError::CaptionDecode(_) => StatusCode::BAD_GATEWAY,
        },
        PipelineError::Persistence(e) => port_status(e),
        PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn port_status(err: &PortError) -> StatusCode {
    match err {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn pipeline_failure(summary: &str, err: PipelineError) -> HandlerError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "{}", summary);
    } else {
        warn!(error = %err, "{}", summary);
    }
    (status, Json(ErrorResponse::new(summary, err.to_string())))
}

fn port_failure(summary: &str, err: PortError) -> HandlerError {
    error!(error = %err, "{}", summary);
    (
        port_status(&err),
        Json(ErrorResponse::new(summary, err.to_string())),
    )
}

fn bad_request(summary: &str, details: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(summary, details)),
    )
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Process a video through the full pipeline.
///
/// A url that was processed before returns the stored results without
/// re-running anything.
#[utoipa::path(
    post,
    path = "/api/source-content",
    request_body = CreateSourceContentRequest,
    responses(
        (status = 201, description = "Processed (possibly partially)", body = ProcessResultDto),
        (status = 400, description = "Unsupported type or invalid video url", body = ErrorResponse),
        (status = 404, description = "Video is private or unavailable", body = ErrorResponse),
        (status = 422, description = "Video has no English transcript", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 502, description = "Caption data could not be retrieved", body = ErrorResponse)
    )
)]
pub async fn create_source_content_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateSourceContentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    payload
        .source_type
        .parse::<SourceType>()
        .map_err(|e| bad_request("Invalid content type", e))?;
    let url = payload.url.trim();
    if url.is_empty() {
        return Err(bad_request("Invalid request", "url is required"));
    }

    info!(source_type = %payload.source_type, url, "Processing source content request");

    // Dropping this handler (client went away) drops the run; shutdown cancels it.
    let cancel = app_state.shutdown.child_token();
    let result = app_state
        .pipeline
        .process(url, &cancel)
        .await
        .map_err(|e| pipeline_failure("Failed to process source content", e))?;

    info!(source_id = %result.source.id, "Source content processed");
    Ok((StatusCode::CREATED, Json(ProcessResultDto::from(result))))
}

/// List all processed sources, newest first.
#[utoipa::path(
    get,
    path = "/api/source-content",
    responses(
        (status = 200, description = "All sources", body = SourceContentList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_source_contents_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let sources = app_state
        .repo
        .list_sources()
        .await
        .map_err(|e| port_failure("Failed to retrieve source contents", e))?;

    let source_contents: Vec<SourceContentDto> = sources.into_iter().map(Into::into).collect();
    Ok(Json(SourceContentList {
        count: source_contents.len(),
        source_contents,
    }))
}

/// Fetch a source together with its concepts, quizzes, and generated content.
#[utoipa::path(
    get,
    path = "/api/source-content/{id}",
    params(("id" = Uuid, Path, description = "Source content id")),
    responses(
        (status = 200, description = "Source with related data", body = ProcessResultDto),
        (status = 404, description = "Source content not found", body = ErrorResponse)
    )
)]
pub async fn get_source_content_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let result = app_state
        .pipeline
        .get_with_related(id)
        .await
        .map_err(|e| pipeline_failure("Source content not found", e))?;
    Ok(Json(ProcessResultDto::from(result)))
}

/// Concepts extracted from a source.
#[utoipa::path(
    get,
    path = "/api/source-content/{id}/concepts",
    params(("id" = Uuid, Path, description = "Source content id")),
    responses(
        (status = 200, description = "Concepts of the source", body = ConceptList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_concepts_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let concepts = app_state
        .repo
        .find_concepts_by_source(id)
        .await
        .map_err(|e| port_failure("Failed to retrieve concepts", e))?;

    let concepts: Vec<ConceptDto> = concepts.into_iter().map(Into::into).collect();
    Ok(Json(ConceptList {
        count: concepts.len(),
        concepts,
    }))
}

/// Quiz questions for every concept of a source.
#[utoipa::path(
    get,
    path = "/api/source-content/{id}/quizzes",
    params(("id" = Uuid, Path, description = "Source content id")),
    responses(
        (status = 200, description = "Quiz questions of the source", body = QuizList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_quizzes_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let quizzes = app_state
        .repo
        .find_quizzes_by_source(id)
        .await
        .map_err(|e| port_failure("Failed to retrieve quizzes", e))?;

    let quizzes: Vec<QuizQuestionDto> = quizzes.into_iter().map(Into::into).collect();
    Ok(Json(QuizList {
        count: quizzes.len(),
        quizzes,
    }))
}

/// Platform content generated from any of a source's concepts.
#[utoipa::path(
    get,
    path = "/api/source-content/{id}/content",
    params(("id" = Uuid, Path, description = "Source content id")),
    responses(
        (status = 200, description = "Generated content of the source", body = GeneratedContentList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_generated_content_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let concepts = app_state
        .repo
        .find_concepts_by_source(id)
        .await
        .map_err(|e| port_failure("Failed to retrieve generated content", e))?;

    let items = if concepts.is_empty() {
        Vec::new()
    } else {
        let ids: Vec<Uuid> = concepts.iter().map(|c| c.id).collect();
        app_state
            .repo
            .find_content_by_concept_ids(&ids)
            .await
            .map_err(|e| port_failure("Failed to retrieve generated content", e))?
    };

    let generated_content: Vec<GeneratedContentDto> = items.into_iter().map(Into::into).collect();
    Ok(Json(GeneratedContentList {
        count: generated_content.len(),
        generated_content,
    }))
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Lattice API is running".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_errors_map_to_client_statuses() {
        let cases = [
            (AcquisitionError::InvalidReference("x".into()), StatusCode::BAD_REQUEST),
            (AcquisitionError::NoTranscript, StatusCode::UNPROCESSABLE_ENTITY),
            (AcquisitionError::VideoUnavailable, StatusCode::NOT_FOUND),
            (
                AcquisitionError::ToolExecutionFailed("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AcquisitionError::CaptionDownload("503".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&PipelineError::Acquisition(err)), expected);
        }
    }

    #[test]
    fn persistence_and_cancellation_statuses() {
        assert_eq!(
            status_for(&PipelineError::Persistence(PortError::NotFound("id".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&PipelineError::Persistence(PortError::Unexpected("db".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(&PipelineError::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
    }
}
