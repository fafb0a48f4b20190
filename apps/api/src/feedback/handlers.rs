//! Axum route handlers for the feedback pipeline.

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{DocumentKind, UploadedDocument};
use crate::feedback::session::{FeedbackResult, SessionSnapshot};
use crate::language::{LanguageCode, LocaleTag};
use crate::state::AppState;

/// Characters of extracted text echoed back after an upload.
const PREVIEW_CHARS: usize = 300;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub kind: DocumentKind,
    pub char_count: usize,
    pub preview: String,
    pub extraction_degraded: bool,
    pub pages_total: Option<usize>,
    pub pages_failed: usize,
    pub language: LanguageCode,
    pub language_confidence: f64,
    pub language_degraded: bool,
    pub locale: LocaleTag,
}

#[derive(Debug, Deserialize)]
pub struct InterviewRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResultResponse {
    pub session_id: Uuid,
    pub text: String,
    pub language: LanguageCode,
    pub locale: LocaleTag,
    pub generated_at: DateTime<Utc>,
}

impl TrackResultResponse {
    fn new(session_id: Uuid, result: &FeedbackResult) -> Self {
        Self {
            session_id,
            text: result.text.clone(),
            language: result.language.clone(),
            locale: result.locale,
            generated_at: result.generated_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/document
///
/// Multipart upload with a `file` part (PDF or plain text). Replaces the session's
/// document and returns the extracted text summary and detected language.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = read_file_part(&mut multipart).await?;

    let mut session = state.session.lock().await;
    let session_id = session.id();
    let snapshot = session.upload(upload);

    Ok(Json(UploadResponse {
        session_id,
        kind: snapshot.kind,
        char_count: snapshot.extraction.text.chars().count(),
        preview: snapshot.extraction.text.chars().take(PREVIEW_CHARS).collect(),
        extraction_degraded: snapshot.extraction.degraded,
        pages_total: snapshot.extraction.pages_total,
        pages_failed: snapshot.extraction.pages_failed,
        language: snapshot.language.code.clone(),
        language_confidence: snapshot.language.confidence,
        language_degraded: snapshot.language.degraded,
        locale: snapshot.locale,
    }))
}

/// POST /api/v1/document/analyze
///
/// Sends the analysis prompt for the current document and stores the feedback.
pub async fn handle_analyze(
    State(state): State<AppState>,
) -> Result<Json<TrackResultResponse>, AppError> {
    let mut session = state.session.lock().await;
    let session_id = session.id();
    let result = session.analyze(state.llm.as_ref()).await?;
    Ok(Json(TrackResultResponse::new(session_id, result)))
}

/// POST /api/v1/interview
///
/// Generates interview questions and key vocabulary for a pasted job description.
/// Requires a completed document analysis.
pub async fn handle_interview(
    State(state): State<AppState>,
    Json(request): Json<InterviewRequest>,
) -> Result<Json<TrackResultResponse>, AppError> {
    let mut session = state.session.lock().await;
    let session_id = session.id();
    let result = session
        .generate_interview(&request.job_description, state.llm.as_ref())
        .await?;
    Ok(Json(TrackResultResponse::new(session_id, result)))
}

/// GET /api/v1/session
pub async fn handle_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().await.snapshot())
}

/// POST /api/v1/session/reset
pub async fn handle_reset(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let mut session = state.session.lock().await;
    session.reset();
    Json(session.snapshot())
}

/// Pulls the `file` part out of a multipart body and resolves its kind.
async fn read_file_part(multipart: &mut Multipart) -> Result<UploadedDocument, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let kind = DocumentKind::detect(field.content_type(), field.file_name()).ok_or_else(
            || {
                AppError::UnsupportedMediaType(format!(
                    "Only PDF or plain-text uploads are accepted (got {})",
                    field.content_type().unwrap_or("no content type")
                ))
            },
        )?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file bytes: {e}")))?;

        return Ok(UploadedDocument {
            kind,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::Validation(
        "Multipart form must include a 'file' part".to_string(),
    ))
}
