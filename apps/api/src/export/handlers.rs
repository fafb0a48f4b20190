//! Axum route handlers for downloads and read-aloud playback.
//!
//! Every handler reads a finished track result; a track without one answers 409.

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::errors::AppError;
use crate::export::pdf::{render_pdf, PDF_MIME};
use crate::export::speech::{
    build_speech_request, player_html, SpeechRate, SpeechRequest, VoiceInfo,
};
use crate::feedback::session::{FeedbackResult, Track};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SpeechParams {
    pub rate: Option<f32>,
    #[serde(default)]
    pub voices: Vec<VoiceInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerQuery {
    pub rate: Option<f32>,
}

/// GET /api/v1/feedback/pdf
pub async fn handle_feedback_pdf(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    pdf_download(&state, Track::Document).await
}

/// GET /api/v1/interview/pdf
pub async fn handle_interview_pdf(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    pdf_download(&state, Track::Interview).await
}

/// POST /api/v1/feedback/speech
pub async fn handle_feedback_speech(
    State(state): State<AppState>,
    Json(params): Json<SpeechParams>,
) -> Result<Json<SpeechRequest>, AppError> {
    speech_request(&state, Track::Document, params).await.map(Json)
}

/// POST /api/v1/interview/speech
pub async fn handle_interview_speech(
    State(state): State<AppState>,
    Json(params): Json<SpeechParams>,
) -> Result<Json<SpeechRequest>, AppError> {
    speech_request(&state, Track::Interview, params).await.map(Json)
}

/// GET /api/v1/feedback/player?rate=
pub async fn handle_feedback_player(
    State(state): State<AppState>,
    Query(query): Query<PlayerQuery>,
) -> Result<Html<String>, AppError> {
    player(&state, Track::Document, query).await
}

/// GET /api/v1/interview/player?rate=
pub async fn handle_interview_player(
    State(state): State<AppState>,
    Query(query): Query<PlayerQuery>,
) -> Result<Html<String>, AppError> {
    player(&state, Track::Interview, query).await
}

// ────────────────────────────────────────────────────────────────────────────
// Shared plumbing
// ────────────────────────────────────────────────────────────────────────────

/// Clones the track's current result so the session lock is not held while rendering.
async fn finished_result(state: &AppState, track: Track) -> Result<FeedbackResult, AppError> {
    state
        .session
        .lock()
        .await
        .result(track)
        .cloned()
        .ok_or_else(|| {
            AppError::FailedPrecondition(format!("No {} has been generated yet", track.title()))
        })
}

async fn pdf_download(state: &AppState, track: Track) -> Result<impl IntoResponse, AppError> {
    let result = finished_result(state, track).await?;
    let bytes = render_pdf(&result.text);
    let disposition = format!("attachment; filename=\"{}\"", track.file_name());

    Ok((
        [
            (header::CONTENT_TYPE, PDF_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(bytes),
    ))
}

async fn speech_request(
    state: &AppState,
    track: Track,
    params: SpeechParams,
) -> Result<SpeechRequest, AppError> {
    let result = finished_result(state, track).await?;
    let rate = params.rate.map(SpeechRate::new).unwrap_or_default();
    debug!(
        "Speech request: track={:?}, language={}, rate={}",
        track,
        result.language,
        rate.value()
    );
    Ok(build_speech_request(
        &result.text,
        &result.language,
        result.locale,
        rate,
        &params.voices,
    ))
}

async fn player(state: &AppState, track: Track, query: PlayerQuery) -> Result<Html<String>, AppError> {
    let request = speech_request(
        state,
        track,
        SpeechParams {
            rate: query.rate,
            voices: Vec::new(),
        },
    )
    .await?;
    Ok(Html(player_html(&request, track.title())))
}
