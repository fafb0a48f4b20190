//! Feedback session: the two-track pipeline from uploaded bytes to finished feedback.
//!
//! # Tracks
//! - Document track: upload → extract + detect → analyze → feedback text.
//! - Interview track: job description → detect → interview preparation text.
//!   Gated on the document track having produced feedback at least once.
//!
//! # Rules
//! - Re-running an action replaces the track's result; there is no history.
//! - Presence flags are set on first success and never cleared by a later failure.
//!   Only `reset` clears them.
//! - Completion failures are returned to the caller unchanged. Nothing retries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extraction::{extract_text, DocumentKind, Extraction, UploadedDocument};
use crate::feedback::prompts::{build_analysis_prompt, build_interview_prompt};
use crate::language::{detect_language, resolve_locale, Detection, LanguageCode, LocaleTag};
use crate::llm_client::{CompletionRequest, CompletionService, LlmError};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// The two independent pipelines of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Document,
    Interview,
}

impl Track {
    /// Fixed download name for the track's PDF.
    pub fn file_name(&self) -> &'static str {
        match self {
            Track::Document => "cv_feedback.pdf",
            Track::Interview => "interview_questions.pdf",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Track::Document => "CV feedback",
            Track::Interview => "Interview preparation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    #[default]
    Empty,
    /// Input text and its language are known.
    Extracted,
    /// A completion call is in flight.
    Requested,
    Completed,
    Failed,
}

/// The uploaded document after extraction and detection.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSnapshot {
    pub kind: DocumentKind,
    pub extraction: Extraction,
    pub language: Detection,
    pub locale: LocaleTag,
    pub uploaded_at: DateTime<Utc>,
}

/// A finished completion for one track. Immutable once stored.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResult {
    pub text: String,
    /// Language the result should be spoken in.
    pub language: LanguageCode,
    pub locale: LocaleTag,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No document has been uploaded")]
    NoDocument,

    #[error("The document must be analyzed before generating interview questions")]
    AnalysisRequired,

    #[error("Job description cannot be empty")]
    EmptyJobDescription,

    #[error("Completion failed: {0}")]
    Completion(#[from] LlmError),
}

/// Serializable view of a track for status responses.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub state: TrackState,
    /// Presence flag: true once the track has produced a result.
    pub produced: bool,
    pub language: Option<LanguageCode>,
    pub locale: Option<LocaleTag>,
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub document: Option<DocumentSnapshot>,
    pub job_language: Option<Detection>,
    pub document_track: TrackSummary,
    pub interview_track: TrackSummary,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// Session-scoped context passed to every pipeline stage.
#[derive(Debug)]
pub struct FeedbackSession {
    id: Uuid,
    document: Option<DocumentSnapshot>,
    document_state: TrackState,
    feedback: Option<FeedbackResult>,
    feedback_given: bool,
    job_detection: Option<Detection>,
    interview_state: TrackState,
    job_feedback: Option<FeedbackResult>,
    job_feedback_given: bool,
}

impl Default for FeedbackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            document: None,
            document_state: TrackState::Empty,
            feedback: None,
            feedback_given: false,
            job_detection: None,
            interview_state: TrackState::Empty,
            job_feedback: None,
            job_feedback_given: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document(&self) -> Option<&DocumentSnapshot> {
        self.document.as_ref()
    }

    pub fn state(&self, track: Track) -> TrackState {
        match track {
            Track::Document => self.document_state,
            Track::Interview => self.interview_state,
        }
    }

    /// Presence flag for a track.
    pub fn produced(&self, track: Track) -> bool {
        match track {
            Track::Document => self.feedback_given,
            Track::Interview => self.job_feedback_given,
        }
    }

    /// Current result for a track, if it has produced one.
    pub fn result(&self, track: Track) -> Option<&FeedbackResult> {
        match track {
            Track::Document => self.feedback.as_ref(),
            Track::Interview => self.job_feedback.as_ref(),
        }
    }

    /// Replaces the uploaded document and eagerly extracts text and language.
    ///
    /// Earlier feedback is kept, so the interview track stays available.
    pub fn upload(&mut self, upload: UploadedDocument) -> &DocumentSnapshot {
        let extraction = extract_text(&upload);
        let language = detect_language(&extraction.text);
        let locale = resolve_locale(&language.code);

        info!(
            "Document uploaded: kind={:?}, chars={}, language={}, degraded={}",
            upload.kind,
            extraction.text.chars().count(),
            language.code,
            language.degraded
        );

        self.document_state = TrackState::Extracted;
        &*self.document.insert(DocumentSnapshot {
            kind: upload.kind,
            extraction,
            language,
            locale,
            uploaded_at: Utc::now(),
        })
    }

    /// Requests document feedback and stores it as the current result.
    pub async fn analyze(
        &mut self,
        llm: &dyn CompletionService,
    ) -> Result<&FeedbackResult, SessionError> {
        let document = self.document().ok_or(SessionError::NoDocument)?;
        let language = document.language.code.clone();
        let locale = document.locale;
        let prompt = build_analysis_prompt(&document.extraction.text, &language);

        let in_flight = InFlight::start(&mut self.document_state);
        let completion = match llm.complete(&CompletionRequest::analysis(prompt)).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Document analysis failed: {e}");
                in_flight.finish(TrackState::Failed);
                return Err(e.into());
            }
        };
        in_flight.finish(TrackState::Completed);

        info!("Document feedback stored ({} chars)", completion.text.len());
        self.feedback_given = true;
        Ok(&*self.feedback.insert(FeedbackResult {
            text: completion.text,
            language,
            locale,
            generated_at: Utc::now(),
        }))
    }

    /// Detects the job description's language and requests interview preparation.
    pub async fn generate_interview(
        &mut self,
        job_description: &str,
        llm: &dyn CompletionService,
    ) -> Result<&FeedbackResult, SessionError> {
        if !self.feedback_given {
            return Err(SessionError::AnalysisRequired);
        }
        let document = self.document().ok_or(SessionError::NoDocument)?;
        if job_description.trim().is_empty() {
            return Err(SessionError::EmptyJobDescription);
        }

        let prompt = build_interview_prompt(job_description, &document.extraction.text);
        let detection = detect_language(job_description);
        let language = detection.code.clone();
        let locale = resolve_locale(&language);
        info!(
            "Job description language={}, degraded={}",
            language, detection.degraded
        );

        let in_flight = InFlight::start(&mut self.interview_state);
        let completion = match llm.complete(&CompletionRequest::interview(prompt)).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Interview preparation failed: {e}");
                in_flight.finish(TrackState::Failed);
                return Err(e.into());
            }
        };
        in_flight.finish(TrackState::Completed);

        info!("Interview preparation stored ({} chars)", completion.text.len());
        self.job_detection = Some(detection);
        self.job_feedback_given = true;
        Ok(&*self.job_feedback.insert(FeedbackResult {
            text: completion.text,
            language,
            locale,
            generated_at: Utc::now(),
        }))
    }

    /// Drops everything and starts a fresh session with a new id.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            document: self.document.clone(),
            job_language: self.job_detection.clone(),
            document_track: self.summary(Track::Document),
            interview_track: self.summary(Track::Interview),
        }
    }

    fn summary(&self, track: Track) -> TrackSummary {
        let result = self.result(track);
        TrackSummary {
            state: self.state(track),
            produced: self.produced(track),
            language: result.map(|r| r.language.clone()),
            locale: result.map(|r| r.locale),
            generated_at: result.map(|r| r.generated_at),
        }
    }
}

/// Holds a track in `Requested` for the duration of a completion call.
///
/// If the call's future is dropped before `finish`, the track returns to the state
/// it had before the call.
struct InFlight<'a> {
    state: &'a mut TrackState,
    previous: TrackState,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a mut TrackState) -> Self {
        let previous = std::mem::replace(state, TrackState::Requested);
        Self {
            state,
            previous,
            finished: false,
        }
    }

    fn finish(mut self, outcome: TrackState) {
        *self.state = outcome;
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state = self.previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::speech::{build_speech_request, SpeechRate};
    use crate::testing::{ScriptedCompletion, StalledCompletion};
    use std::time::Duration;

    const ENGLISH_CV: &str = "Hello, I am a driver with 5 years experience.";
    const FRENCH_CV: &str = "Bonjour, je suis chauffeur depuis cinq ans. J'aime beaucoup \
        conduire et je cherche un nouveau travail dans une entreprise de transport.";
    const SPANISH_JOB: &str = "Buscamos una persona responsable para trabajar en nuestro \
        almacén. Es necesario tener experiencia con clientes y hablar bien el español.";

    fn text(content: &str) -> UploadedDocument {
        UploadedDocument {
            kind: DocumentKind::Text,
            bytes: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = FeedbackSession::new();
        assert_eq!(session.state(Track::Document), TrackState::Empty);
        assert_eq!(session.state(Track::Interview), TrackState::Empty);
        assert!(!session.produced(Track::Document));
        assert!(session.document().is_none());
    }

    #[test]
    fn test_upload_extracts_and_detects_eagerly() {
        let mut session = FeedbackSession::new();
        let snapshot = session.upload(text(ENGLISH_CV));
        assert_eq!(snapshot.extraction.text, ENGLISH_CV);
        assert_eq!(snapshot.language.code.as_str(), "en");
        assert_eq!(snapshot.locale.as_str(), "en-US");
        assert_eq!(session.state(Track::Document), TrackState::Extracted);
    }

    #[tokio::test]
    async fn test_analyze_without_upload_is_rejected() {
        let llm = ScriptedCompletion::new().reply("unused");
        let mut session = FeedbackSession::new();
        let err = session.analyze(&llm).await.unwrap_err();
        assert!(matches!(err, SessionError::NoDocument));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_english_analysis_end_to_end() {
        let llm = ScriptedCompletion::new().reply("1. Clear layout.");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));

        let result = session.analyze(&llm).await.unwrap();
        assert_eq!(result.text, "1. Clear layout.");
        assert_eq!(result.language.as_str(), "en");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, 800);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(request.prompt.contains(ENGLISH_CV));
        assert!(request.prompt.contains("Give 3 simple positive points"));
        assert!(request.prompt.contains("Give 3 things to improve"));
        assert!(request.prompt.contains("Suggest 5 concrete improvements"));
        assert!(request.prompt.contains("same language as the CV: en"));

        assert_eq!(session.state(Track::Document), TrackState::Completed);
        assert!(session.produced(Track::Document));
    }

    #[tokio::test]
    async fn test_reanalysis_overwrites_and_failure_keeps_flag() {
        let llm = ScriptedCompletion::new()
            .reply("first")
            .reply("second")
            .fail(429, "rate limited");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));

        session.analyze(&llm).await.unwrap();
        session.analyze(&llm).await.unwrap();
        assert_eq!(session.result(Track::Document).unwrap().text, "second");

        let err = session.analyze(&llm).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Completion(LlmError::Api { status: 429, .. })
        ));
        assert_eq!(session.state(Track::Document), TrackState::Failed);
        assert!(session.produced(Track::Document));
        assert_eq!(session.result(Track::Document).unwrap().text, "second");
    }

    #[tokio::test]
    async fn test_first_failure_leaves_flag_unset() {
        let llm = ScriptedCompletion::new().fail(401, "Incorrect API key provided");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));

        assert!(session.analyze(&llm).await.is_err());
        assert!(!session.produced(Track::Document));
        assert!(session.result(Track::Document).is_none());
    }

    #[tokio::test]
    async fn test_french_document_speaks_french() {
        let llm = ScriptedCompletion::new().reply("Votre CV est clair.\nBravo !");
        let mut session = FeedbackSession::new();
        session.upload(text(FRENCH_CV));
        assert_eq!(session.document().unwrap().language.code.as_str(), "fr");
        assert_eq!(session.document().unwrap().locale.as_str(), "fr-FR");

        let result = session.analyze(&llm).await.unwrap().clone();
        let speech = build_speech_request(
            &result.text,
            &result.language,
            result.locale,
            SpeechRate::default(),
            &[],
        );
        assert_eq!(speech.lang, "fr-FR");
        assert_eq!(speech.text, "Votre CV est clair. Bravo !");
    }

    #[tokio::test]
    async fn test_interview_requires_completed_analysis() {
        let llm = ScriptedCompletion::new().reply("unused");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));

        let err = session.generate_interview(SPANISH_JOB, &llm).await.unwrap_err();
        assert!(matches!(err, SessionError::AnalysisRequired));
        assert!(llm.requests().is_empty());
        assert_eq!(session.state(Track::Interview), TrackState::Empty);
    }

    #[tokio::test]
    async fn test_interview_rejects_blank_job_description() {
        let llm = ScriptedCompletion::new().reply("feedback");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();

        let err = session.generate_interview("  \n ", &llm).await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyJobDescription));
    }

    #[tokio::test]
    async fn test_spanish_job_language_is_independent() {
        let llm = ScriptedCompletion::new()
            .reply("Good CV.")
            .reply("1. ¿Por qué quiere este trabajo?");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();

        let result = session.generate_interview(SPANISH_JOB, &llm).await.unwrap();
        assert_eq!(result.language.as_str(), "es");
        assert_eq!(result.locale.as_str(), "es-ES");

        assert_eq!(session.document().unwrap().language.code.as_str(), "en");
        assert_eq!(
            session.result(Track::Document).unwrap().language.as_str(),
            "en"
        );
        assert!(session.produced(Track::Interview));
        assert_eq!(session.state(Track::Interview), TrackState::Completed);

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].max_tokens, 1000);
        assert!(requests[1].prompt.contains(SPANISH_JOB));
        assert!(requests[1].prompt.contains(ENGLISH_CV));
    }

    #[tokio::test]
    async fn test_interview_failure_propagates() {
        let llm = ScriptedCompletion::new()
            .reply("Good CV.")
            .fail(500, "server error");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();

        let err = session.generate_interview(SPANISH_JOB, &llm).await.unwrap_err();
        assert!(matches!(err, SessionError::Completion(_)));
        assert_eq!(session.state(Track::Interview), TrackState::Failed);
        assert!(!session.produced(Track::Interview));
        // No result was stored, so no job language is reported either.
        assert!(session.snapshot().job_language.is_none());
    }

    #[tokio::test]
    async fn test_failed_interview_rerun_keeps_previous_job_language() {
        let llm = ScriptedCompletion::new()
            .reply("Good CV.")
            .reply("1. ¿Por qué quiere trabajar aquí?")
            .fail(503, "overloaded");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();
        session.generate_interview(SPANISH_JOB, &llm).await.unwrap();

        let err = session.generate_interview(ENGLISH_CV, &llm).await.unwrap_err();
        assert!(matches!(err, SessionError::Completion(_)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.job_language.unwrap().code.as_str(), "es");
        assert_eq!(
            snapshot.interview_track.language.unwrap().as_str(),
            "es"
        );
        assert_eq!(snapshot.interview_track.state, TrackState::Failed);
        assert!(snapshot.interview_track.produced);
    }

    #[tokio::test]
    async fn test_cancelled_analysis_restores_track_state() {
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), session.analyze(&StalledCompletion))
                .await;
        assert!(outcome.is_err());
        assert_eq!(session.state(Track::Document), TrackState::Extracted);
        assert!(!session.produced(Track::Document));
    }

    #[tokio::test]
    async fn test_cancelled_interview_restores_track_state() {
        let llm = ScriptedCompletion::new().reply("Good CV.");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            session.generate_interview(SPANISH_JOB, &StalledCompletion),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(session.state(Track::Interview), TrackState::Empty);
        assert!(session.snapshot().job_language.is_none());
    }

    #[tokio::test]
    async fn test_new_upload_keeps_previous_feedback() {
        let llm = ScriptedCompletion::new().reply("Good CV.");
        let mut session = FeedbackSession::new();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();

        session.upload(text(FRENCH_CV));
        assert_eq!(session.state(Track::Document), TrackState::Extracted);
        assert!(session.produced(Track::Document));
        assert_eq!(session.result(Track::Document).unwrap().text, "Good CV.");
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let llm = ScriptedCompletion::new().reply("Good CV.");
        let mut session = FeedbackSession::new();
        let old_id = session.id();
        session.upload(text(ENGLISH_CV));
        session.analyze(&llm).await.unwrap();

        session.reset();
        assert_ne!(session.id(), old_id);
        assert!(session.document().is_none());
        assert!(!session.produced(Track::Document));
        assert_eq!(session.state(Track::Document), TrackState::Empty);
    }

    #[test]
    fn test_snapshot_serializes_states() {
        let mut session = FeedbackSession::new();
        session.upload(text(""));
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["document_track"]["state"], "extracted");
        assert_eq!(json["document_track"]["produced"], false);
        assert_eq!(json["interview_track"]["state"], "empty");
        assert_eq!(json["document"]["language"]["code"], "fr");
        assert_eq!(json["document"]["language"]["degraded"], true);
        assert_eq!(json["document"]["kind"], "text");
    }

    #[test]
    fn test_track_file_names() {
        assert_eq!(Track::Document.file_name(), "cv_feedback.pdf");
        assert_eq!(Track::Interview.file_name(), "interview_questions.pdf");
    }
}
