//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChatMessageRequest, ContactsResponse, ErrorResponse, MicrophoneRequest, QueuedResponse,
    RecordingRequest, RecordingResponse, SelectContactRequest, SessionResponse, UserRequest,
};
use super::AppState;
use crate::runtime::{MessageTransport, RuntimeError, SessionEvent};
use crate::state_machine::{AudioClip, Event};
use crate::transport::{OutgoingMessage, TransportError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Presence and contacts
        .route("/api/users/join", post(join_user))
        .route("/api/users/leave", post(leave_user))
        .route("/api/contacts", get(list_contacts))
        // Typed chat
        .route("/api/messages", post(send_chat_message))
        // Voice sessions
        .route("/api/sessions/:username", get(get_session))
        .route("/api/sessions/:username/stream", get(stream_session))
        .route("/api/sessions/:username/recordings", post(submit_recording))
        .route("/api/sessions/:username/contact", post(select_contact))
        .route("/api/sessions/:username/send", post(request_send))
        .route("/api/sessions/:username/reset", post(reset_session))
        .route(
            "/api/sessions/:username/microphone",
            post(report_microphone),
        )
        // Version
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Presence and Contacts
// ============================================================

async fn join_user(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> Result<Json<ContactsResponse>, AppError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }

    let contacts = state.runtime.hub().join(username).await;
    Ok(Json(ContactsResponse { contacts }))
}

async fn leave_user(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> Result<Json<ContactsResponse>, AppError> {
    let username = req.username.trim();
    state.runtime.end_session(username).await;
    let contacts = state.runtime.hub().leave(username).await;
    Ok(Json(ContactsResponse { contacts }))
}

async fn list_contacts(State(state): State<AppState>) -> Json<ContactsResponse> {
    Json(ContactsResponse {
        contacts: state.runtime.hub().contacts().names(),
    })
}

async fn send_chat_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<OutgoingMessage>, AppError> {
    let message = OutgoingMessage::new(req.sender, req.receiver, req.content, false);
    state.runtime.hub().deliver(&message).await?;
    Ok(Json(message))
}

// ============================================================
// Voice Sessions
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = state.runtime.snapshot(&username).await?;
    Ok(Json(SessionResponse::from(snapshot)))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before the snapshot so no update falls in between
    let session_rx = state.runtime.subscribe(&username).await?;
    let inbox_rx = state
        .runtime
        .hub()
        .subscribe(&username)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Unknown user: {username}")))?;

    let init_event = SessionEvent::Init {
        state: state.runtime.snapshot(&username).await?,
        contacts: state.runtime.hub().contacts().names(),
    };

    Ok(sse_stream(init_event, session_rx, inbox_rx))
}

async fn submit_recording(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<RecordingRequest>,
) -> Result<Json<RecordingResponse>, AppError> {
    let data = BASE64
        .decode(req.audio.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid audio encoding: {e}")))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("No audio received".to_string()));
    }

    let turn_id = uuid::Uuid::new_v4().to_string();
    tracing::debug!(
        username = %username,
        turn_id = %turn_id,
        bytes = data.len(),
        mime_type = %req.mime_type,
        "Recording received"
    );

    let event = Event::RecordingSubmitted {
        turn_id: turn_id.clone(),
        audio: AudioClip::new(data, req.mime_type),
        voice: req.voice,
    };
    state.runtime.send_event(&username, event).await?;

    Ok(Json(RecordingResponse {
        turn_id,
        queued: true,
    }))
}

async fn select_contact(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<SelectContactRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    let name = req.name.trim();
    if !state.runtime.hub().contacts().contains(name) {
        return Err(AppError::NotFound(format!(
            "Contact '{name}' not found in your contacts"
        )));
    }

    let event = Event::ContactSelected {
        name: name.to_string(),
    };
    state.runtime.send_event(&username, event).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn request_send(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    state
        .runtime
        .send_event(&username, Event::SendRequested)
        .await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    state.runtime.send_event(&username, Event::Reset).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn report_microphone(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<MicrophoneRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    let event = Event::MicrophoneUnavailable { reason: req.reason };
    state.runtime.send_event(&username, event).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("voice-courier ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::UnknownUser(_) => AppError::NotFound(e.to_string()),
            RuntimeError::SessionClosed(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::EmptyMessage => AppError::BadRequest(e.to_string()),
            TransportError::UnknownReceiver(_) | TransportError::UnknownSender(_) => {
                AppError::NotFound(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
