//! HTTP route handlers.

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::error::{Error, StoreError};
use crate::fingerprint::{fingerprint_pipeline, Fingerprint};
use crate::matcher::Matcher;

#[derive(Clone)]
pub struct AppState {
    pub matcher: Matcher,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Fingerprint(#[from] Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("fingerprint worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // an oversized upload surfaces here as 413
            ApiError::Multipart(error) => error.status(),
            ApiError::Fingerprint(Error::Decode(_) | Error::TooShort { .. }) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Fingerprint(Error::Store(_)) | ApiError::Store(_) | ApiError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoredResponse {
    pub song_name: String,
    pub hashes: usize,
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub song_name: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub song_name: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct SongsResponse {
    pub songs: Vec<String>,
}

#[derive(Debug, Default)]
struct Upload {
    name: Option<String>,
    file: Option<Bytes>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Fingerprint the uploaded `file` and store it under `name`.
///
/// The name comes from the multipart form, falling back to `?name=`.
pub async fn fingerprint(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
    multipart: Multipart,
) -> Result<Json<StoredResponse>, ApiError> {
    let upload = read_upload(multipart).await?;

    let song_name = required_name(
        upload
            .name
            .filter(|name| !name.trim().is_empty())
            .or(query.name),
    )?;
    let audio = required_audio(upload.file)?;

    let fingerprint = fingerprint_blocking(audio).await?;
    let hashes = state.matcher.store_fingerprint(&song_name, &fingerprint).await?;

    Ok(Json(StoredResponse { song_name, hashes }))
}

pub async fn recognize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let audio = required_audio(upload.file)?;

    let fingerprint = fingerprint_blocking(audio).await?;
    let found = state.matcher.find_match(&fingerprint).await?;

    Ok(Json(recognize_response(found.song_name, found.similarity)))
}

pub async fn delete_song(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let song_name = required_name(Some(name))?;
    state.matcher.delete_song(&song_name).await?;

    Ok(Json(DeletedResponse {
        song_name,
        deleted: true,
    }))
}

pub async fn list_songs(State(state): State<AppState>) -> Result<Json<SongsResponse>, ApiError> {
    let songs = state.matcher.list_songs().await?;
    Ok(Json(SongsResponse { songs }))
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => upload.file = Some(field.bytes().await?),
            Some("name") => upload.name = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(upload)
}

fn required_name(name: Option<String>) -> Result<String, ApiError> {
    match name {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(ApiError::BadRequest("song name is required".into())),
    }
}

fn required_audio(file: Option<Bytes>) -> Result<Bytes, ApiError> {
    match file {
        None => Err(ApiError::BadRequest("file is required".into())),
        Some(bytes) if bytes.is_empty() => Err(ApiError::BadRequest("empty file".into())),
        Some(bytes) => Ok(bytes),
    }
}

/// Decoding and transforms are CPU-bound, so they run off the async workers.
async fn fingerprint_blocking(audio: Bytes) -> Result<Fingerprint, ApiError> {
    let size = audio.len();
    let fingerprint = tokio::task::spawn_blocking(move || fingerprint_pipeline(&audio)).await??;

    info!(bytes = size, hashes = fingerprint.len(), "fingerprinted upload");
    Ok(fingerprint)
}

fn recognize_response(song_name: String, similarity: f64) -> RecognizeResponse {
    if song_name.is_empty() {
        return RecognizeResponse {
            song_name,
            confidence: 0.0,
            message: Some("no match found"),
        };
    }

    RecognizeResponse {
        song_name,
        confidence: similarity,
        message: None,
    }
}
