use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;

use crate::error::ApiError;
use crate::server::AppState;

pub(crate) const DEFAULT_IMAGE_QUESTION: &str = "Describe the image";

#[derive(Debug, serde::Deserialize)]
pub(crate) struct TextQuery {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct TextAnswer {
    pub answer: String,
    pub context: String,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ImageAnswer {
    pub answer: String,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct HealthResponse {
    pub status: &'static str,
    pub time: f64,
}

pub(crate) async fn query_text(
    State(state): State<AppState>,
    payload: Result<Json<TextQuery>, JsonRejection>,
) -> Result<Json<TextAnswer>, ApiError> {
    let query = payload
        .ok()
        .and_then(|Json(body)| body.query)
        .filter(|q| !q.trim().is_empty())
        .ok_or(ApiError::Validation("query is required"))?;

    let context = state.engine.retrieve(&query).await?;
    tracing::debug!("text query, {} bytes of context", context.len());

    let answer = state.generation.generate_text(&context, &query).await?;
    Ok(Json(TextAnswer {
        answer: answer.text,
        context,
    }))
}

pub(crate) async fn query_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageAnswer>, ApiError> {
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::Validation("image file required"));
    };

    let mut image = None;
    let mut question = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "image" => image = Some(field.bytes().await.map_err(multipart_error)?),
            "question" => question = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let image = image.ok_or(ApiError::Validation("image file required"))?;
    let question = question
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_QUESTION.to_owned());
    tracing::debug!("image query, {} bytes", image.len());

    let answer = state
        .generation
        .generate_from_image(&image, &question)
        .await?;
    Ok(Json(ImageAnswer {
        answer: answer.text,
    }))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        tracing::debug!("malformed multipart body: {e}");
        ApiError::Validation("image file required")
    }
}

pub(crate) async fn health() -> Json<HealthResponse> {
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64());
    Json(HealthResponse { status: "ok", time })
}
