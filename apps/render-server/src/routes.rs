//! HTTP routes.

use axum::body::{Body, Bytes};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use nevis_render_engine::RenderRequest;

use crate::error::ApiError;
use crate::state::AppState;

/// Download name of every rendered file.
pub const OUTPUT_FILENAME: &str = "ne_visualizer.mp4";

pub fn app_router(state: AppState) -> Router {
    let upload_limit = state.config().server.max_upload_bytes;

    Router::new()
        .route("/api/render", post(render_video))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    engine: String,
    engine_available: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = state.pipeline().clone();
    let engine = pipeline.invoker().name().to_string();
    let engine_available = tokio::task::spawn_blocking(move || pipeline.invoker().is_available())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        engine,
        engine_available,
    })
}

/// Form fields of a render upload. Unknown parts are skipped.
#[derive(Debug, Default)]
struct RenderForm {
    video: Option<Bytes>,
    settings: Option<String>,
}

/// Body-limit overruns become 413; any other multipart failure is a bad body.
fn body_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %e, "Upload exceeds size limit");
        ApiError::TooLarge
    } else {
        tracing::warn!(error = %e, "Malformed multipart body");
        ApiError::InvalidBody
    }
}

async fn read_form(multipart: &mut Multipart) -> Result<RenderForm, ApiError> {
    let mut form = RenderForm::default();

    while let Some(field) = multipart.next_field().await.map_err(body_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            // Only a file part counts as the upload.
            Some("video") if field.file_name().is_some() => {
                form.video = Some(field.bytes().await.map_err(body_error)?);
            }
            Some("settings") => {
                let text = field.text().await.map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        return body_error(e);
                    }
                    tracing::warn!(error = %e, "Failed to read settings part");
                    ApiError::InvalidSettings
                })?;
                form.settings = Some(text);
            }
            other => tracing::debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    Ok(form)
}

async fn render_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!(error = %e, "Rejected non-multipart render request");
        ApiError::InvalidBody
    })?;

    let form = read_form(&mut multipart).await?;
    let Some(video) = form.video else {
        return Err(ApiError::NoVideo);
    };

    tracing::info!(
        upload_bytes = video.len(),
        has_settings = form.settings.is_some(),
        "Render requested"
    );

    // The engine call blocks; it runs to completion even if the client goes away.
    let pipeline = state.pipeline().clone();
    let request = RenderRequest {
        video,
        settings: form.settings,
    };
    let rendered = tokio::task::spawn_blocking(move || pipeline.render(request))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Render task panicked");
            ApiError::Internal
        })??;

    let body = Body::from_stream(ReaderStream::new(tokio::fs::File::from_std(rendered.file)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{OUTPUT_FILENAME}\""),
        )
        .header(header::CONTENT_LENGTH, rendered.len)
        .body(body)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build render response");
            ApiError::Internal
        })
}
