use crate::engine::AnalysisEngine;
use crate::error::{AnalysisError, ErrorKind};
use crate::normalize::{PixelArray, UploadedImage};
use crate::pipeline::AnalysisOutcome;
use crate::surface::{Notice, Surface};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartError, rejection::JsonRejection,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Name of the multipart field carrying the image file.
pub const UPLOAD_FIELD: &str = "image";

const INDEX_HTML: &str = include_str!("page.html");

/// Body of every analysis response.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub state: &'static str,
    pub markdown: String,
    pub notices: Vec<Notice>,
    pub error: Option<ErrorKind>,
}

/// Pixel-array upload: `data` holds `height * width * channels` samples.
#[derive(Debug, Deserialize)]
pub struct PixelUpload {
    pub height: u32,
    pub width: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

fn status_code(error: Option<ErrorKind>) -> StatusCode {
    match error {
        None => StatusCode::OK,
        Some(ErrorKind::MissingInput | ErrorKind::InvalidFormat) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::IncompleteResponse | ErrorKind::TransportFailure) => {
            StatusCode::BAD_GATEWAY
        }
        Some(ErrorKind::IoFailure) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn render(surface: &Surface, error: Option<ErrorKind>) -> Response {
    let status = if error.is_none() { "success" } else { "error" };
    let body = AnalyzeResponse {
        status,
        state: surface.state().as_str(),
        markdown: surface.output().to_string(),
        notices: surface.notices().to_vec(),
        error,
    };
    (status_code(error), Json(body)).into_response()
}

/// Presses the analyze button on a surface and waits for the engine.
async fn run_surface(engine: &AnalysisEngine, mut surface: Surface) -> Response {
    let Some(image) = surface.click() else {
        log::debug!("Analyze requested without an image");
        return render(&surface, Some(ErrorKind::MissingInput));
    };

    match engine.analyze(Some(image)).await {
        Ok(response) => {
            let error = response.outcome.error;
            surface.display(response.outcome);
            render(&surface, error)
        }
        Err(e) => {
            log::error!("Engine unavailable: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, MultipartError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field.bytes().await?;
        if !bytes.is_empty() {
            upload = Some(bytes.to_vec());
        }
    }
    Ok(upload)
}

async fn post_analyze(
    State(engine): State<Arc<AnalysisEngine>>,
    mut multipart: Multipart,
) -> Response {
    let mut surface = Surface::new();
    match read_upload(&mut multipart).await {
        Ok(Some(bytes)) => surface.select(UploadedImage::Encoded(bytes)),
        Ok(None) => {}
        Err(e) => {
            log::warn!("Malformed upload: {}", e.body_text());
            return (
                e.status(),
                Json(json!({ "status": "error", "message": e.body_text() })),
            )
                .into_response();
        }
    }
    run_surface(&engine, surface).await
}

/// Shows an upload that was refused before it reached the engine.
fn reject(err: AnalysisError) -> Response {
    log::warn!("Rejected pixel upload: {err}");
    let mut surface = Surface::new();
    surface.display(AnalysisOutcome::from_error(&err, Vec::new()));
    render(&surface, Some(err.kind()))
}

async fn post_analyze_pixels(
    State(engine): State<Arc<AnalysisEngine>>,
    payload: Result<Json<PixelUpload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return reject(AnalysisError::InvalidFormat(rejection.body_text())),
    };
    let pixels = match PixelArray::new(payload.height, payload.width, payload.channels, payload.data)
    {
        Ok(pixels) => pixels,
        Err(err) => return reject(err),
    };

    let mut surface = Surface::new();
    surface.select(UploadedImage::Pixels(pixels));
    run_surface(&engine, surface).await
}

async fn get_status(State(engine): State<Arc<AnalysisEngine>>) -> impl IntoResponse {
    Json(json!({ "status": engine.state().as_str() }))
}

async fn get_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Builds the application router around a running engine.
pub fn router(engine: Arc<AnalysisEngine>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/analyze", post(post_analyze))
        .route("/analyze/pixels", post(post_analyze_pixels))
        .route("/status", get(get_status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(engine)
}

/// Serves `app` on `addr` until Ctrl+C.
pub async fn serve(addr: &str, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    log::info!("🚀 Starting the server");
    log::info!("🔥 Listening on: http://{}", listener.local_addr()?);
    log::info!("🔧 Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {e}");
            }
        })
        .await
}
