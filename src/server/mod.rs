use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use burn::backend::{Autodiff, NdArray};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::predictor::TbPredictor;
use crate::{CLASS_NAMES, IMG_SIZE};

/// CPU backend for serving; autodiff so the Grad-CAM path stays available.
pub type ServeBackend = Autodiff<NdArray>;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Whether the service answers with real or placeholder weights.
/// Surfaced through `/` and `/model/info` so callers can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Ready,
    Degraded,
}

impl ModelStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelStatus::Ready => "ready",
            ModelStatus::Degraded => "degraded",
        }
    }
}

pub struct AppState {
    pub predictor: TbPredictor<ServeBackend>,
    pub status: ModelStatus,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/model/info", get(model_info))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Fetch the weight file from `url` if it is not already on disk.
/// Attempted once; a non-success status is an error.
pub async fn ensure_weights(path: &Path, url: &str) -> anyhow::Result<()> {
    if path.is_file() {
        return Ok(());
    }

    log::info!("weight file {} missing, downloading from {url}", path.display());
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    tokio::fs::write(path, &bytes).await?;

    log::info!("downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Acquire and load the model, falling back to an untrained predictor in a
/// visible `Degraded` state when anything in the sequence fails.
pub async fn build_state(weights_path: &Path, model_url: &str) -> Arc<AppState> {
    let device = Default::default();

    let loaded = async {
        ensure_weights(weights_path, model_url).await?;
        let predictor = TbPredictor::from_file(weights_path, &device)?;
        anyhow::Ok(predictor)
    }
    .await;

    match loaded {
        Ok(predictor) => {
            log::info!("model loaded from {}", weights_path.display());
            Arc::new(AppState {
                predictor,
                status: ModelStatus::Ready,
            })
        }
        Err(e) => {
            log::warn!("model unavailable ({e}), serving degraded with untrained weights");
            Arc::new(AppState {
                predictor: TbPredictor::untrained(&device),
                status: ModelStatus::Degraded,
            })
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": detail.into() })))
}

async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "TB Detection API is running",
        "status": "healthy",
        "model_status": state.status.as_str(),
    }))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        // Content type gate comes before touching the payload or the model.
        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(api_error(StatusCode::BAD_REQUEST, "File must be an image"));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file uploaded"));
    };

    match state.predictor.predict(&data) {
        Ok(prediction) => Ok(Json(json!({
            "result": prediction.label.as_str(),
            "confidence": prediction.confidence,
            "filename": filename,
        }))),
        Err(e) if e.is_client_error() => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            log::error!("prediction error: {e}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Prediction failed: {e}"),
            ))
        }
    }
}

async fn model_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "input_size": [IMG_SIZE, IMG_SIZE],
        "classes": CLASS_NAMES,
        "model_loaded": state.status == ModelStatus::Ready,
        "model_status": state.status.as_str(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(status: ModelStatus) -> Router {
        let state = Arc::new(AppState {
            predictor: TbPredictor::untrained(&Default::default()),
            status,
        });
        router(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const BOUNDARY: &str = "test-boundary";

    fn multipart_request(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png_upload() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(224, 224, image::Rgb([128, 128, 128]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn root_reports_healthy_and_model_status() {
        let app = test_app(ModelStatus::Degraded);
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["model_status"], "degraded");
    }

    #[tokio::test]
    async fn model_info_reports_input_size_and_classes() {
        let app = test_app(ModelStatus::Ready);
        let response = app
            .oneshot(Request::get("/model/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["input_size"], json!([224, 224]));
        assert_eq!(json["classes"], json!(["Normal", "Tuberculosis"]));
        assert_eq!(json["model_loaded"], json!(true));
        assert_eq!(json["model_status"], "ready");
    }

    #[tokio::test]
    async fn model_info_flags_fallback_model() {
        let app = test_app(ModelStatus::Degraded);
        let response = app
            .oneshot(Request::get("/model/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["input_size"], json!([224, 224]));
        assert_eq!(json["model_loaded"], json!(false));
        assert_eq!(json["model_status"], "degraded");
    }

    #[tokio::test]
    async fn non_image_content_type_is_rejected() {
        let app = test_app(ModelStatus::Ready);
        let response = app
            .oneshot(multipart_request("notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "File must be an image");
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = test_app(ModelStatus::Ready);
        let body = format!("--{BOUNDARY}--\r\n");
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "No file uploaded");
    }

    #[tokio::test]
    async fn undecodable_image_bytes_are_a_client_error() {
        let app = test_app(ModelStatus::Ready);
        let response = app
            .oneshot(multipart_request("fake.png", "image/png", b"not a png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gray_image_upload_predicts_some_label() {
        let app = test_app(ModelStatus::Ready);
        let response = app
            .oneshot(multipart_request("xray.png", "image/png", &png_upload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["filename"], "xray.png");
        let result = json["result"].as_str().unwrap();
        assert!(result == "Normal" || result == "Tuberculosis");
        let confidence = json["confidence"].as_f64().unwrap();
        assert!((0.5..=1.0).contains(&confidence));
    }
}
