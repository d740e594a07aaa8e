//! HTTP layer over the pipeline: analyze, check insurance, confirm.
//!
//! Caller-input validation lives here; by the time the pipeline runs, the
//! inputs are well-formed. Pipeline code is blocking (reqwest blocking
//! clients), so handlers run it on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::pipeline::coverage::{check_coverage, CoverageResult};
use crate::pipeline::extraction::{ExtractionPipeline, StructuredRecord};
use crate::pipeline::reasoning::analyze;
use crate::provider::Provider;
use crate::session::ReviewSession;
use crate::store::RecordStore;

/// Multipart limit: generous for scanned documents.
const MAX_UPLOAD_BYTES: usize = 55 * 1024 * 1024;

/// Provider/model used when the caller does not pick one.
const DEFAULT_PROVIDER: &str = "Ollama";
const DEFAULT_MODEL: &str = "glm-4.7-flash";

/// Placeholder policy text when the uploaded policy is not valid UTF-8.
const BINARY_POLICY_FALLBACK: &str = "Binary policy document - text content unavailable";

pub struct AppState {
    pub store: Arc<RecordStore>,
    pub config: AppConfig,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ConfirmResponse {
    status: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
}

fn internal_error(message: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze_document))
        .route("/check_insurance", post(check_insurance))
        .route("/confirm", post(confirm_record))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Pick a collision-free path under the upload directory, keeping the
/// client's base name for display but never trusting it as a path.
fn unique_upload_path(upload_dir: &Path, client_name: &str) -> PathBuf {
    let base = Path::new(client_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    upload_dir.join(format!("{}-{}", Uuid::new_v4(), base))
}

/// Decode policy bytes, falling back to a placeholder for binary content.
fn decode_policy_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => BINARY_POLICY_FALLBACK.to_string(),
    }
}

/// POST /analyze — upload a document, extract, compare against history.
async fn analyze_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ReviewSession>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut provider_name = DEFAULT_PROVIDER.to_string();
    let mut model = DEFAULT_MODEL.to_string();
    let mut api_key: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field
                    .file_name()
                    .unwrap_or("upload.bin")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;
                file = Some((name, bytes.to_vec()));
            }
            "provider" => {
                provider_name = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid provider field: {e}")))?;
            }
            "model" => {
                model = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid model field: {e}")))?;
            }
            "api_key" => {
                let key = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid api_key field: {e}")))?;
                if !key.is_empty() {
                    api_key = Some(key);
                }
            }
            _ => {}
        }
    }

    let (client_name, bytes) =
        file.ok_or_else(|| bad_request("missing 'file' field".to_string()))?;

    // Reject unknown providers at the boundary, before any work runs.
    let provider: Provider = provider_name
        .parse()
        .map_err(|e: crate::provider::ProviderError| bad_request(e.to_string()))?;

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| internal_error(format!("cannot create upload dir: {e}")))?;
    let document_path = unique_upload_path(&state.config.upload_dir, &client_name);
    tokio::fs::write(&document_path, &bytes)
        .await
        .map_err(|e| internal_error(format!("cannot store upload: {e}")))?;

    let store = state.store.clone();
    let config = state.config.clone();
    let pipeline_path = document_path.clone();

    let session = tokio::task::spawn_blocking(move || {
        let backend = provider.backend(&model, api_key.as_deref());
        let pipeline = ExtractionPipeline::production(&config.ollama_url, &config.ocr_model);

        let current = pipeline
            .run(&pipeline_path, backend.as_ref())
            .map_err(|e| internal_error(e.to_string()))?;

        let past = match current.mrn() {
            Some(mrn) => store
                .latest_for_mrn(mrn)
                .map_err(|e| internal_error(e.to_string()))?,
            None => None,
        };

        let analysis = analyze(backend.as_ref(), &current, past.as_ref());
        Ok::<_, ApiError>(ReviewSession::new(
            current,
            analysis,
            past.is_some(),
            pipeline_path,
        ))
    })
    .await
    .map_err(|e| internal_error(format!("pipeline task failed: {e}")))??;

    Ok(Json(session))
}

/// POST /check_insurance — eligibility of extracted data vs. a policy file.
async fn check_insurance(
    State(_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CoverageResult>, ApiError> {
    let mut policy_bytes: Option<Vec<u8>> = None;
    let mut medical_json: Option<String> = None;
    let mut provider_name = DEFAULT_PROVIDER.to_string();
    let mut model = DEFAULT_MODEL.to_string();
    let mut api_key: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "policy_file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read policy: {e}")))?;
                policy_bytes = Some(bytes.to_vec());
            }
            "medical_json" => {
                medical_json = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("invalid medical_json field: {e}")))?,
                );
            }
            "provider" => {
                provider_name = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid provider field: {e}")))?;
            }
            "model" => {
                model = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid model field: {e}")))?;
            }
            "api_key" => {
                let key = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid api_key field: {e}")))?;
                if !key.is_empty() {
                    api_key = Some(key);
                }
            }
            _ => {}
        }
    }

    let policy_bytes =
        policy_bytes.ok_or_else(|| bad_request("missing 'policy_file' field".to_string()))?;
    let medical_json =
        medical_json.ok_or_else(|| bad_request("missing 'medical_json' field".to_string()))?;

    // Malformed medical data never reaches the pipeline.
    let medical: StructuredRecord = serde_json::from_str(&medical_json)
        .map_err(|e| bad_request(format!("medical_json is not a valid record: {e}")))?;

    let provider: Provider = provider_name
        .parse()
        .map_err(|e: crate::provider::ProviderError| bad_request(e.to_string()))?;

    let policy_text = decode_policy_text(&policy_bytes);

    let result = tokio::task::spawn_blocking(move || {
        let backend = provider.backend(&model, api_key.as_deref());
        check_coverage(backend.as_ref(), &medical, &policy_text)
    })
    .await
    .map_err(|e| internal_error(format!("coverage task failed: {e}")))?;

    Ok(Json(result))
}

/// POST /confirm — persist a reviewed record verbatim.
///
/// The `Json` extractor rejects non-record payloads with a client error
/// before this body runs.
async fn confirm_record(
    State(state): State<Arc<AppState>>,
    Json(record): Json<StructuredRecord>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || store.save(&record))
        .await
        .map_err(|e| internal_error(format!("save task failed: {e}")))?
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ConfirmResponse { status: "saved" }))
}
