use std::path::PathBuf;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::spawn;
use tracing::{error, info, warn};

use crate::{
    app_state::AppState,
    chat_info::{group_entities, ChatInfoMessage, RetrievalInfo},
    import::{GcsImportRequest, RemoteImportRequest},
    models::FileRecord,
    neo4j_client,
    notifier::Notification,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct ModelPayload {
    model: String,
}

#[derive(Deserialize)]
pub struct UploadPayload {
    path: String,
}

#[derive(Deserialize)]
pub struct ExtractPayload {
    file_name: String,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/files", get(list_files_handler))
        .route("/api/files/refresh", post(refresh_files_handler))
        .route("/api/model", post(select_model_handler))
        .route("/api/import/gcs", post(gcs_import_handler))
        .route("/api/import/remote", post(remote_import_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/extract", post(extract_handler))
        .route("/api/status", get(status_handler))
        .route("/api/status/dismiss", post(dismiss_status_handler))
        .route("/api/retrieval-info", post(retrieval_info_handler))
        .route("/api/neo4j-info", get(neo4j_info_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

// --- Handlers ---

#[axum::debug_handler]
async fn list_files_handler(State(state): State<AppState>) -> Json<Vec<FileRecord>> {
    Json(state.files.snapshot().as_ref().clone())
}

#[axum::debug_handler]
async fn refresh_files_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let files = neo4j_client::list_sources(&state.graph).await.map_err(|e| {
        error!("Error leyendo las fuentes de Neo4j: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("No se pudieron leer las fuentes: {e}"))
    })?;
    state.files.publish(files.clone());
    Ok(Json(files))
}

#[axum::debug_handler]
async fn select_model_handler(
    State(state): State<AppState>,
    Json(payload): Json<ModelPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.model.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "El modelo no puede estar vacío."));
    }
    state.files.set_model(payload.model.trim());
    Ok((StatusCode::OK, Json(json!({ "model": state.files.model() }))))
}

#[axum::debug_handler]
async fn gcs_import_handler(
    State(state): State<AppState>,
    Json(payload): Json<GcsImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(err) = payload.validate() {
        state.notifier.fail(err.user_message());
        return Err(api_error(StatusCode::BAD_REQUEST, err.user_message()));
    }

    spawn(async move {
        if let Err(err) = state.import_context().import_gcs(&payload).await {
            warn!("Importación desde gs://{} terminada con error: {}", payload.bucket, err);
        }
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn remote_import_handler(
    State(state): State<AppState>,
    Json(payload): Json<RemoteImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(err) = payload.validate() {
        state.notifier.fail(err.user_message());
        return Err(api_error(StatusCode::BAD_REQUEST, err.user_message()));
    }

    spawn(async move {
        if let Err(err) = state.import_context().import_remote(payload).await {
            warn!("Importación remota terminada con error: {}", err);
        }
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    Json(payload): Json<UploadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let path = PathBuf::from(&payload.path);
    if !path.is_file() {
        return Err(api_error(StatusCode::BAD_REQUEST, "La ruta proporcionada no es un fichero válido."));
    }

    state
        .import_context()
        .upload_local_file(path)
        .await
        .map(|outcome| (StatusCode::OK, Json(json!({ "files": outcome.files }))))
        .map_err(|err| api_error(StatusCode::BAD_GATEWAY, err.user_message()))
}

#[axum::debug_handler]
async fn extract_handler(
    State(state): State<AppState>,
    Json(payload): Json<ExtractPayload>,
) -> Result<Json<FileRecord>, ApiError> {
    let ctx = state.import_context();
    ctx.extract_source(&payload.file_name)
        .await
        .map_err(|err| api_error(StatusCode::BAD_GATEWAY, err.user_message()))?;

    state
        .files
        .find(&payload.file_name)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "La fuente ya no existe."))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Notification> {
    Json(state.notifier.current())
}

#[axum::debug_handler]
async fn dismiss_status_handler(State(state): State<AppState>) -> StatusCode {
    state.notifier.reset();
    StatusCode::OK
}

#[axum::debug_handler]
async fn retrieval_info_handler(
    State(state): State<AppState>,
    Json(message): Json<ChatInfoMessage>,
) -> Result<Json<RetrievalInfo>, ApiError> {
    let entities = if message.chunk_ids.is_empty() {
        Vec::new()
    } else {
        state
            .backend
            .chunk_entities(&message.chunk_ids)
            .await
            .map_err(|e| {
                error!("Error obteniendo entidades de los chunks: {}", e);
                api_error(StatusCode::BAD_GATEWAY, "No se pudieron obtener las entidades.")
            })?
            .nodes
    };

    let grouped = {
        let mut palette = state.palette.lock().unwrap();
        group_entities(&entities, &mut palette)
    };

    Ok(Json(RetrievalInfo {
        summary: message.summary(),
        sources: message.source_links(),
        entities: grouped,
    }))
}

#[axum::debug_handler]
async fn neo4j_info_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let browser_url = neo4j_client::browser_url(&state.config.neo4j_uri);

    match neo4j_client::check_connection(&state.graph).await {
        Ok(()) => Ok(Json(json!({ "status": "ok", "browser_url": browser_url }))),
        Err(e) => {
            error!("Error en el health check de Neo4j: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    state.notifier.reset();
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
