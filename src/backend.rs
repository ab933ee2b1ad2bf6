//! Cliente del backend del generador de grafos.
//!
//! Todas las peticiones se envían como formulario e incluyen las credenciales
//! de Neo4j, igual que hace el frontend web.

use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    auth::AccessToken,
    config::AppConfig,
    models::{FileStatusUpdate, ImportResponse},
};

/// Credenciales de la instancia Neo4j que procesa el backend.
#[derive(Clone, Debug)]
pub struct UserCredentials {
    pub uri: String,
    pub user_name: String,
    pub password: String,
    pub database: String,
}

impl UserCredentials {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            uri: cfg.neo4j_uri.clone(),
            user_name: cfg.neo4j_user.clone(),
            password: cfg.neo4j_password.clone(),
            database: cfg.neo4j_database.clone(),
        }
    }

    fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("uri", self.uri.clone()),
            ("userName", self.user_name.clone()),
            ("password", self.password.clone()),
            ("database", self.database.clone()),
        ]
    }
}

/// Fuente remota que el backend debe escanear.
#[derive(Clone, Debug)]
pub enum ScanTarget {
    GcsBucket {
        project_id: String,
        bucket: String,
        folder: Option<String>,
        access_token: AccessToken,
    },
    S3Bucket {
        url: String,
        access_key: String,
        secret_key: String,
    },
    Url {
        url: String,
    },
    Wikipedia {
        query: String,
        max_sources: Option<u32>,
    },
}

impl ScanTarget {
    /// Valor de `source_type` (y de `fileSource`) para este tipo de fuente.
    pub fn source_type(&self) -> &'static str {
        match self {
            ScanTarget::GcsBucket { .. } => "gcs bucket",
            ScanTarget::S3Bucket { .. } => "s3 bucket",
            ScanTarget::Url { .. } => "youtube",
            ScanTarget::Wikipedia { .. } => "Wikipedia",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanRequest {
    pub model: String,
    pub target: ScanTarget,
}

impl ScanRequest {
    /// Campos de formulario específicos de `/url/scan`.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("model", self.model.clone()),
            ("source_type", self.target.source_type().to_string()),
        ];
        match &self.target {
            ScanTarget::GcsBucket { project_id, bucket, folder, access_token } => {
                fields.push(("gcs_project_id", project_id.clone()));
                fields.push(("gcs_bucket_name", bucket.clone()));
                fields.push(("gcs_bucket_folder", folder.clone().unwrap_or_default()));
                fields.push(("access_token", access_token.secret().to_string()));
            }
            ScanTarget::S3Bucket { url, access_key, secret_key } => {
                fields.push(("source_url", url.clone()));
                fields.push(("aws_access_key_id", access_key.clone()));
                fields.push(("aws_secret_access_key", secret_key.clone()));
            }
            ScanTarget::Url { url } => {
                fields.push(("source_url", url.clone()));
            }
            ScanTarget::Wikipedia { query, max_sources } => {
                fields.push(("wiki_query", query.clone()));
                if let Some(max) = max_sources {
                    fields.push(("max_sources", max.to_string()));
                }
            }
        }
        fields
    }
}

/// Petición de `/extract`: un fichero ya subido, un blob de GCS o una fuente remota.
#[derive(Clone, Debug)]
pub enum ExtractRequest {
    Uploaded {
        file_name: String,
        model: String,
    },
    /// El backend descarga el blob con un token de acceso recién obtenido.
    GcsBucket {
        file_name: String,
        model: String,
        project_id: String,
        bucket: String,
        folder: Option<String>,
        access_token: AccessToken,
    },
    Remote {
        file_name: String,
        model: String,
        source_url: String,
        source_type: String,
        aws_access_key_id: Option<String>,
        aws_secret_access_key: Option<String>,
        wiki_query: Option<String>,
        max_sources: Option<f64>,
    },
}

impl ExtractRequest {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            ExtractRequest::Uploaded { file_name, model } => vec![
                ("model", model.clone()),
                ("file_name", file_name.clone()),
                ("source_type", "local file".to_string()),
            ],
            ExtractRequest::GcsBucket { file_name, model, project_id, bucket, folder, access_token } => vec![
                ("model", model.clone()),
                ("file_name", file_name.clone()),
                ("source_type", "gcs bucket".to_string()),
                ("gcs_project_id", project_id.clone()),
                ("gcs_bucket_name", bucket.clone()),
                ("gcs_bucket_folder", folder.clone().unwrap_or_default()),
                ("gcs_blob_filename", file_name.clone()),
                ("access_token", access_token.secret().to_string()),
            ],
            ExtractRequest::Remote {
                file_name,
                model,
                source_url,
                source_type,
                aws_access_key_id,
                aws_secret_access_key,
                wiki_query,
                max_sources,
            } => {
                let mut fields = vec![
                    ("model", model.clone()),
                    ("file_name", file_name.clone()),
                    ("source_url", source_url.clone()),
                    ("source_type", source_type.clone()),
                ];
                if let Some(key) = aws_access_key_id {
                    fields.push(("aws_access_key_id", key.clone()));
                }
                if let Some(secret) = aws_secret_access_key {
                    fields.push(("aws_secret_access_key", secret.clone()));
                }
                if let Some(query) = wiki_query {
                    fields.push(("wiki_query", query.clone()));
                }
                // Sólo se envía si es un número real.
                if let Some(max) = max_sources.filter(|m| !m.is_nan()) {
                    fields.push(("max_sources", max.to_string()));
                }
                fields
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<FileStatusUpdate>,
}

/// Nodo de entidad tal y como lo devuelve `/chunk_entities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub element_id: String,
    pub labels: Vec<String>,
    pub properties: EntityProperties,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityProperties {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkEntities {
    #[serde(default)]
    pub nodes: Vec<EntityNode>,
    #[serde(default)]
    pub relationships: Vec<Value>,
}

#[derive(Deserialize)]
struct ChunkEntitiesResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ChunkEntities>,
}

#[async_trait]
pub trait SourceBackend: Send + Sync {
    async fn scan_sources(&self, request: &ScanRequest) -> Result<ImportResponse>;
    async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse>;
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse>;
    async fn chunk_entities(&self, chunk_ids: &[String]) -> Result<ChunkEntities>;
}

/// Implementación HTTP con `reqwest`.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    credentials: UserCredentials,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, credentials: UserCredentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("No se pudo crear el cliente HTTP del backend")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            credentials,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(cfg.backend_url.clone(), UserCredentials::from_config(cfg), cfg.backend_timeout)
    }

    fn form(&self, fields: Vec<(&'static str, String)>) -> Form {
        self.credentials
            .form_fields()
            .into_iter()
            .chain(fields)
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
    }

    async fn post_form<T>(&self, path: &str, form: Form) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Error llamando a {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("El backend respondió {} en {}: {}", status, url, body);
            return Err(anyhow!("El backend respondió {status} en {path}"));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Respuesta inválida de {url}"))
    }
}

#[async_trait]
impl SourceBackend for HttpBackend {
    async fn scan_sources(&self, request: &ScanRequest) -> Result<ImportResponse> {
        info!("Escaneando fuentes con el modelo '{}'", request.model);
        self.post_form("/url/scan", self.form(request.form_fields())).await
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse> {
        let bytes = tokio::fs::read(&request.path)
            .await
            .with_context(|| format!("No se pudo leer {}", request.path.display()))?;
        let file_name = request
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Ruta sin nombre de fichero: {}", request.path.display()))?;
        let mime = mime_guess::from_path(&request.path).first_or_octet_stream();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_ref())?;
        let form = self
            .form(vec![("model", request.model.clone())])
            .part("file", part);
        self.post_form("/sources", form).await
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse> {
        self.post_form("/extract", self.form(request.form_fields())).await
    }

    async fn chunk_entities(&self, chunk_ids: &[String]) -> Result<ChunkEntities> {
        let form = self.form(vec![("chunk_ids", chunk_ids.join(","))]);
        let response: ChunkEntitiesResponse = self.post_form("/chunk_entities", form).await?;
        if response.status == "Failed" {
            return Err(anyhow!(
                "El backend no devolvió entidades: {}",
                response.message.unwrap_or_default()
            ));
        }
        Ok(response.data.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn keys(fields: &[(&'static str, String)]) -> Vec<&'static str> {
        fields.iter().map(|(k, _)| *k).collect()
    }

    fn value<'a>(fields: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn gcs_scan_fields() {
        let request = ScanRequest {
            model: "OpenAI GPT 3.5".into(),
            target: ScanTarget::GcsBucket {
                project_id: "acme-dev".into(),
                bucket: "docs".into(),
                folder: None,
                access_token: AccessToken::new("ya29.abc"),
            },
        };
        let fields = request.form_fields();

        assert_eq!(value(&fields, "source_type"), Some("gcs bucket"));
        assert_eq!(value(&fields, "gcs_bucket_name"), Some("docs"));
        assert_eq!(value(&fields, "gcs_bucket_folder"), Some(""));
        assert_eq!(value(&fields, "gcs_project_id"), Some("acme-dev"));
        assert_eq!(value(&fields, "access_token"), Some("ya29.abc"));
        assert_eq!(value(&fields, "model"), Some("OpenAI GPT 3.5"));
    }

    #[test]
    fn wikipedia_scan_omits_missing_max_sources() {
        let request = ScanRequest {
            model: "Diffbot".into(),
            target: ScanTarget::Wikipedia { query: "Neo4j".into(), max_sources: None },
        };
        assert_eq!(keys(&request.form_fields()), vec!["model", "source_type", "wiki_query"]);
    }

    #[test]
    fn extract_drops_nan_max_sources() {
        let request = ExtractRequest::Remote {
            file_name: "Neo4j".into(),
            model: "Diffbot".into(),
            source_url: "https://en.wikipedia.org/wiki/Neo4j".into(),
            source_type: "Wikipedia".into(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            wiki_query: Some("Neo4j".into()),
            max_sources: Some(f64::NAN),
        };
        let fields = request.form_fields();
        assert!(value(&fields, "max_sources").is_none());
        assert_eq!(value(&fields, "wiki_query"), Some("Neo4j"));
    }

    #[test]
    fn extract_gcs_blob_fields() {
        let request = ExtractRequest::GcsBucket {
            file_name: "a.pdf".into(),
            model: "Diffbot".into(),
            project_id: "acme-dev".into(),
            bucket: "docs".into(),
            folder: Some("2024".into()),
            access_token: AccessToken::new("ya29.fresh"),
        };
        let fields = request.form_fields();

        assert_eq!(
            keys(&fields),
            vec![
                "model",
                "file_name",
                "source_type",
                "gcs_project_id",
                "gcs_bucket_name",
                "gcs_bucket_folder",
                "gcs_blob_filename",
                "access_token",
            ]
        );
        assert_eq!(value(&fields, "source_type"), Some("gcs bucket"));
        assert_eq!(value(&fields, "gcs_bucket_folder"), Some("2024"));
        assert_eq!(value(&fields, "gcs_blob_filename"), Some("a.pdf"));
        assert_eq!(value(&fields, "access_token"), Some("ya29.fresh"));
    }

    #[test]
    fn extract_uploaded_file_fields() {
        let request = ExtractRequest::Uploaded { file_name: "a.pdf".into(), model: "Diffbot".into() };
        assert_eq!(keys(&request.form_fields()), vec!["model", "file_name", "source_type"]);
    }

    #[test]
    fn parses_chunk_entities_payload() {
        let raw = r#"{
            "status": "Success",
            "data": {
                "nodes": [{"element_id": "4:1", "labels": ["Person"], "properties": {"id": "Ada"}}],
                "relationships": []
            }
        }"#;
        let parsed: ChunkEntitiesResponse = serde_json::from_str(raw).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data.nodes[0].labels, vec!["Person".to_string()]);
        assert_eq!(data.nodes[0].properties.id, "Ada");
    }

    #[test]
    fn parses_extract_status() {
        let raw = r#"{"status":"Success","data":{"fileName":"a.pdf","status":"Completed","processingTime":3.2,"nodeCount":4,"relationshipCount":6,"model":"Diffbot"}}"#;
        let parsed: ExtractResponse = serde_json::from_str(raw).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data.node_count, Some(4));
        assert_eq!(data.processing_time, Some(3.2));
    }

    // --- HttpBackend contra un servidor axum local ---

    fn credentials() -> UserCredentials {
        UserCredentials {
            uri: "neo4j://localhost:7687".into(),
            user_name: "neo4j".into(),
            password: "secret".into(),
            database: "neo4j".into(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn http_scan_sends_credentials_and_parses_response() {
        let received = Arc::new(Mutex::new(String::new()));
        let router = Router::new()
            .route(
                "/url/scan",
                post(|State(received): State<Arc<Mutex<String>>>, body: String| async move {
                    *received.lock().unwrap() = body;
                    Json(json!({
                        "status": "Success",
                        "success_count": 1,
                        "file_name": [{"fileName": "a.pdf", "fileSize": 10, "gcsBucketName": "docs"}]
                    }))
                }),
            )
            .with_state(received.clone());
        let base_url = serve(router).await;

        let backend = HttpBackend::new(base_url, credentials(), Duration::from_secs(5)).unwrap();
        let request = ScanRequest {
            model: "Diffbot".into(),
            target: ScanTarget::GcsBucket {
                project_id: "acme-dev".into(),
                bucket: "docs".into(),
                folder: None,
                access_token: AccessToken::new("ya29.abc"),
            },
        };
        let response = backend.scan_sources(&request).await.unwrap();

        assert_eq!(response.success_count, Some(1));
        assert_eq!(response.file_name[0].name, "a.pdf");
        let body = received.lock().unwrap().clone();
        for field in ["userName", "password", "database", "gcs_bucket_name", "access_token"] {
            assert!(body.contains(&format!("name=\"{field}\"")), "falta el campo {field}");
        }
    }

    #[tokio::test]
    async fn http_error_status_is_an_error() {
        let router = Router::new().route(
            "/extract",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base_url = serve(router).await;

        let backend = HttpBackend::new(base_url, credentials(), Duration::from_secs(5)).unwrap();
        let request = ExtractRequest::Uploaded { file_name: "a.pdf".into(), model: "Diffbot".into() };
        let err = backend.extract(&request).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn http_call_gives_up_after_timeout() {
        let router = Router::new().route(
            "/url/scan",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Json(json!({ "status": "Success" }))
            }),
        );
        let base_url = serve(router).await;

        let backend = HttpBackend::new(base_url, credentials(), Duration::from_millis(200)).unwrap();
        let request = ScanRequest {
            model: "Diffbot".into(),
            target: ScanTarget::Url { url: "https://youtu.be/abc".into() },
        };
        assert!(backend.scan_sources(&request).await.is_err());
    }
}
