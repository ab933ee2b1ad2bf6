//! Flujos de importación: desde un bucket de GCS, subida de fichero local y
//! extracción de una fuente ya registrada.
//!
//! Cada flujo informa de su avance en el `Notifier` y publica la nueva
//! versión de la lista de ficheros en el `FileStore`. Los errores se
//! convierten en estado del aviso aquí mismo; el `Err` devuelto sólo sirve
//! para registrarlo.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    auth::{AuthError, Authorizer, GCS_READ_ONLY_SCOPE},
    backend::{ExtractRequest, ScanRequest, ScanTarget, SourceBackend, UploadRequest},
    file_store::FileStore,
    models::{FileDefaults, ImportResultItem, Origin},
    notifier::{Notifier, Severity},
    reconcile::{apply_status, mark_status, reconcile},
};

const GENERIC_FAILURE: &str = "Se produjo un error. Comprueba la conexión con tu instancia";
const AUTH_FALLBACK: &str = "Se produjo un error. Inicia sesión con tu cuenta de Google";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Authorization(AuthError),
    #[error("{0}")]
    Dismissed(String),
    #[error("{0}")]
    Rejected(String),
    #[error("fallo inesperado: {0}")]
    Unexpected(#[from] anyhow::Error),
}

/// Mensaje del servidor para una respuesta `Failed`: `message` si trae
/// texto, si no `error`, y en último caso el aviso genérico.
fn server_message(message: Option<String>, error: Option<String>) -> String {
    let non_empty = |m: &String| !m.trim().is_empty();
    message
        .filter(non_empty)
        .or_else(|| error.filter(non_empty))
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

impl From<AuthError> for ImportError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Dismissed(message) => ImportError::Dismissed(message),
            other => ImportError::Authorization(other),
        }
    }
}

impl ImportError {
    pub fn severity(&self) -> Severity {
        match self {
            ImportError::Dismissed(_) => Severity::Warning,
            _ => Severity::Danger,
        }
    }

    /// Texto que ve el usuario.
    pub fn user_message(&self) -> String {
        match self {
            ImportError::Validation(msg) | ImportError::Dismissed(msg) | ImportError::Rejected(msg) => {
                msg.clone()
            }
            ImportError::Authorization(AuthError::Denied { description: Some(d) }) => d.clone(),
            ImportError::Authorization(_) => AUTH_FALLBACK.to_string(),
            ImportError::Unexpected(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Parámetros del formulario de importación desde GCS.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcsImportRequest {
    pub project_id: String,
    pub bucket: String,
    #[serde(default)]
    pub folder: Option<String>,
}

impl GcsImportRequest {
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.bucket.trim().is_empty() || self.project_id.trim().is_empty() {
            return Err(ImportError::Validation(
                "Indica el ID del proyecto y el nombre del bucket".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fuentes remotas que no necesitan autorización de Google.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteImportRequest {
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
        #[serde(default)]
        max_sources: Option<u32>,
    },
}

impl RemoteImportRequest {
    pub fn validate(&self) -> Result<(), ImportError> {
        let missing = match self {
            RemoteImportRequest::S3Bucket { url, access_key, secret_key } => {
                url.trim().is_empty() || access_key.trim().is_empty() || secret_key.trim().is_empty()
            }
            RemoteImportRequest::Url { url } => url.trim().is_empty(),
            RemoteImportRequest::Wikipedia { query, .. } => query.trim().is_empty(),
        };
        if missing {
            return Err(ImportError::Validation("Completa todos los campos obligatorios".to_string()));
        }
        Ok(())
    }

    fn into_target(self) -> ScanTarget {
        match self {
            RemoteImportRequest::S3Bucket { url, access_key, secret_key } => ScanTarget::S3Bucket {
                url: url.trim().to_string(),
                access_key,
                secret_key,
            },
            RemoteImportRequest::Url { url } => ScanTarget::Url { url: url.trim().to_string() },
            RemoteImportRequest::Wikipedia { query, max_sources } => ScanTarget::Wikipedia {
                query: query.trim().to_string(),
                max_sources,
            },
        }
    }
}

/// Resultado de una importación correcta.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub success_count: u64,
    pub files: Vec<String>,
}

/// Colaboradores que necesita un flujo de importación.
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
    pub backend: &'a dyn SourceBackend,
    pub authorizer: &'a dyn Authorizer,
    pub files: &'a FileStore,
    pub notifier: &'a Notifier,
}

impl<'a> ImportContext<'a> {
    /// Importa los ficheros de un bucket de GCS.
    pub async fn import_gcs(&self, request: &GcsImportRequest) -> Result<ImportOutcome, ImportError> {
        let result = self.run_gcs(request).await;
        self.report(result, |outcome| {
            format!("Se han creado nodos fuente para {} ficheros", outcome.success_count)
        })
    }

    /// Importa desde S3, una URL o Wikipedia.
    pub async fn import_remote(&self, request: RemoteImportRequest) -> Result<ImportOutcome, ImportError> {
        let result = self.run_remote(request).await;
        self.report(result, |outcome| {
            format!("Se han creado nodos fuente para {} ficheros", outcome.success_count)
        })
    }

    /// Sube un fichero local y lo registra como fuente nueva.
    pub async fn upload_local_file(&self, path: PathBuf) -> Result<ImportOutcome, ImportError> {
        let result = self.run_upload(path).await;
        self.report(result, |outcome| format!("Fichero subido: {}", outcome.files.join(", ")))
    }

    /// Lanza el procesamiento de una fuente ya registrada y fusiona su estado.
    pub async fn extract_source(&self, name: &str) -> Result<ImportOutcome, ImportError> {
        let result = self.run_extract(name).await;
        if let Err(err) = &result {
            let message = err.user_message();
            self.files
                .update(|files| mark_status(files, name, "Failed", Some(message.clone())));
        }
        self.report(result, |outcome| format!("Procesamiento completado: {}", outcome.files.join(", ")))
    }

    async fn run_gcs(&self, request: &GcsImportRequest) -> Result<ImportOutcome, ImportError> {
        request.validate()?;
        self.notifier.begin("Cargando...");

        let access_token = self.authorizer.authorize(GCS_READ_ONLY_SCOPE).await?;

        self.scan_and_reconcile(ScanTarget::GcsBucket {
            project_id: request.project_id.trim().to_string(),
            bucket: request.bucket.trim().to_string(),
            folder: request.folder.clone().filter(|f| !f.trim().is_empty()),
            access_token,
        })
        .await
    }

    async fn run_remote(&self, request: RemoteImportRequest) -> Result<ImportOutcome, ImportError> {
        request.validate()?;
        self.notifier.begin("Cargando...");
        self.scan_and_reconcile(request.into_target()).await
    }

    /// Llamada de importación y fusión del resultado en la lista compartida.
    async fn scan_and_reconcile(&self, target: ScanTarget) -> Result<ImportOutcome, ImportError> {
        let model = self.files.model();
        let defaults = FileDefaults::new(&model, target.source_type());
        let response = self
            .backend
            .scan_sources(&ScanRequest { model, target })
            .await?;
        if response.is_failed() {
            return Err(ImportError::Rejected(server_message(response.message, response.error)));
        }

        self.files
            .update(|files| reconcile(files, &response.file_name, &defaults));

        Ok(ImportOutcome {
            success_count: response.success_count.unwrap_or(0),
            files: response.file_name.iter().map(|f| f.name.clone()).collect(),
        })
    }

    async fn run_upload(&self, path: PathBuf) -> Result<ImportOutcome, ImportError> {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| ImportError::Validation("Selecciona un fichero válido".to_string()))?;
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ImportError::Validation(format!("No se puede leer {}: {e}", path.display())))?
            .len();

        self.notifier.begin(format!("Subiendo {name}..."));
        let model = self.files.model();
        let response = self
            .backend
            .upload(&UploadRequest { path, model: model.clone() })
            .await?;
        if response.status == "Failed" {
            return Err(ImportError::Rejected(server_message(response.message, response.error)));
        }

        let item = ImportResultItem {
            name: name.clone(),
            size: Some(size),
            ..Default::default()
        };
        let defaults = FileDefaults::new(&model, Origin::LocalFile.source_tag());
        self.files.update(|files| reconcile(files, &[item], &defaults));

        Ok(ImportOutcome { success_count: 1, files: vec![name] })
    }

    async fn run_extract(&self, name: &str) -> Result<ImportOutcome, ImportError> {
        let record = self
            .files
            .find(name)
            .ok_or_else(|| ImportError::Validation(format!("No existe la fuente '{name}'")))?;

        self.notifier.begin(format!("Procesando {name}..."));
        self.files
            .update(|files| mark_status(files, name, "Processing", None));

        let model = self.files.model();
        let request = match &record.origin {
            Origin::LocalFile => ExtractRequest::Uploaded { file_name: name.to_string(), model },
            Origin::GcsBucket { project_id, bucket, folder } => ExtractRequest::GcsBucket {
                file_name: name.to_string(),
                model,
                project_id: project_id.clone(),
                bucket: bucket.clone(),
                folder: folder.clone(),
                access_token: self.authorizer.authorize(GCS_READ_ONLY_SCOPE).await?,
            },
            Origin::S3Bucket { url } | Origin::Web { url } => ExtractRequest::Remote {
                file_name: name.to_string(),
                model,
                source_url: url.clone(),
                source_type: record.source.clone(),
                aws_access_key_id: None,
                aws_secret_access_key: None,
                wiki_query: None,
                max_sources: None,
            },
            Origin::Wikipedia { query } => ExtractRequest::Remote {
                file_name: name.to_string(),
                model,
                source_url: format!("https://en.wikipedia.org/wiki/{}", query.replace(' ', "_")),
                source_type: record.source.clone(),
                aws_access_key_id: None,
                aws_secret_access_key: None,
                wiki_query: Some(query.clone()),
                max_sources: None,
            },
        };

        let response = self.backend.extract(&request).await?;
        match response.data {
            Some(update) if response.status != "Failed" => {
                self.files.update(|files| apply_status(files, &update));
                Ok(ImportOutcome { success_count: 1, files: vec![update.name] })
            }
            _ => Err(ImportError::Rejected(server_message(response.message, response.error))),
        }
    }

    /// Traduce el resultado del flujo en el estado del aviso.
    fn report<F>(
        &self,
        result: Result<ImportOutcome, ImportError>,
        success_message: F,
    ) -> Result<ImportOutcome, ImportError>
    where
        F: FnOnce(&ImportOutcome) -> String,
    {
        match &result {
            Ok(outcome) => {
                info!("Importación completada: {} ficheros", outcome.success_count);
                self.notifier.succeed(success_message(outcome));
            }
            Err(err) => {
                match err {
                    ImportError::Unexpected(e) => error!("Fallo inesperado en la importación: {e:#}"),
                    other => warn!("Importación fallida: {other}"),
                }
                match err.severity() {
                    Severity::Warning => self.notifier.warn(err.user_message()),
                    _ => self.notifier.fail(err.user_message()),
                }
            }
        }
        result
    }
}
