//! Modelos de dominio (registros de ficheros fuente y tipos del backend).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origen de un documento fuente, con los metadatos propios de cada tipo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    GcsBucket {
        project_id: String,
        bucket: String,
        folder: Option<String>,
    },
    S3Bucket {
        url: String,
    },
    Web {
        url: String,
    },
    Wikipedia {
        query: String,
    },
    LocalFile,
}

impl Origin {
    /// Etiqueta `fileSource` con la que el backend identifica el origen.
    pub fn source_tag(&self) -> &'static str {
        match self {
            Origin::GcsBucket { .. } => "gcs bucket",
            Origin::S3Bucket { .. } => "s3 bucket",
            Origin::Web { .. } => "youtube",
            Origin::Wikipedia { .. } => "Wikipedia",
            Origin::LocalFile => "local file",
        }
    }
}

/// Representación en cliente de un documento ingerido o en proceso.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub status: String,
    pub nodes_count: u64,
    pub relationship_count: u64,
    /// Segundos de procesamiento informados por el backend (0 mientras es nuevo).
    pub processing_progress: f64,
    pub model: String,
    pub source: String,
    pub file_type: String,
    pub origin: Origin,
    pub error_message: Option<String>,
}

/// Valores iniciales de los campos mutables de un [`FileRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileDefaults {
    pub status: String,
    pub nodes_count: u64,
    pub relationship_count: u64,
    pub processing_progress: f64,
    pub model: String,
    pub source: String,
    pub file_type: String,
}

impl FileDefaults {
    pub fn new(model: &str, source: &str) -> Self {
        Self {
            status: "New".to_string(),
            nodes_count: 0,
            relationship_count: 0,
            processing_progress: 0.0,
            model: model.to_string(),
            source: source.to_string(),
            file_type: "TEXT".to_string(),
        }
    }
}

/// Fichero devuelto por el backend tras una importación (`file_name[]`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportResultItem {
    #[serde(rename = "fileName")]
    pub name: String,
    #[serde(rename = "fileSize", default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "gcsBucketName", default)]
    pub gcs_bucket_name: Option<String>,
    #[serde(rename = "gcsBucketFolder", default)]
    pub gcs_bucket_folder: Option<String>,
    #[serde(rename = "gcsProjectId", default)]
    pub gcs_project_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ImportResultItem {
    /// Deduce el origen a partir de los metadatos presentes en la respuesta.
    pub fn origin(&self) -> Origin {
        if let Some(bucket) = self.gcs_bucket_name.as_deref().filter(|b| !b.is_empty()) {
            return Origin::GcsBucket {
                project_id: self.gcs_project_id.clone().unwrap_or_default(),
                bucket: bucket.to_string(),
                folder: self.gcs_bucket_folder.clone().filter(|f| !f.is_empty()),
            };
        }
        match self.url.as_deref() {
            Some(url) if url.starts_with("s3://") => Origin::S3Bucket { url: url.to_string() },
            Some(url) if url.contains("wikipedia.org") => Origin::Wikipedia { query: self.name.clone() },
            Some(url) if !url.is_empty() => Origin::Web { url: url.to_string() },
            _ => Origin::LocalFile,
        }
    }
}

/// Respuesta de `/url/scan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResponse {
    pub status: String,
    #[serde(default)]
    pub success_count: Option<u64>,
    #[serde(default)]
    pub failed_count: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_name: Vec<ImportResultItem>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub file_source: Option<String>,
}

impl ImportResponse {
    pub fn is_failed(&self) -> bool {
        self.status == "Failed"
    }
}

/// Estado de procesamiento de un fichero devuelto por `/extract`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileStatusUpdate {
    #[serde(rename = "fileName")]
    pub name: String,
    pub status: String,
    #[serde(rename = "processingTime", default)]
    pub processing_time: Option<f64>,
    #[serde(rename = "nodeCount", default)]
    pub node_count: Option<u64>,
    #[serde(rename = "relationshipCount", default)]
    pub relationship_count: Option<u64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub total_chunks: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
}
