use crate::config::AppConfig;
use crate::models::{FileRecord, Origin};
use anyhow::Result;
use neo4rs::{query, Graph, Row};
use tracing::info;
use url::Url;
use uuid::Uuid;

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

pub async fn check_connection(graph: &Graph) -> Result<()> {
    graph.run(query("RETURN 1")).await?;
    Ok(())
}

/// URL del Neo4j Browser correspondiente al URI bolt configurado.
pub fn browser_url(neo4j_uri: &str) -> String {
    // `neo4j://` no es un esquema especial, así que no se puede cambiar a http con set_scheme.
    match Url::parse(neo4j_uri).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) => format!("http://{host}:7474"),
        None => "http://localhost:7474".to_string(),
    }
}

/// Lee los nodos (:Document) que el backend ya ha registrado, del más
/// reciente al más antiguo.
pub async fn list_sources(graph: &Graph) -> Result<Vec<FileRecord>> {
    let mut cursor = graph
        .execute(query(
            "MATCH (d:Document)
             RETURN d.fileName AS fileName, d.fileSize AS fileSize, d.status AS status,
                    d.nodeCount AS nodeCount, d.relationshipCount AS relationshipCount,
                    d.processingTime AS processingTime, d.model AS model,
                    d.fileSource AS fileSource, d.fileType AS fileType, d.url AS url,
                    d.gcsBucket AS gcsBucket, d.gcsBucketFolder AS gcsBucketFolder,
                    d.gcsProjectId AS gcsProjectId, d.errorMessage AS errorMessage
             ORDER BY d.updatedAt DESC",
        ))
        .await?;

    let mut files = Vec::new();
    while let Some(row) = cursor.next().await? {
        if let Some(record) = record_from_row(&row) {
            files.push(record);
        }
    }
    info!("Cargadas {} fuentes desde Neo4j", files.len());
    Ok(files)
}

fn record_from_row(row: &Row) -> Option<FileRecord> {
    let name: String = row.get("fileName")?;
    let source: String = row.get("fileSource").unwrap_or_else(|| "local file".to_string());
    let url: Option<String> = row.get::<String>("url").filter(|u| !u.is_empty());

    let origin = document_origin(
        &source,
        &name,
        url,
        DocumentGcs {
            project_id: row.get("gcsProjectId"),
            bucket: row.get("gcsBucket"),
            folder: row.get("gcsBucketFolder"),
        },
    );

    Some(FileRecord {
        id: Uuid::new_v4(),
        size: row.get::<i64>("fileSize").unwrap_or(0).max(0) as u64,
        status: row.get("status").unwrap_or_else(|| "New".to_string()),
        nodes_count: row.get::<i64>("nodeCount").unwrap_or(0).max(0) as u64,
        relationship_count: row.get::<i64>("relationshipCount").unwrap_or(0).max(0) as u64,
        processing_progress: row.get::<f64>("processingTime").unwrap_or(0.0),
        model: row.get("model").unwrap_or_default(),
        file_type: row.get("fileType").unwrap_or_else(|| "TEXT".to_string()),
        error_message: row.get::<String>("errorMessage").filter(|m| !m.is_empty()),
        name,
        source,
        origin,
    })
}

/// Metadatos de GCS guardados en un nodo (:Document).
#[derive(Default)]
struct DocumentGcs {
    project_id: Option<String>,
    bucket: Option<String>,
    folder: Option<String>,
}

/// Origen de un documento según su `fileSource`; un origen desconocido con
/// URL se trata como página web.
fn document_origin(source: &str, name: &str, url: Option<String>, gcs: DocumentGcs) -> Origin {
    match source {
        "gcs bucket" => Origin::GcsBucket {
            project_id: gcs.project_id.unwrap_or_default(),
            bucket: gcs.bucket.unwrap_or_default(),
            folder: gcs.folder.filter(|f| !f.is_empty()),
        },
        "s3 bucket" => Origin::S3Bucket { url: url.unwrap_or_default() },
        "Wikipedia" => Origin::Wikipedia { query: name.to_string() },
        "local file" => Origin::LocalFile,
        _ => match url {
            Some(url) => Origin::Web { url },
            None => Origin::LocalFile,
        },
    }
}
