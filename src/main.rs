// Módulos de la aplicación
mod api;
mod app_state;
mod auth;
mod backend;
mod chat_info;
mod config;
mod file_store;
mod import;
mod models;
mod neo4j_client;
mod notifier;
mod reconcile;

use crate::app_state::AppState;
use crate::backend::HttpBackend;
use crate::chat_info::LabelPalette;
use crate::file_store::FileStore;
use crate::notifier::Notifier;
use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env()?;

    // 3. Conectar a Neo4j y cargar las fuentes ya registradas
    let graph = neo4j_client::connect_from_config(&cfg).await?;
    let files = FileStore::new(cfg.default_model.clone());
    match neo4j_client::list_sources(&graph).await {
        Ok(sources) => files.publish(sources),
        Err(e) => warn!("No se pudieron cargar las fuentes existentes: {}", e),
    }

    // 4. Colaboradores externos: backend y autorización de Google
    let backend = Arc::new(HttpBackend::from_config(&cfg)?);
    let authorizer = auth::authorizer_from_config(&cfg)?;

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        graph: Arc::new(graph),
        backend,
        authorizer,
        files,
        notifier: Notifier::new(cfg.notice_reset),
        palette: Arc::new(Mutex::new(LabelPalette::default())),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 6. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr).await?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
