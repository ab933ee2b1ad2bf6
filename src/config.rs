//! Carga y gestión de configuración de la aplicación (Neo4j + backend + Google).

use std::{env, time::Duration};
use anyhow::{anyhow, Result};

/// Cómo se obtiene el token de acceso de Google para importar desde GCS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Token,
    Refresh,
}

impl AuthMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "token" => Ok(Self::Token),
            "refresh" => Ok(Self::Refresh),
            other => Err(anyhow!("Modo de autorización no soportado: {other}")),
        }
    }
}

/// Credenciales de Google usadas por el paso de autorización.
#[derive(Clone, Debug, Default)]
pub struct GoogleAuthConfig {
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,
    pub server_addr: String,
    pub backend_url: String,
    pub backend_timeout: Duration,

    pub default_model: String,
    pub notice_reset: Duration,

    pub auth_mode: AuthMode,
    pub google: GoogleAuthConfig,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo las claves de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| anyhow!("Falta {key} en el entorno"))
        };
        let or_default = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let neo4j_uri = required("NEO4J_URI")?;
        let neo4j_user = required("NEO4J_USER")?;
        let neo4j_password = required("NEO4J_PASSWORD")?;
        let neo4j_database = or_default("NEO4J_DATABASE", "neo4j");

        let server_addr = or_default("SERVER_ADDR", "127.0.0.1:3322");
        let backend_url = or_default("BACKEND_URL", "http://127.0.0.1:8000")
            .trim_end_matches('/')
            .to_string();
        let backend_timeout_secs: u64 = or_default("BACKEND_TIMEOUT_SECS", "300")
            .parse()
            .map_err(|e| anyhow!("BACKEND_TIMEOUT_SECS no es un número válido: {e}"))?;

        let default_model = or_default("DEFAULT_MODEL", "OpenAI GPT 3.5");
        let notice_reset_ms: u64 = or_default("NOTICE_RESET_MS", "5000")
            .parse()
            .map_err(|e| anyhow!("NOTICE_RESET_MS no es un número válido: {e}"))?;

        let auth_mode = AuthMode::from_str(&or_default("GOOGLE_AUTH_MODE", "none"))?;
        let google = GoogleAuthConfig {
            access_token: lookup("GOOGLE_ACCESS_TOKEN"),
            client_id: lookup("GOOGLE_CLIENT_ID"),
            client_secret: lookup("GOOGLE_CLIENT_SECRET"),
            refresh_token: lookup("GOOGLE_REFRESH_TOKEN"),
        };

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            neo4j_database,
            server_addr,
            backend_url,
            backend_timeout: Duration::from_secs(backend_timeout_secs),
            default_model,
            notice_reset: Duration::from_millis(notice_reset_ms),
            auth_mode,
            google,
        })
    }
}
