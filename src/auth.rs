//! Paso de autorización para leer buckets de Google Cloud Storage.
//!
//! Aquí sólo se consume un token: o bien uno fijo de la configuración, o bien
//! uno obtenido intercambiando un refresh token en el endpoint de Google.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::{AppConfig, AuthMode};

pub const GCS_READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// El proveedor rechazó la autorización.
    #[error("autorización denegada: {}", .description.as_deref().unwrap_or("sin descripción"))]
    Denied { description: Option<String> },
    /// El usuario cerró el flujo sin completarlo o retiró el consentimiento
    /// (`access_denied` en la respuesta de Google).
    #[error("autorización cancelada: {0}")]
    Dismissed(String),
    #[error("no hay credenciales de Google configuradas")]
    Unconfigured,
    #[error("error de red durante la autorización: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, scope: &str) -> Result<AccessToken, AuthError>;
}

/// Token fijo tomado de `GOOGLE_ACCESS_TOKEN`.
pub struct StaticTokenAuthorizer {
    token: AccessToken,
}

impl StaticTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: AccessToken::new(token) }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn authorize(&self, _scope: &str) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }
}

/// Obtiene un token de acceso nuevo en cada importación a partir de un refresh token.
pub struct RefreshTokenAuthorizer {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.access_token {
            return Ok(AccessToken::new(token));
        }
        if self.error.as_deref() == Some("access_denied") {
            return Err(AuthError::Dismissed(
                self.error_description
                    .unwrap_or_else(|| "El usuario no concedió acceso".to_string()),
            ));
        }
        Err(AuthError::Denied {
            description: self.error_description.or(self.error),
        })
    }
}

impl RefreshTokenAuthorizer {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TOKEN_EXCHANGE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id,
            client_secret,
            refresh_token,
        })
    }
}

#[async_trait]
impl Authorizer for RefreshTokenAuthorizer {
    async fn authorize(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            ("scope", scope),
        ];
        let response: TokenResponse = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?
            .json()
            .await?;

        response.into_token()
    }
}

/// Sin credenciales: toda importación desde GCS termina en error.
pub struct UnconfiguredAuthorizer;

#[async_trait]
impl Authorizer for UnconfiguredAuthorizer {
    async fn authorize(&self, _scope: &str) -> Result<AccessToken, AuthError> {
        Err(AuthError::Unconfigured)
    }
}

/// Elige la implementación según `GOOGLE_AUTH_MODE`.
pub fn authorizer_from_config(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Authorizer>> {
    let google = &cfg.google;
    let authorizer: Arc<dyn Authorizer> = match cfg.auth_mode {
        AuthMode::None => Arc::new(UnconfiguredAuthorizer),
        AuthMode::Token => {
            let token = google
                .access_token
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Falta GOOGLE_ACCESS_TOKEN en el entorno"))?;
            Arc::new(StaticTokenAuthorizer::new(token))
        }
        AuthMode::Refresh => match (&google.client_id, &google.client_secret, &google.refresh_token) {
            (Some(id), Some(secret), Some(refresh)) => Arc::new(RefreshTokenAuthorizer::new(
                id.clone(),
                secret.clone(),
                refresh.clone(),
            )?),
            _ => anyhow::bail!(
                "GOOGLE_AUTH_MODE=refresh requiere GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET y GOOGLE_REFRESH_TOKEN"
            ),
        },
    };
    info!("Autorización de Google en modo {:?}", cfg.auth_mode);
    Ok(authorizer)
}
