//! Aviso de estado transitorio (`unknown → info → success|warning|danger → unknown`).
//!
//! Los estados de resultado se restablecen solos tras `reset_after`. Cada
//! transición cancela el reinicio pendiente, y `reset()` también, de modo que
//! tras cerrar el aviso no queda ninguna mutación programada.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Unknown,
    Success,
    Info,
    Warning,
    Danger,
}

/// Estado visible del aviso.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub since: Option<DateTime<Utc>>,
}

struct Inner {
    current: Notification,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Handle compartido; los clones apuntan al mismo aviso.
///
/// Las transiciones que programan un reinicio deben llamarse dentro de un
/// runtime de tokio.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Mutex<Inner>>,
    reset_after: Duration,
}

impl Notifier {
    pub fn new(reset_after: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: Notification::default(),
                generation: 0,
                pending: None,
            })),
            reset_after,
        }
    }

    pub fn current(&self) -> Notification {
        self.inner.lock().unwrap().current.clone()
    }

    /// Operación en curso. No se restablece sola.
    pub fn begin(&self, message: impl Into<String>) {
        self.transition(Severity::Info, message.into(), false);
    }

    pub fn succeed(&self, message: impl Into<String>) {
        self.transition(Severity::Success, message.into(), true);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.transition(Severity::Warning, message.into(), true);
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.transition(Severity::Danger, message.into(), true);
    }

    /// Vuelve a `unknown` y cancela cualquier reinicio pendiente. Idempotente.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        inner.current = Notification::default();
    }

    fn transition(&self, severity: Severity, message: String, schedule_reset: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        debug!("Aviso {:?}: {}", severity, message);
        inner.current = Notification {
            severity,
            message,
            since: Some(Utc::now()),
        };

        if schedule_reset {
            let generation = inner.generation;
            let shared = Arc::clone(&self.inner);
            let delay = self.reset_after;
            inner.pending = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut inner = shared.lock().unwrap();
                // Un temporizador ya despierto no debe pisar una transición posterior.
                if inner.generation == generation {
                    inner.current = Notification::default();
                    inner.pending = None;
                }
            }));
        }
    }
}
