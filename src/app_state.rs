use std::sync::{Arc, Mutex};
use neo4rs::Graph;
use tokio::sync::oneshot;
use crate::{
    auth::Authorizer,
    backend::SourceBackend,
    chat_info::LabelPalette,
    config::AppConfig,
    file_store::FileStore,
    import::ImportContext,
    notifier::Notifier,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub graph: Arc<Graph>,
    pub backend: Arc<dyn SourceBackend>,
    pub authorizer: Arc<dyn Authorizer>,
    pub files: FileStore,
    pub notifier: Notifier,
    pub palette: Arc<Mutex<LabelPalette>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn import_context(&self) -> ImportContext<'_> {
        ImportContext {
            backend: self.backend.as_ref(),
            authorizer: self.authorizer.as_ref(),
            files: &self.files,
            notifier: &self.notifier,
        }
    }
}
