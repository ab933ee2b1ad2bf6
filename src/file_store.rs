//! Colección compartida de ficheros fuente (única fuente de verdad).
//!
//! Cada versión es inmutable: se lee con `snapshot()` y se reemplaza entera
//! con `publish()` o `update()`.

use std::sync::{Arc, RwLock};

use crate::models::FileRecord;

#[derive(Clone)]
pub struct FileStore {
    files: Arc<RwLock<Arc<Vec<FileRecord>>>>,
    model: Arc<RwLock<String>>,
}

impl FileStore {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            files: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            model: Arc::new(RwLock::new(model.into())),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<FileRecord>> {
        Arc::clone(&self.files.read().unwrap())
    }

    pub fn publish(&self, files: Vec<FileRecord>) {
        *self.files.write().unwrap() = Arc::new(files);
    }

    /// Lee la versión actual, construye la siguiente y la publica bajo el
    /// mismo bloqueo de escritura.
    pub fn update<F>(&self, f: F) -> Arc<Vec<FileRecord>>
    where
        F: FnOnce(&[FileRecord]) -> Vec<FileRecord>,
    {
        let mut guard = self.files.write().unwrap();
        let next = Arc::new(f(guard.as_slice()));
        *guard = Arc::clone(&next);
        next
    }

    pub fn find(&self, name: &str) -> Option<FileRecord> {
        self.snapshot().iter().find(|f| f.name == name).cloned()
    }

    pub fn model(&self) -> String {
        self.model.read().unwrap().clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        *self.model.write().unwrap() = model.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileDefaults, ImportResultItem};
    use crate::reconcile::reconcile;

    fn item(name: &str) -> ImportResultItem {
        ImportResultItem {
            name: name.to_string(),
            size: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn old_snapshots_are_not_mutated() {
        let store = FileStore::new("OpenAI GPT 3.5");
        let before = store.snapshot();
        let defaults = FileDefaults::new(&store.model(), "local file");

        store.update(|files| reconcile(files, &[item("a.txt")], &defaults));

        assert!(before.is_empty());
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.find("a.txt").map(|f| f.status), Some("New".to_string()));
    }

    #[test]
    fn clones_share_the_same_collection() {
        let store = FileStore::new("Diffbot");
        let other = store.clone();
        other.set_model("OpenAI GPT 4");
        other.publish(Vec::new());
        store.update(|files| {
            reconcile(files, &[item("b.txt")], &FileDefaults::new("OpenAI GPT 4", "local file"))
        });

        assert_eq!(store.model(), "OpenAI GPT 4");
        assert_eq!(other.snapshot().len(), 1);
        assert!(other.find("missing").is_none());
    }
}
