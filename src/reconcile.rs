//! Fusión de resultados de importación y de procesamiento sobre la lista de
//! ficheros del cliente.
//!
//! Las funciones son puras: reciben la versión actual de la colección y
//! devuelven una nueva, sin mutar la original.

use uuid::Uuid;

use crate::models::{FileDefaults, FileRecord, FileStatusUpdate, ImportResultItem};

/// Incorpora los ficheros importados a la colección existente.
///
/// Cada elemento se procesa en orden contra la copia de trabajo:
/// - si su nombre no existe, se crea un registro nuevo a partir de `defaults`
///   y se inserta al principio;
/// - si ya existe, se saca de su posición, se restablecen sus campos mutables
///   y se reinserta al principio conservando el resto (tamaño, origen, id).
pub fn reconcile(
    existing: &[FileRecord],
    incoming: &[ImportResultItem],
    defaults: &FileDefaults,
) -> Vec<FileRecord> {
    let mut working = existing.to_vec();

    for item in incoming {
        let record = match working.iter().position(|f| f.name == item.name) {
            Some(index) => {
                let mut previous = working.remove(index);
                reset_mutable_fields(&mut previous, defaults);
                previous
            }
            None => new_record(item, defaults),
        };
        working.insert(0, record);
    }

    working
}

/// Aplica un estado de procesamiento al registro con el mismo nombre, sin
/// moverlo de posición. Los nombres desconocidos se ignoran.
pub fn apply_status(existing: &[FileRecord], update: &FileStatusUpdate) -> Vec<FileRecord> {
    existing
        .iter()
        .map(|file| {
            if file.name != update.name {
                return file.clone();
            }
            let mut file = file.clone();
            file.status = update.status.clone();
            file.nodes_count = update.node_count.unwrap_or(file.nodes_count);
            file.relationship_count = update.relationship_count.unwrap_or(file.relationship_count);
            file.processing_progress = update.processing_time.unwrap_or(file.processing_progress);
            if let Some(model) = &update.model {
                file.model = model.clone();
            }
            file
        })
        .collect()
}

/// Marca un registro con un estado concreto (p. ej. "Processing" o "Failed").
pub fn mark_status(
    existing: &[FileRecord],
    name: &str,
    status: &str,
    error_message: Option<String>,
) -> Vec<FileRecord> {
    existing
        .iter()
        .map(|file| {
            let mut file = file.clone();
            if file.name == name {
                file.status = status.to_string();
                file.error_message = error_message.clone();
            }
            file
        })
        .collect()
}

fn new_record(item: &ImportResultItem, defaults: &FileDefaults) -> FileRecord {
    FileRecord {
        id: Uuid::new_v4(),
        name: item.name.clone(),
        size: item.size.unwrap_or(0),
        status: defaults.status.clone(),
        nodes_count: defaults.nodes_count,
        relationship_count: defaults.relationship_count,
        processing_progress: defaults.processing_progress,
        model: defaults.model.clone(),
        source: defaults.source.clone(),
        file_type: defaults.file_type.clone(),
        origin: item.origin(),
        error_message: None,
    }
}

fn reset_mutable_fields(file: &mut FileRecord, defaults: &FileDefaults) {
    file.status = defaults.status.clone();
    file.nodes_count = defaults.nodes_count;
    file.relationship_count = defaults.relationship_count;
    file.processing_progress = defaults.processing_progress;
    file.model = defaults.model.clone();
    file.source = defaults.source.clone();
}
