//! Información de recuperación de una respuesta del chat: resumen, fuentes
//! usadas y entidades agrupadas por etiqueta.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::backend::EntityNode;

/// Máximo de entidades que se muestran agrupadas.
const MAX_ENTITIES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelColor {
    Default,
    Success,
    Info,
    Warning,
    Danger,
}

const PALETTE: [LabelColor; 5] = [
    LabelColor::Default,
    LabelColor::Success,
    LabelColor::Info,
    LabelColor::Warning,
    LabelColor::Danger,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub page_numbers: Vec<u32>,
    pub source_name: String,
    #[serde(default)]
    pub time_stamps: String,
}

/// Metadatos de una respuesta del chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfoMessage {
    pub sources: Vec<Source>,
    pub model: String,
    pub response_time: f64,
    pub chunk_ids: Vec<String>,
    pub total_tokens: u64,
}

impl ChatInfoMessage {
    pub fn summary(&self) -> String {
        format!(
            "Para generar esta respuesta, en {:.2} segundos se usaron {} tokens con el modelo {}.",
            self.response_time, self.total_tokens, self.model
        )
    }

    pub fn source_links(&self) -> Vec<SourceLink> {
        self.sources.iter().map(classify_source).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLink {
    Wikipedia { url: String },
    YouTube { url: String },
    Document { name: String, pages: Vec<u32> },
}

pub fn classify_source(source: &Source) -> SourceLink {
    let name = &source.source_name;
    if name.starts_with("http") {
        if name.contains("wikipedia.org") {
            SourceLink::Wikipedia { url: name.clone() }
        } else {
            SourceLink::YouTube { url: name.clone() }
        }
    } else {
        SourceLink::Document {
            name: name.clone(),
            pages: source.page_numbers.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEntity {
    pub texts: BTreeSet<String>,
    pub color: LabelColor,
}

/// Recuerda el color asignado a cada etiqueta entre llamadas.
#[derive(Debug, Default)]
pub struct LabelPalette {
    assigned: HashMap<String, LabelColor>,
}

impl LabelPalette {
    pub fn color_for(&mut self, label: &str) -> LabelColor {
        let next = PALETTE[self.assigned.len() % PALETTE.len()];
        *self.assigned.entry(label.to_string()).or_insert(next)
    }
}

/// Agrupa las primeras entidades por su primera etiqueta.
pub fn group_entities(
    entities: &[EntityNode],
    palette: &mut LabelPalette,
) -> BTreeMap<String, GroupedEntity> {
    let mut groups: BTreeMap<String, GroupedEntity> = BTreeMap::new();
    for entity in entities.iter().take(MAX_ENTITIES) {
        let Some(label) = entity.labels.first() else { continue };
        let group = groups.entry(label.clone()).or_insert_with(|| GroupedEntity {
            texts: BTreeSet::new(),
            color: palette.color_for(label),
        });
        group.texts.insert(entity.properties.id.clone());
    }
    groups
}

/// Respuesta completa del panel de información.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalInfo {
    pub summary: String,
    pub sources: Vec<SourceLink>,
    pub entities: BTreeMap<String, GroupedEntity>,
}
