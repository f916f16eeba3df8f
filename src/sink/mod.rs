//! Destination for extracted rows
//!
//! A sink accepts named batched inserts and owns the conflict semantics of
//! each relation. Every write is a one-shot insert; there is no update or
//! delete path.

mod memory;
mod sqlite;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// `countries` row; `iso_code` is lowercase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRow {
    pub id: String,
    pub iso_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritorialEntityRow {
    pub id: String,
}

/// Many-to-many containment edge between territorial entities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentEdge {
    pub child_id: String,
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageLink {
    pub entity_id: String,
    pub language_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageRow {
    pub id: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRow {
    pub id: String,
    pub country_id: String,
    pub population: Option<u64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Plain dump label of a settlement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRow {
    pub id: String,
    pub lang: String,
    pub text: String,
}

/// Native or official name of a settlement, ordered per entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeLabelRow {
    pub id: String,
    pub lang: String,
    pub text: String,
    pub order: u32,
}

/// How a relation treats a primary-key conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Fail,
    Ignore,
}

/// Destination relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Countries,
    TerritorialEntities,
    TerritorialEntitiesParents,
    ObjectLanguages,
    Languages,
    Cities,
    CitiesLabels,
}

impl Relation {
    pub const ALL: [Relation; 7] = [
        Relation::Countries,
        Relation::TerritorialEntities,
        Relation::TerritorialEntitiesParents,
        Relation::ObjectLanguages,
        Relation::Languages,
        Relation::Cities,
        Relation::CitiesLabels,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Relation::Countries => "countries",
            Relation::TerritorialEntities => "territorial_entities",
            Relation::TerritorialEntitiesParents => "territorial_entities_parents",
            Relation::ObjectLanguages => "object_languages",
            Relation::Languages => "languages",
            Relation::Cities => "cities",
            Relation::CitiesLabels => "cities_labels",
        }
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        match self {
            Relation::ObjectLanguages => ConflictPolicy::Ignore,
            _ => ConflictPolicy::Fail,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A batch of rows for one relation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "relation", content = "rows", rename_all = "snake_case")]
pub enum RowBatch {
    Countries(Vec<CountryRow>),
    TerritorialEntities(Vec<TerritorialEntityRow>),
    Parents(Vec<ParentEdge>),
    ObjectLanguages(Vec<LanguageLink>),
    Languages(Vec<LanguageRow>),
    Cities(Vec<SettlementRow>),
    Labels(Vec<LabelRow>),
    NativeLabels(Vec<NativeLabelRow>),
}

impl RowBatch {
    pub fn relation(&self) -> Relation {
        match self {
            RowBatch::Countries(_) => Relation::Countries,
            RowBatch::TerritorialEntities(_) => Relation::TerritorialEntities,
            RowBatch::Parents(_) => Relation::TerritorialEntitiesParents,
            RowBatch::ObjectLanguages(_) => Relation::ObjectLanguages,
            RowBatch::Languages(_) => Relation::Languages,
            RowBatch::Cities(_) => Relation::Cities,
            RowBatch::Labels(_) | RowBatch::NativeLabels(_) => Relation::CitiesLabels,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RowBatch::Countries(rows) => rows.len(),
            RowBatch::TerritorialEntities(rows) => rows.len(),
            RowBatch::Parents(rows) => rows.len(),
            RowBatch::ObjectLanguages(rows) => rows.len(),
            RowBatch::Languages(rows) => rows.len(),
            RowBatch::Cities(rows) => rows.len(),
            RowBatch::Labels(rows) => rows.len(),
            RowBatch::NativeLabels(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(entity id, primary key)` of every row, in row order
    pub fn keys(&self) -> Vec<(&str, String)> {
        match self {
            RowBatch::Countries(rows) => rows.iter().map(|r| (r.id.as_str(), r.id.clone())).collect(),
            RowBatch::TerritorialEntities(rows) => {
                rows.iter().map(|r| (r.id.as_str(), r.id.clone())).collect()
            }
            RowBatch::Parents(rows) => rows
                .iter()
                .map(|r| (r.child_id.as_str(), format!("{}\u{1f}{}", r.child_id, r.parent_id)))
                .collect(),
            RowBatch::ObjectLanguages(rows) => rows
                .iter()
                .map(|r| (r.entity_id.as_str(), format!("{}\u{1f}{}", r.entity_id, r.language_id)))
                .collect(),
            RowBatch::Languages(rows) => rows
                .iter()
                .map(|r| (r.id.as_str(), format!("{}\u{1f}{}", r.id, r.code)))
                .collect(),
            RowBatch::Cities(rows) => rows.iter().map(|r| (r.id.as_str(), r.id.clone())).collect(),
            RowBatch::Labels(rows) => rows
                .iter()
                .map(|r| (r.id.as_str(), format!("{}\u{1f}{}\u{1f}", r.id, r.lang)))
                .collect(),
            RowBatch::NativeLabels(rows) => rows
                .iter()
                .map(|r| (r.id.as_str(), format!("{}\u{1f}{}\u{1f}{}", r.id, r.lang, r.order)))
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("primary key conflict in {relation} for entity {id}")]
    Conflict { relation: Relation, id: String },

    #[error("destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sink task failed: {0}")]
    Task(String),
}

/// Insert contract consumed by the extraction pipeline.
///
/// Callers await each insert before handing over the next record.
#[async_trait]
pub trait Sink: Send {
    /// Insert all rows of a batch into its relation
    async fn insert(&mut self, batch: RowBatch) -> Result<(), SinkError>;

    /// Flush pending writes; called once after the last record
    async fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
