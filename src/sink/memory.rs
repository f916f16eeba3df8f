//! In-memory destination

use super::{
    ConflictPolicy, CountryRow, LabelRow, LanguageLink, LanguageRow, NativeLabelRow, ParentEdge,
    Relation, RowBatch, SettlementRow, Sink, SinkError, TerritorialEntityRow,
};
use async_trait::async_trait;
use std::collections::HashSet;

/// Keeps every accepted row in memory, enforcing the same conflict policy
/// per relation as the SQLite destination. Used by tests and by the
/// `entity` command to show what a record would produce.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Vec<RowBatch>,
    keys: HashSet<(Relation, String)>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted batches in insertion order
    pub fn batches(&self) -> &[RowBatch] {
        &self.batches
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of rows in a relation
    pub fn count(&self, relation: Relation) -> usize {
        self.keys.iter().filter(|(r, _)| *r == relation).count()
    }

    pub fn countries(&self) -> Vec<&CountryRow> {
        self.collect(|batch| match batch {
            RowBatch::Countries(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn territorial_entities(&self) -> Vec<&TerritorialEntityRow> {
        self.collect(|batch| match batch {
            RowBatch::TerritorialEntities(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn parents(&self) -> Vec<&ParentEdge> {
        self.collect(|batch| match batch {
            RowBatch::Parents(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn object_languages(&self) -> Vec<&LanguageLink> {
        self.collect(|batch| match batch {
            RowBatch::ObjectLanguages(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn languages(&self) -> Vec<&LanguageRow> {
        self.collect(|batch| match batch {
            RowBatch::Languages(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn cities(&self) -> Vec<&SettlementRow> {
        self.collect(|batch| match batch {
            RowBatch::Cities(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn labels(&self) -> Vec<&LabelRow> {
        self.collect(|batch| match batch {
            RowBatch::Labels(rows) => Some(rows),
            _ => None,
        })
    }

    pub fn native_labels(&self) -> Vec<&NativeLabelRow> {
        self.collect(|batch| match batch {
            RowBatch::NativeLabels(rows) => Some(rows),
            _ => None,
        })
    }

    fn collect<'a, T: 'a>(&'a self, select: impl Fn(&'a RowBatch) -> Option<&'a Vec<T>>) -> Vec<&'a T> {
        self.batches
            .iter()
            .filter_map(select)
            .flat_map(|rows| rows.iter())
            .collect()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn insert(&mut self, batch: RowBatch) -> Result<(), SinkError> {
        let relation = batch.relation();
        let policy = relation.conflict_policy();

        // Rows are checked in order; a conflict leaves earlier rows of the
        // batch in place, as a statement-level failure would.
        let mut accepted = Vec::with_capacity(batch.len());
        let mut conflict = None;
        for (index, (entity_id, key)) in batch.keys().into_iter().enumerate() {
            if self.keys.insert((relation, key)) {
                accepted.push(index);
            } else if policy == ConflictPolicy::Fail {
                conflict = Some(SinkError::Conflict {
                    relation,
                    id: entity_id.to_string(),
                });
                break;
            }
        }

        let batch = retain_rows(batch, &accepted);
        if !batch.is_empty() {
            self.batches.push(batch);
        }

        match conflict {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}

fn keep<T>(rows: Vec<T>, accepted: &[usize]) -> Vec<T> {
    rows.into_iter()
        .enumerate()
        .filter(|(index, _)| accepted.binary_search(index).is_ok())
        .map(|(_, row)| row)
        .collect()
}

fn retain_rows(batch: RowBatch, accepted: &[usize]) -> RowBatch {
    match batch {
        RowBatch::Countries(rows) => RowBatch::Countries(keep(rows, accepted)),
        RowBatch::TerritorialEntities(rows) => RowBatch::TerritorialEntities(keep(rows, accepted)),
        RowBatch::Parents(rows) => RowBatch::Parents(keep(rows, accepted)),
        RowBatch::ObjectLanguages(rows) => RowBatch::ObjectLanguages(keep(rows, accepted)),
        RowBatch::Languages(rows) => RowBatch::Languages(keep(rows, accepted)),
        RowBatch::Cities(rows) => RowBatch::Cities(keep(rows, accepted)),
        RowBatch::Labels(rows) => RowBatch::Labels(keep(rows, accepted)),
        RowBatch::NativeLabels(rows) => RowBatch::NativeLabels(keep(rows, accepted)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(entity: &str, language: &str) -> LanguageLink {
        LanguageLink {
            entity_id: entity.into(),
            language_id: language.into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_links_are_dropped() {
        let mut sink = MemorySink::new();
        sink.insert(RowBatch::ObjectLanguages(vec![link("Q31", "Q150")]))
            .await
            .unwrap();
        sink.insert(RowBatch::ObjectLanguages(vec![
            link("Q31", "Q150"),
            link("Q31", "Q188"),
        ]))
        .await
        .unwrap();

        assert_eq!(sink.object_languages().len(), 2);
        assert_eq!(sink.count(Relation::ObjectLanguages), 2);
    }

    #[tokio::test]
    async fn test_duplicate_country_fails() {
        let mut sink = MemorySink::new();
        let country = || {
            RowBatch::Countries(vec![CountryRow {
                id: "Q183".into(),
                iso_code: "de".into(),
            }])
        };
        sink.insert(country()).await.unwrap();

        let err = sink.insert(country()).await.unwrap_err();
        assert!(matches!(
            err,
            SinkError::Conflict { relation: Relation::Countries, ref id } if id == "Q183"
        ));
        assert_eq!(sink.countries().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_and_native_labels_do_not_collide() {
        let mut sink = MemorySink::new();
        sink.insert(RowBatch::Labels(vec![LabelRow {
            id: "Q64".into(),
            lang: "de".into(),
            text: "Berlin".into(),
        }]))
        .await
        .unwrap();
        sink.insert(RowBatch::NativeLabels(vec![NativeLabelRow {
            id: "Q64".into(),
            lang: "de".into(),
            text: "Berlin".into(),
            order: 0,
        }]))
        .await
        .unwrap();

        assert_eq!(sink.count(Relation::CitiesLabels), 2);
        assert_eq!(sink.labels().len(), 1);
        assert_eq!(sink.native_labels().len(), 1);
    }
}
