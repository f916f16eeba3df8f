use super::Extraction;
use crate::entity::{Entity, Value};
use crate::sink::{LanguageLink, ParentEdge, RowBatch, TerritorialEntityRow};
use crate::temporal::TemporalResolver;
use crate::vocab;
use tracing::debug;

/// Territorial entity: the entity row, its currently valid parents and its
/// currently valid official languages.
///
/// Parents form a graph, not a tree, so every valid "located in" claim
/// becomes an edge.
pub fn extract_territorial_entity(entity: &Entity, resolver: &TemporalResolver) -> Extraction {
    let mut extraction = Extraction::default();
    extraction.push(RowBatch::TerritorialEntities(vec![TerritorialEntityRow {
        id: entity.id.clone(),
    }]));

    let mut parents = Vec::new();
    for claim in entity.claims(vocab::LOCATED_IN) {
        if !resolver.is_currently_valid(&claim.qualifiers) {
            continue;
        }
        match claim.main_value().and_then(Value::as_entity_id) {
            Some(parent) => parents.push(ParentEdge {
                child_id: entity.id.clone(),
                parent_id: parent.to_string(),
            }),
            None => debug!(entity = %entity.id, "skipping parent without an entity id"),
        }
    }
    extraction.push(RowBatch::Parents(parents));

    let mut languages = Vec::new();
    for claim in entity.claims(vocab::OFFICIAL_LANGUAGE) {
        if !claim.main_snak.is_value() || !resolver.is_currently_valid(&claim.qualifiers) {
            continue;
        }
        match claim.main_value().and_then(Value::as_entity_id) {
            Some(language) => languages.push(LanguageLink {
                entity_id: entity.id.clone(),
                language_id: language.to_string(),
            }),
            None => debug!(entity = %entity.id, "skipping official language without an entity id"),
        }
    }
    extraction.push(RowBatch::ObjectLanguages(languages));

    extraction
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::entity::{Claim, Snak};

    #[test]
    fn test_always_emits_entity_row() {
        let extraction = extract_territorial_entity(&Entity::new("Q1055"), &resolver());
        assert_eq!(
            extraction.batches,
            vec![RowBatch::TerritorialEntities(vec![TerritorialEntityRow {
                id: "Q1055".into()
            }])]
        );
    }

    #[test]
    fn test_all_valid_parents_are_kept() {
        let entity = Entity::new("Q1726")
            .with_claim(vocab::LOCATED_IN, item("Q980"))
            .with_claim(vocab::LOCATED_IN, item("Q10562"))
            .with_claim(
                vocab::LOCATED_IN,
                item("Q3000").with_qualifier(vocab::END_TIME, year(1990)),
            );

        let extraction = extract_territorial_entity(&entity, &resolver());
        let parents: Vec<&str> = extraction
            .batches
            .iter()
            .filter_map(|batch| match batch {
                RowBatch::Parents(rows) => Some(rows),
                _ => None,
            })
            .flatten()
            .map(|edge| edge.parent_id.as_str())
            .collect();
        assert_eq!(parents, vec!["Q980", "Q10562"]);
    }

    #[test]
    fn test_language_links_need_value_and_validity() {
        let entity = Entity::new("Q31")
            .with_claim(vocab::OFFICIAL_LANGUAGE, item("Q7411"))
            .with_claim(vocab::OFFICIAL_LANGUAGE, Claim::new(Snak::UnknownValue))
            .with_claim(
                vocab::OFFICIAL_LANGUAGE,
                item("Q150").with_qualifier(vocab::START_TIME, year(2100)),
            );

        let extraction = extract_territorial_entity(&entity, &resolver());
        assert!(extraction.batches.contains(&RowBatch::ObjectLanguages(vec![LanguageLink {
            entity_id: "Q31".into(),
            language_id: "Q7411".into(),
        }])));
        assert_eq!(extraction.row_count(), 2);
    }
}
