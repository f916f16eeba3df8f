//! Role handlers
//!
//! Each handler turns one classified entity into row batches. Handlers are
//! pure: they never touch the sink, so the coordinator decides when (and
//! whether) the rows are written. A handler that lacks a required claim
//! returns no batches; that only affects its own role.

mod settlement;
mod territorial;

pub use settlement::{extract_settlement, parse_population};
pub use territorial::extract_territorial_entity;

use crate::classify::Role;
use crate::entity::{Entity, Value};
use crate::sink::{CountryRow, LanguageRow, RowBatch};
use crate::temporal::TemporalResolver;
use crate::vocab;
use tracing::debug;

/// Rows produced by one role handler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub batches: Vec<RowBatch>,
}

impl Extraction {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: RowBatch) {
        if !batch.is_empty() {
            self.batches.push(batch);
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.batches.iter().map(RowBatch::len).sum()
    }
}

/// Run the handler for one role
pub fn extract(role: Role, entity: &Entity, resolver: &TemporalResolver) -> Extraction {
    match role {
        Role::Country => extract_country(entity, resolver),
        Role::TerritorialEntity => extract_territorial_entity(entity, resolver),
        Role::HumanSettlement => extract_settlement(entity, resolver),
        Role::Language => extract_language(entity),
    }
}

/// Country: the currently valid ISO code, lowercased.
///
/// Falls back to the last code when none is currently valid.
pub fn extract_country(entity: &Entity, resolver: &TemporalResolver) -> Extraction {
    let claims = entity.claims(vocab::ISO_CODE);
    let iso = resolver
        .select_current(claims)
        .and_then(|claim| claim.main_value())
        .and_then(Value::as_str);

    let Some(iso) = iso else {
        debug!(entity = %entity.id, "skipping country without a usable ISO code");
        return Extraction::skipped();
    };

    let mut extraction = Extraction::default();
    extraction.push(RowBatch::Countries(vec![CountryRow {
        id: entity.id.clone(),
        iso_code: iso.to_lowercase(),
    }]));
    extraction
}

/// Language: the code from the first language-code claim
pub fn extract_language(entity: &Entity) -> Extraction {
    let code = entity
        .claims(vocab::LANGUAGE_CODE)
        .first()
        .and_then(|claim| claim.main_value())
        .and_then(Value::as_str);

    let Some(code) = code else {
        debug!(entity = %entity.id, "skipping language without a language code");
        return Extraction::skipped();
    };

    let mut extraction = Extraction::default();
    extraction.push(RowBatch::Languages(vec![LanguageRow {
        id: entity.id.clone(),
        code: code.to_string(),
    }]));
    extraction
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::entity::Claim;

    #[test]
    fn test_country_lowercases_iso() {
        let entity = Entity::new("Q142").with_claim(vocab::ISO_CODE, string("FR"));
        let extraction = extract_country(&entity, &resolver());
        assert_eq!(
            extraction.batches,
            vec![RowBatch::Countries(vec![CountryRow {
                id: "Q142".into(),
                iso_code: "fr".into(),
            }])]
        );
    }

    #[test]
    fn test_country_prefers_current_code() {
        let entity = Entity::new("Q36")
            .with_claim(
                vocab::ISO_CODE,
                string("XX").with_qualifier(vocab::END_TIME, year(1990)),
            )
            .with_claim(vocab::ISO_CODE, string("PL"));
        let extraction = extract_country(&entity, &resolver());
        assert!(matches!(
            &extraction.batches[0],
            RowBatch::Countries(rows) if rows[0].iso_code == "pl"
        ));
    }

    #[test]
    fn test_country_falls_back_to_last_code() {
        let entity = Entity::new("Q15180")
            .with_claim(
                vocab::ISO_CODE,
                string("SU").with_qualifier(vocab::END_TIME, year(1991)),
            )
            .with_claim(
                vocab::ISO_CODE,
                string("XU").with_qualifier(vocab::END_TIME, year(1992)),
            );
        let extraction = extract_country(&entity, &resolver());
        assert!(matches!(
            &extraction.batches[0],
            RowBatch::Countries(rows) if rows[0].iso_code == "xu"
        ));
    }

    #[test]
    fn test_country_with_unknown_code_is_skipped() {
        let entity = Entity::new("Q1")
            .with_claim(vocab::ISO_CODE, Claim::new(crate::entity::Snak::UnknownValue));
        assert!(extract_country(&entity, &resolver()).is_skipped());
    }

    #[test]
    fn test_language_uses_first_code() {
        let entity = Entity::new("Q188")
            .with_claim(vocab::LANGUAGE_CODE, string("de"))
            .with_claim(vocab::LANGUAGE_CODE, string("deu"));
        let extraction = extract_language(&entity);
        assert_eq!(
            extraction.batches,
            vec![RowBatch::Languages(vec![LanguageRow {
                id: "Q188".into(),
                code: "de".into(),
            }])]
        );
    }

    #[test]
    fn test_language_without_code_is_skipped() {
        assert!(extract_language(&Entity::new("Q188")).is_skipped());
    }

    #[test]
    fn test_place_handlers_run_independently() {
        let entity = Entity::new("Q64")
            .with_claim(vocab::COUNTRY, item("Q183"))
            .with_label("de", "Berlin");

        for role in [Role::TerritorialEntity, Role::HumanSettlement] {
            assert!(!extract(role, &entity, &resolver()).is_skipped(), "{}", role);
        }
    }
}
