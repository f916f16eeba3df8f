use super::Extraction;
use crate::entity::{Claim, Entity, Value};
use crate::sink::{LabelRow, NativeLabelRow, RowBatch, SettlementRow};
use crate::temporal::{select_latest_by_point_in_time, TemporalResolver};
use crate::vocab;
use tracing::debug;

/// Human settlement: the settlement row, its plain labels and its ordered
/// native names.
///
/// Requires a country claim whose effective value is an entity id;
/// otherwise nothing is emitted for this role.
pub fn extract_settlement(entity: &Entity, resolver: &TemporalResolver) -> Extraction {
    let countries = entity.claims(vocab::COUNTRY);
    if countries.is_empty() {
        debug!(entity = %entity.id, "skipping settlement without a country");
        return Extraction::skipped();
    }

    let country = resolver
        .select_current(countries)
        .and_then(Claim::main_value)
        .and_then(Value::as_entity_id);
    let Some(country) = country else {
        debug!(entity = %entity.id, "skipping settlement whose country has no entity id");
        return Extraction::skipped();
    };

    let (lat, lon) = match coordinates(entity) {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };

    let mut extraction = Extraction::default();
    extraction.push(RowBatch::Cities(vec![SettlementRow {
        id: entity.id.clone(),
        country_id: country.to_string(),
        population: population(entity),
        lat,
        lon,
    }]));

    let mut labels: Vec<LabelRow> = entity
        .labels
        .iter()
        .map(|(lang, text)| LabelRow {
            id: entity.id.clone(),
            lang: lang.clone(),
            text: text.clone(),
        })
        .collect();
    labels.sort_by(|a, b| a.lang.cmp(&b.lang));
    extraction.push(RowBatch::Labels(labels));

    extraction.push(RowBatch::NativeLabels(native_labels(entity, resolver)));
    extraction
}

/// Latest whole-population figure.
///
/// Claims restricted to part of the population are not candidates. The
/// selected figure must be dimensionless.
fn population(entity: &Entity) -> Option<u64> {
    let candidates = entity.claims(vocab::POPULATION).iter().filter(|claim| {
        !vocab::PARTIAL_POPULATION_QUALIFIERS
            .iter()
            .any(|qualifier| claim.has_qualifier(qualifier))
    });

    match select_latest_by_point_in_time(candidates)?.main_value()? {
        Value::Quantity { amount, unit } if unit == vocab::UNITLESS => parse_population(amount),
        Value::Quantity { unit, .. } => {
            debug!(entity = %entity.id, unit = %unit, "ignoring population with a unit");
            None
        }
        _ => None,
    }
}

/// Parse a signed decimal quantity such as `+3644826` into a head count.
///
/// Negative and fractional amounts yield `None`; `+12.0` is accepted.
pub fn parse_population(amount: &str) -> Option<u64> {
    let amount = amount.trim();
    let amount = amount.strip_prefix('+').unwrap_or(amount);
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if !fraction.bytes().all(|b| b == b'0') {
        return None;
    }
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    whole.parse().ok()
}

/// Coordinates of the first coordinate claim, if it carries a value
fn coordinates(entity: &Entity) -> Option<(f64, f64)> {
    let claim = entity.claims(vocab::COORDINATE_LOCATION).first()?;
    match claim.main_value()? {
        Value::Coordinate {
            latitude,
            longitude,
        } => Some((*latitude, *longitude)),
        _ => None,
    }
}

/// Native labels, then currently valid official names, numbered from 0
fn native_labels(entity: &Entity, resolver: &TemporalResolver) -> Vec<NativeLabelRow> {
    let native = entity.claims(vocab::NATIVE_LABEL).iter();
    let official = entity
        .claims(vocab::OFFICIAL_NAME)
        .iter()
        .filter(|claim| resolver.is_currently_valid(&claim.qualifiers));

    native
        .chain(official)
        .filter_map(|claim| claim.main_value()?.as_monolingual())
        .enumerate()
        .map(|(order, (lang, text))| NativeLabelRow {
            id: entity.id.clone(),
            lang: lang.to_string(),
            text: text.to_string(),
            order: order as u32,
        })
        .collect()
}
