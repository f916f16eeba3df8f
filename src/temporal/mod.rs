//! Temporal qualifier resolution
//!
//! Decides whether a qualified fact holds at the run's reference instant
//! and picks among competing time-qualified values.

mod time;

pub use time::{TimeParseError, Timestamp, WikiTime};

use crate::entity::{Claim, Snak};
use crate::vocab;
use std::collections::HashMap;

/// Qualifier time of a claim, if it is value-kind and resolvable.
///
/// Non-value snaks and unparsable timestamps count as absent.
pub fn qualifier_timestamp(
    qualifiers: &HashMap<String, Vec<Snak>>,
    property: &str,
) -> Option<Timestamp> {
    let snak = qualifiers.get(property)?.first()?;
    let time = snak.value()?.as_time()?;
    WikiTime::from_value(time).ok().map(|t| t.to_timestamp())
}

/// Resolves validity windows against a fixed reference instant
#[derive(Debug, Clone, Copy)]
pub struct TemporalResolver {
    reference: Timestamp,
}

impl TemporalResolver {
    pub fn new(reference: Timestamp) -> Self {
        Self { reference }
    }

    /// Resolver pinned to the current wall-clock time
    pub fn now() -> Self {
        Self::new(Timestamp::now())
    }

    pub fn reference(&self) -> Timestamp {
        self.reference
    }

    /// Whether a claim with these qualifiers holds at the reference instant.
    ///
    /// Valid unless it ended strictly before, or starts strictly after, the
    /// reference instant.
    pub fn is_currently_valid(&self, qualifiers: &HashMap<String, Vec<Snak>>) -> bool {
        if let Some(end) = qualifier_timestamp(qualifiers, vocab::END_TIME) {
            if end < self.reference {
                return false;
            }
        }
        if let Some(start) = qualifier_timestamp(qualifiers, vocab::START_TIME) {
            if start > self.reference {
                return false;
            }
        }
        true
    }

    /// First currently valid claim; if none is valid, the last claim examined.
    pub fn select_current<'a>(&self, claims: &'a [Claim]) -> Option<&'a Claim> {
        claims
            .iter()
            .find(|claim| self.is_currently_valid(&claim.qualifiers))
            .or_else(|| claims.last())
    }
}

/// The claim with the latest point-in-time qualifier.
///
/// Unqualified claims rank at [`Timestamp::MIN`]. On equal instants the
/// later claim in iteration order wins.
pub fn select_latest_by_point_in_time<'a, I>(claims: I) -> Option<&'a Claim>
where
    I: IntoIterator<Item = &'a Claim>,
{
    let mut latest: Option<(Timestamp, &'a Claim)> = None;
    for claim in claims {
        let at = qualifier_timestamp(&claim.qualifiers, vocab::POINT_IN_TIME)
            .unwrap_or(Timestamp::MIN);
        if latest.map_or(true, |(best, _)| at >= best) {
            latest = Some((at, claim));
        }
    }
    latest.map(|(_, claim)| claim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{TimeValue, Value};
    use chrono::{Duration, Utc};

    fn time_snak(datetime: chrono::DateTime<Utc>) -> Snak {
        Snak::Value(Value::Time(TimeValue::new(
            datetime.format("+%Y-%m-%dT%H:%M:%SZ").to_string(),
            0,
        )))
    }

    fn year_snak(year: i32) -> Snak {
        Snak::Value(Value::Time(TimeValue::new(
            format!("+{:04}-00-00T00:00:00Z", year),
            0,
        )))
    }

    fn amount(claim: &Claim) -> Option<&str> {
        match claim.main_value() {
            Some(Value::Quantity { amount, .. }) => Some(amount),
            _ => None,
        }
    }

    fn population(value: &str) -> Claim {
        Claim::value(Value::Quantity {
            amount: value.into(),
            unit: "1".into(),
        })
    }

    #[test]
    fn test_no_qualifiers_is_valid() {
        let resolver = TemporalResolver::now();
        assert!(resolver.is_currently_valid(&HashMap::new()));
    }

    #[test]
    fn test_ended_yesterday_is_invalid() {
        let now = Utc::now();
        let resolver = TemporalResolver::new(Timestamp::from_datetime(now));
        let claim = Claim::value(Value::String("x".into()))
            .with_qualifier(vocab::END_TIME, time_snak(now - Duration::days(1)));
        assert!(!resolver.is_currently_valid(&claim.qualifiers));
    }

    #[test]
    fn test_started_yesterday_is_valid() {
        let now = Utc::now();
        let resolver = TemporalResolver::new(Timestamp::from_datetime(now));
        let claim = Claim::value(Value::String("x".into()))
            .with_qualifier(vocab::START_TIME, time_snak(now - Duration::days(1)));
        assert!(resolver.is_currently_valid(&claim.qualifiers));
    }

    #[test]
    fn test_starts_tomorrow_is_invalid() {
        let now = Utc::now();
        let resolver = TemporalResolver::new(Timestamp::from_datetime(now));
        let claim = Claim::value(Value::String("x".into()))
            .with_qualifier(vocab::START_TIME, time_snak(now + Duration::days(1)));
        assert!(!resolver.is_currently_valid(&claim.qualifiers));
    }

    #[test]
    fn test_non_value_qualifiers_are_ignored() {
        let resolver = TemporalResolver::now();
        let claim = Claim::value(Value::String("x".into()))
            .with_qualifier(vocab::END_TIME, Snak::UnknownValue)
            .with_qualifier(vocab::START_TIME, Snak::NoValue);
        assert!(resolver.is_currently_valid(&claim.qualifiers));
    }

    #[test]
    fn test_select_current_prefers_first_valid() {
        let resolver = TemporalResolver::now();
        let claims = vec![
            Claim::value(Value::String("old".into())).with_qualifier(vocab::END_TIME, year_snak(1990)),
            Claim::value(Value::String("a".into())),
            Claim::value(Value::String("b".into())),
        ];
        let selected = resolver.select_current(&claims).unwrap();
        assert_eq!(selected.main_value().and_then(Value::as_str), Some("a"));
    }

    #[test]
    fn test_select_current_falls_back_to_last() {
        let resolver = TemporalResolver::now();
        let claims = vec![
            Claim::value(Value::String("first".into())).with_qualifier(vocab::END_TIME, year_snak(1990)),
            Claim::value(Value::String("last".into())).with_qualifier(vocab::END_TIME, year_snak(2000)),
        ];
        let selected = resolver.select_current(&claims).unwrap();
        assert_eq!(selected.main_value().and_then(Value::as_str), Some("last"));
        assert!(resolver.select_current(&[]).is_none());
    }

    #[test]
    fn test_latest_point_in_time_wins() {
        let claims = vec![
            population("1").with_qualifier(vocab::POINT_IN_TIME, year_snak(2000)),
            population("2").with_qualifier(vocab::POINT_IN_TIME, year_snak(2020)),
            population("3").with_qualifier(vocab::POINT_IN_TIME, year_snak(2010)),
        ];
        assert_eq!(select_latest_by_point_in_time(&claims).and_then(amount), Some("2"));
    }

    #[test]
    fn test_equal_point_in_time_takes_last() {
        let claims = vec![
            population("1").with_qualifier(vocab::POINT_IN_TIME, year_snak(2020)),
            population("2").with_qualifier(vocab::POINT_IN_TIME, year_snak(2020)),
        ];
        assert_eq!(select_latest_by_point_in_time(&claims).and_then(amount), Some("2"));
    }

    #[test]
    fn test_unqualified_claims_take_last() {
        let claims = vec![population("1"), population("2"), population("3")];
        assert_eq!(select_latest_by_point_in_time(&claims).and_then(amount), Some("3"));
    }

    #[test]
    fn test_qualified_beats_unqualified_in_any_order() {
        let claims = vec![
            population("100").with_qualifier(vocab::POINT_IN_TIME, year_snak(2019)),
            population("200"),
        ];
        assert_eq!(select_latest_by_point_in_time(&claims).and_then(amount), Some("100"));
        assert!(select_latest_by_point_in_time(std::iter::empty()).is_none());
    }
}
