//! Entity model for one record of the knowledge-base dump
//!
//! An [`Entity`] only lives while its record is being processed. Snaks and
//! values are tagged variants so extraction code can pattern-match on them
//! instead of probing JSON fields.

mod parse;

pub use parse::{parse_entity_data, parse_record, ParseError, RawRecord};

use std::collections::HashMap;

/// A parsed dump record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    /// Opaque entity id (e.g. `Q64`)
    pub id: String,
    /// Claims keyed by property id, in dump order
    pub claims: HashMap<String, Vec<Claim>>,
    /// Plain labels keyed by language code
    pub labels: HashMap<String, String>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Claims for a property, empty if the entity has none
    pub fn claims(&self, property: &str) -> &[Claim] {
        self.claims.get(property).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether at least one claim exists for the property
    pub fn has_claim(&self, property: &str) -> bool {
        !self.claims(property).is_empty()
    }

    /// Add a claim (builder style, mostly for tests and fixtures)
    pub fn with_claim(mut self, property: impl Into<String>, claim: Claim) -> Self {
        self.claims.entry(property.into()).or_default().push(claim);
        self
    }

    /// Add a label (builder style)
    pub fn with_label(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.labels.insert(lang.into(), text.into());
        self
    }
}

/// One fact about an entity: a main snak plus optional qualifiers
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub main_snak: Snak,
    pub qualifiers: HashMap<String, Vec<Snak>>,
}

impl Claim {
    pub fn new(main_snak: Snak) -> Self {
        Self {
            main_snak,
            qualifiers: HashMap::new(),
        }
    }

    /// Shorthand for a claim whose main snak holds a value
    pub fn value(value: Value) -> Self {
        Self::new(Snak::Value(value))
    }

    pub fn with_qualifier(mut self, property: impl Into<String>, snak: Snak) -> Self {
        self.qualifiers.entry(property.into()).or_default().push(snak);
        self
    }

    /// First qualifier snak for a property
    pub fn qualifier(&self, property: &str) -> Option<&Snak> {
        self.qualifiers.get(property).and_then(|snaks| snaks.first())
    }

    pub fn has_qualifier(&self, property: &str) -> bool {
        self.qualifier(property).is_some()
    }

    /// The main snak's value, if it has one
    pub fn main_value(&self) -> Option<&Value> {
        self.main_snak.value()
    }
}

/// A typed value slot
#[derive(Debug, Clone, PartialEq)]
pub enum Snak {
    Value(Value),
    NoValue,
    UnknownValue,
}

impl Snak {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Snak::Value(value) => Some(value),
            Snak::NoValue | Snak::UnknownValue => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Snak::Value(_))
    }
}

/// Concrete snak value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain string (codes, identifiers)
    String(String),
    /// Reference to another entity
    EntityId(String),
    /// Decimal amount as written in the dump (`"+1234"`) with its unit
    Quantity { amount: String, unit: String },
    /// Globe coordinate in degrees
    Coordinate { latitude: f64, longitude: f64 },
    /// Text tagged with a language code
    MonolingualText { text: String, language: String },
    /// Timestamp, resolved by the temporal module
    Time(TimeValue),
    /// Any datatype the extractor has no use for
    Other,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity_id(&self) -> Option<&str> {
        match self {
            Value::EntityId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&TimeValue> {
        match self {
            Value::Time(time) => Some(time),
            _ => None,
        }
    }

    /// `(language, text)` of a monolingual text value
    pub fn as_monolingual(&self) -> Option<(&str, &str)> {
        match self {
            Value::MonolingualText { text, language } => Some((language, text)),
            _ => None,
        }
    }
}

/// Raw timestamp as stored in the dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeValue {
    /// Signed calendar string, e.g. `+2020-00-00T00:00:00Z`
    pub time: String,
    /// Offset from UTC in minutes
    pub timezone: i32,
}

impl TimeValue {
    pub fn new(time: impl Into<String>, timezone: i32) -> Self {
        Self {
            time: time.into(),
            timezone,
        }
    }
}
