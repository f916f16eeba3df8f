//! Record parser
//!
//! The dump is a JSON array written one element per line. Empty objects
//! and claim maps are serialized as `[]` rather than `{}`, so map-valued
//! fields accept both.

use super::{Claim, Entity, Snak, TimeValue, Value};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// One candidate entity line with the array separator removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    bytes: Vec<u8>,
}

impl RawRecord {
    /// Build a record from one dump line.
    ///
    /// Strips the trailing `,` separator. Returns `None` for lines that hold
    /// no entity: empty lines and the `[` / `]` array delimiters.
    pub fn from_line(line: &[u8]) -> Option<Self> {
        let mut end = line.len();
        while end > 0 && line[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        if end > 0 && line[end - 1] == b',' {
            end -= 1;
        }
        let mut start = 0;
        while start < end && line[start].is_ascii_whitespace() {
            start += 1;
        }

        let body = &line[start..end];
        match body {
            b"" | b"[" | b"]" => None,
            _ => Some(Self {
                bytes: body.to_vec(),
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Soft failure: the record is skipped, the stream continues
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse one raw record into an [`Entity`]
pub fn parse_record(record: &RawRecord) -> Result<Entity, ParseError> {
    let raw: RawEntity = serde_json::from_slice(record.as_bytes())?;
    Ok(raw.into())
}

/// Parse an entity-data document, `{"entities": {"Q64": {...}}}`.
///
/// A redirected id comes back under its target's id.
pub fn parse_entity_data(body: &[u8]) -> Result<Vec<Entity>, ParseError> {
    let data: RawEntityData = serde_json::from_slice(body)?;
    let mut entities: Vec<Entity> = data.entities.into_values().map(Entity::from).collect();
    entities.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(entities)
}

#[derive(Deserialize)]
struct RawEntityData {
    entities: HashMap<String, RawEntity>,
}

#[derive(Deserialize)]
struct RawEntity {
    id: String,
    #[serde(default, deserialize_with = "map_or_empty_seq")]
    claims: HashMap<String, Vec<RawClaim>>,
    #[serde(default, deserialize_with = "map_or_empty_seq")]
    labels: HashMap<String, RawLabel>,
}

#[derive(Deserialize)]
struct RawClaim {
    mainsnak: RawSnak,
    #[serde(default, deserialize_with = "map_or_empty_seq")]
    qualifiers: HashMap<String, Vec<RawSnak>>,
}

#[derive(Deserialize)]
struct RawSnak {
    snaktype: String,
    #[serde(default)]
    datavalue: Option<RawDataValue>,
}

#[derive(Deserialize)]
struct RawDataValue {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct RawLabel {
    language: String,
    value: String,
}

#[derive(Deserialize)]
struct RawEntityId {
    id: String,
}

#[derive(Deserialize)]
struct RawQuantity {
    amount: String,
    unit: String,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawMonolingual {
    text: String,
    language: String,
}

#[derive(Deserialize)]
struct RawTime {
    time: String,
    #[serde(default)]
    timezone: i32,
}

impl From<RawEntity> for Entity {
    fn from(raw: RawEntity) -> Self {
        let claims = raw
            .claims
            .into_iter()
            .map(|(property, claims)| (property, claims.into_iter().map(Claim::from).collect()))
            .collect();
        let labels = raw
            .labels
            .into_values()
            .map(|label| (label.language, label.value))
            .collect();

        Entity {
            id: raw.id,
            claims,
            labels,
        }
    }
}

impl From<RawClaim> for Claim {
    fn from(raw: RawClaim) -> Self {
        Claim {
            main_snak: raw.mainsnak.into(),
            qualifiers: raw
                .qualifiers
                .into_iter()
                .map(|(property, snaks)| (property, snaks.into_iter().map(Snak::from).collect()))
                .collect(),
        }
    }
}

impl From<RawSnak> for Snak {
    fn from(raw: RawSnak) -> Self {
        match raw.snaktype.as_str() {
            "novalue" => Snak::NoValue,
            "somevalue" => Snak::UnknownValue,
            _ => match raw.datavalue {
                Some(datavalue) => Snak::Value(datavalue.into()),
                // a value snak without a datavalue carries nothing usable
                None => Snak::UnknownValue,
            },
        }
    }
}

impl From<RawDataValue> for Value {
    fn from(raw: RawDataValue) -> Self {
        let RawDataValue { kind, value } = raw;
        let converted = match kind.as_str() {
            "string" => serde_json::from_value::<String>(value).map(Value::String),
            "wikibase-entityid" => {
                serde_json::from_value::<RawEntityId>(value).map(|v| Value::EntityId(v.id))
            }
            "quantity" => serde_json::from_value::<RawQuantity>(value).map(|v| Value::Quantity {
                amount: v.amount,
                unit: v.unit,
            }),
            "globecoordinate" => {
                serde_json::from_value::<RawCoordinate>(value).map(|v| Value::Coordinate {
                    latitude: v.latitude,
                    longitude: v.longitude,
                })
            }
            "monolingualtext" => {
                serde_json::from_value::<RawMonolingual>(value).map(|v| Value::MonolingualText {
                    text: v.text,
                    language: v.language,
                })
            }
            "time" => serde_json::from_value::<RawTime>(value)
                .map(|v| Value::Time(TimeValue::new(v.time, v.timezone))),
            _ => return Value::Other,
        };
        converted.unwrap_or(Value::Other)
    }
}

fn map_or_empty_seq<'de, D, T>(deserializer: D) -> Result<HashMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct MapOrEmptySeq<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for MapOrEmptySeq<T> {
        type Value = HashMap<String, T>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map or an empty array")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = HashMap::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry()? {
                out.insert(key, value);
            }
            Ok(out)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            if seq.next_element::<IgnoredAny>()?.is_some() {
                return Err(de::Error::invalid_length(1, &self));
            }
            Ok(HashMap::new())
        }
    }

    deserializer.deserialize_any(MapOrEmptySeq(PhantomData))
}
