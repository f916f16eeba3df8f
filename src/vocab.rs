//! Fixed Wikidata vocabulary consumed by the extractor
//!
//! These ids are not configurable: the extraction rules are written
//! against their meaning.

/// instance of
pub const INSTANCE_OF: &str = "P31";
/// subclass of (only used by the taxonomy query)
pub const SUBCLASS_OF: &str = "P279";
/// ISO 3166-1 alpha-2 code
pub const ISO_CODE: &str = "P297";
/// located in the administrative territorial entity
pub const LOCATED_IN: &str = "P131";
/// official language
pub const OFFICIAL_LANGUAGE: &str = "P37";
/// Wikimedia language code
pub const LANGUAGE_CODE: &str = "P424";
/// country
pub const COUNTRY: &str = "P17";
/// population
pub const POPULATION: &str = "P1082";
/// coordinate location
pub const COORDINATE_LOCATION: &str = "P625";
/// native label
pub const NATIVE_LABEL: &str = "P1705";
/// official name
pub const OFFICIAL_NAME: &str = "P1448";

// Qualifiers
/// point in time
pub const POINT_IN_TIME: &str = "P585";
/// start time
pub const START_TIME: &str = "P580";
/// end time
pub const END_TIME: &str = "P582";
/// applies to part
pub const APPLIES_TO_PART: &str = "P518";
/// number of female population
pub const FEMALE_POPULATION: &str = "P1539";
/// number of male population
pub const MALE_POPULATION: &str = "P1540";

/// Qualifiers that restrict a population figure to part of the population.
pub const PARTIAL_POPULATION_QUALIFIERS: [&str; 3] =
    [APPLIES_TO_PART, FEMALE_POPULATION, MALE_POPULATION];

// Taxonomy roots
/// country
pub const COUNTRY_CLASS: &str = "Q6256";
/// administrative territorial entity
pub const TERRITORIAL_ENTITY_CLASS: &str = "Q56061";
/// human settlement
pub const HUMAN_SETTLEMENT_CLASS: &str = "Q486972";
/// language
pub const LANGUAGE_CLASS: &str = "Q34770";

/// Unit of a dimensionless quantity
pub const UNITLESS: &str = "1";
