//! Taxonomy service configuration

use serde::{Deserialize, Serialize};

use crate::vocab;

/// Query endpoint and the root classes whose closures drive classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// SPARQL endpoint
    pub endpoint: String,
    pub country_root: String,
    pub territorial_entity_root: String,
    pub human_settlement_root: String,
    /// Used as-is; languages are not expanded through the service
    pub language_class: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://query.wikidata.org/sparql".to_string(),
            country_root: vocab::COUNTRY_CLASS.to_string(),
            territorial_entity_root: vocab::TERRITORIAL_ENTITY_CLASS.to_string(),
            human_settlement_root: vocab::HUMAN_SETTLEMENT_CLASS.to_string(),
            language_class: vocab::LANGUAGE_CLASS.to_string(),
            timeout_secs: 300,
        }
    }
}
