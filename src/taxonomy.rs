//! Taxonomy service client
//!
//! Loads, for a root class, every class transitively derived from it via
//! "subclass of". Classification only consumes the resulting id sets, so
//! this runs once before streaming begins and any failure is fatal.

use crate::classify::{Taxonomies, TaxonomySet};
use crate::config::TaxonomyConfig;
use crate::vocab;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json;charset=utf-8";

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("invalid taxonomy endpoint '{0}': {1}")]
    Endpoint(String, url::ParseError),

    #[error("taxonomy request for {root} failed: {source}")]
    Request {
        root: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("taxonomy service returned {status} for {root}")]
    Status {
        root: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed taxonomy response for {root}: {source}")]
    Malformed {
        root: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Debug, Deserialize)]
struct SparqlBinding {
    s: SparqlTerm,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    value: String,
}

/// Graph-pattern query for every transitive subclass of `root`
pub fn subclass_query(root: &str) -> String {
    format!(
        "SELECT ?s WHERE {{ ?s wdt:{}+ wd:{} . }}",
        vocab::SUBCLASS_OF,
        root
    )
}

/// Entity id from the trailing path segment of an entity URI
fn id_from_uri(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let id = url.path_segments()?.last()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Extract the id set from a raw query response body.
///
/// Bindings whose value is not a URI with a path are dropped.
pub fn parse_response(root: &str, body: &[u8]) -> Result<TaxonomySet, TaxonomyError> {
    let response: SparqlResponse =
        serde_json::from_slice(body).map_err(|source| TaxonomyError::Malformed {
            root: root.to_string(),
            source,
        })?;

    Ok(TaxonomySet::new(
        response
            .results
            .bindings
            .into_iter()
            .filter_map(|binding| id_from_uri(&binding.s.value)),
    ))
}

/// Client for the SPARQL taxonomy endpoint
pub struct TaxonomyClient {
    client: Client,
    endpoint: Url,
}

impl TaxonomyClient {
    pub fn new(config: &TaxonomyConfig, user_agent: &str) -> Result<Self, TaxonomyError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| TaxonomyError::Endpoint(config.endpoint.clone(), e))?;
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| TaxonomyError::Request {
                root: String::new(),
                source,
            })?;
        Ok(Self { client, endpoint })
    }

    /// The closure of `root`, including `root` itself
    pub async fn closure(&self, root: &str) -> Result<TaxonomySet, TaxonomyError> {
        debug!("Loading subclasses of {}", root);

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("query", &subclass_query(root));

        let request_error = |source: reqwest::Error| TaxonomyError::Request {
            root: root.to_string(),
            source,
        };
        let response = self
            .client
            .get(url)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TaxonomyError::Status {
                root: root.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        let mut set = parse_response(root, &body)?;
        set.insert(root);

        debug!("Loaded {} subclasses of {}", set.len(), root);
        Ok(set)
    }

    /// Closures for every role; the language set is the single fixed class
    pub async fn load(&self, config: &TaxonomyConfig) -> Result<Taxonomies, TaxonomyError> {
        let country = self.closure(&config.country_root).await?;
        let territorial_entity = self.closure(&config.territorial_entity_root).await?;
        let human_settlement = self.closure(&config.human_settlement_root).await?;
        let language = TaxonomySet::new([config.language_class.as_str()]);

        info!(
            "Loaded taxonomies: {} country, {} territorial entity, {} human settlement classes",
            country.len(),
            territorial_entity.len(),
            human_settlement.len()
        );

        Ok(Taxonomies {
            country,
            territorial_entity,
            human_settlement,
            language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_mentions_root() {
        assert_eq!(
            subclass_query("Q486972"),
            "SELECT ?s WHERE { ?s wdt:P279+ wd:Q486972 . }"
        );
    }

    #[test]
    fn test_parse_response_takes_trailing_segment() {
        let body = br#"{
            "head": {"vars": ["s"]},
            "results": {"bindings": [
                {"s": {"type": "uri", "value": "http://www.wikidata.org/entity/Q515"}},
                {"s": {"type": "uri", "value": "http://www.wikidata.org/entity/Q5119"}},
                {"s": {"type": "literal", "value": "not a uri"}}
            ]}
        }"#;

        let set = parse_response("Q486972", body).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("Q515"));
        assert!(set.contains("Q5119"));
    }

    #[test]
    fn test_malformed_response_is_an_error() {
        let err = parse_response("Q6256", br#"{"results": {}}"#).unwrap_err();
        assert!(matches!(err, TaxonomyError::Malformed { ref root, .. } if root == "Q6256"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = TaxonomyConfig {
            endpoint: "::".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            TaxonomyClient::new(&config, "test"),
            Err(TaxonomyError::Endpoint(..))
        ));
    }
}
