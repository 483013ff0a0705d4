//! Client-side state sections read by the request builders.
//!
//! Only `configuration` is required; every other section may be absent and
//! the builders include the matching request fields only when it is present.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::EngineConfiguration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySection {
    pub q: String,
    #[serde(default)]
    pub enable_query_syntax: bool,
}

/// Advanced query expressions. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedSearchQueries {
    #[serde(default)]
    pub aq: String,
    #[serde(default)]
    pub cq: String,
    #[serde(default)]
    pub lq: String,
    #[serde(default)]
    pub dq: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSection {
    pub context_values: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryFieldContextSection {
    pub context_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsSection {
    #[serde(default)]
    pub fetch_all_fields: bool,
    #[serde(default)]
    pub fields_to_include: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcerptLengthSection {
    #[serde(default)]
    pub length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSection {
    pub first_result: u32,
    pub number_of_results: u32,
    #[serde(default)]
    pub total_count_filtered: u64,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            first_result: 0,
            number_of_results: 10,
            total_count_filtered: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySuggestSection {
    pub count: u32,
}

impl Default for QuerySuggestSection {
    fn default() -> Self {
        Self { count: 5 }
    }
}

/// Snapshot of everything a search action may read.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub configuration: Arc<EngineConfiguration>,
    pub debug: Option<bool>,
    pub query: Option<QuerySection>,
    pub advanced_search_queries: Option<AdvancedSearchQueries>,
    pub context: Option<ContextSection>,
    pub dictionary_field_context: Option<DictionaryFieldContextSection>,
    pub fields: Option<FieldsSection>,
    pub pipeline: Option<String>,
    pub search_hub: Option<String>,
    pub sort_criteria: Option<String>,
    pub excerpt_length: Option<ExcerptLengthSection>,
    pub pagination: Option<PaginationSection>,
    /// Facet requests, already in wire shape.
    pub facets: Option<Vec<Value>>,
    /// Query-suggest box id to the text typed in it.
    pub query_set: Option<BTreeMap<String, String>>,
    pub query_suggest: Option<BTreeMap<String, QuerySuggestSection>>,
    /// Number of results currently displayed.
    pub results_len: u32,
}

impl SearchState {
    /// Fresh state; `search_hub` and `pipeline` start from the configuration.
    pub fn new(configuration: Arc<EngineConfiguration>) -> Self {
        Self {
            pipeline: configuration.search.pipeline.clone(),
            search_hub: configuration.search.search_hub.clone(),
            configuration,
            debug: None,
            query: None,
            advanced_search_queries: None,
            context: None,
            dictionary_field_context: None,
            fields: None,
            sort_criteria: None,
            excerpt_length: None,
            pagination: None,
            facets: None,
            query_set: None,
            query_suggest: None,
            results_len: 0,
        }
    }

    pub fn with_query(mut self, q: &str) -> Self {
        self.query = Some(QuerySection {
            q: q.to_string(),
            enable_query_syntax: false,
        });
        self
    }

    /// The query string, or `""` when no query section exists.
    pub fn query_text(&self) -> &str {
        self.query.as_ref().map(|q| q.q.as_str()).unwrap_or("")
    }

    pub fn analytics_enabled(&self) -> bool {
        self.configuration.analytics.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_text_defaults_to_empty() {
        let state = SearchState::new(Arc::new(EngineConfiguration::new("o", "t")));
        assert_eq!(state.query_text(), "");
        assert_eq!(state.with_query("hello").query_text(), "hello");
    }

    #[test]
    fn new_state_inherits_hub_and_pipeline() {
        let mut config = EngineConfiguration::new("o", "t");
        config.search.search_hub = Some("support".to_string());
        config.search.pipeline = Some("agents".to_string());
        let state = SearchState::new(Arc::new(config));
        assert_eq!(state.search_hub.as_deref(), Some("support"));
        assert_eq!(state.pipeline.as_deref(), Some("agents"));
    }

    #[test]
    fn advanced_queries_default_to_empty_strings() {
        let aq: AdvancedSearchQueries = serde_json::from_str(r#"{"cq":"@source==web"}"#).unwrap();
        assert_eq!(aq.cq, "@source==web");
        assert!(aq.aq.is_empty());
    }
}
