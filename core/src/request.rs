//! Search request builders.
//!
//! # Design
//! Builders read a `&SearchState` and return a freshly assembled request;
//! the state is never modified. Each optional field is set only when its
//! state section is present and passes the field's guard, and serializes
//! away entirely otherwise. The visitor id provider and the history store
//! are the only collaborators consulted, and only when analytics is enabled.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AnalyticsConfiguration;
use crate::history::{HistoryEntry, HistoryStore};
use crate::state::SearchState;
use crate::visitor::VisitorIdProvider;

/// Why a search was triggered, forwarded with analytics params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescription {
    pub action_cause: String,
    pub r#type: String,
}

impl EventDescription {
    pub fn new(action_cause: &str) -> Self {
        Self {
            action_cause: action_cause.to_string(),
            r#type: action_cause.to_string(),
        }
    }
}

/// Analytics parameters piggybacked on search requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsParams {
    pub client_id: String,
    pub client_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Map<String, Value>>,
}

/// Payload of `POST /rest/search/v2`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub access_token: String,
    pub organization_id: String,
    pub url: String,
    pub locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_to_include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_field_context: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_query_syntax: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_hub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_criteria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_result: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<Value>>,
}

/// Payload of `POST /rest/search/v2/querySuggest`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuggestRequest {
    pub access_token: String,
    pub organization_id: String,
    pub url: String,
    pub locale: String,
    pub timezone: String,
    pub q: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_hub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsParams>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn non_empty_opt(value: Option<&String>) -> Option<String> {
    value.and_then(|v| non_empty(v))
}

/// Analytics params derived from the analytics configuration.
pub async fn analytics_params(
    analytics: &AnalyticsConfiguration,
    visitor: &dyn VisitorIdProvider,
    event: Option<&EventDescription>,
) -> AnalyticsParams {
    AnalyticsParams {
        client_id: visitor.visitor_id().await,
        client_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        document_referrer: analytics.origin_level3.clone(),
        document_location: analytics.document_location.clone(),
        origin_context: analytics.origin_context.clone(),
        user_agent: analytics.user_agent.clone(),
        tracking_id: analytics.track_id.clone(),
        action_cause: event.map(|e| e.action_cause.clone()),
        custom_data: None,
    }
}

/// Request used by search-and-folding flows (collection loading and the
/// base of every other search request).
pub async fn build_search_and_folding_request(
    state: &SearchState,
    visitor: &dyn VisitorIdProvider,
    history: &dyn HistoryStore,
) -> SearchRequest {
    let config = &state.configuration;
    let mut request = SearchRequest {
        access_token: config.access_token.clone(),
        organization_id: config.organization_id.clone(),
        url: config.search_api_base_url(),
        locale: config.search.locale.clone(),
        debug: state.debug,
        tab: config.analytics.origin_level2.clone(),
        referrer: config.analytics.origin_level3.clone(),
        timezone: config.search.timezone.clone(),
        ..SearchRequest::default()
    };

    if config.analytics.enabled {
        request.visitor_id = Some(visitor.visitor_id().await);
        request.actions_history = Some(history.get_history());
    }

    if let Some(advanced) = &state.advanced_search_queries {
        request.aq = non_empty(&advanced.aq);
        request.cq = non_empty(&advanced.cq);
        request.lq = non_empty(&advanced.lq);
        request.dq = non_empty(&advanced.dq);
    }

    if let Some(context) = &state.context {
        request.context = Some(context.context_values.clone());
    }

    if let Some(fields) = state.fields.as_ref().filter(|f| !f.fetch_all_fields) {
        request.fields_to_include = Some(fields.fields_to_include.clone());
    }

    if let Some(dictionary) = &state.dictionary_field_context {
        request.dictionary_field_context = Some(dictionary.context_values.clone());
    }

    request.pipeline = non_empty_opt(state.pipeline.as_ref());

    if let Some(query) = &state.query {
        request.q = Some(query.q.clone());
        request.enable_query_syntax = Some(query.enable_query_syntax);
    }

    request.search_hub = non_empty_opt(state.search_hub.as_ref());
    request.sort_criteria = non_empty_opt(state.sort_criteria.as_ref());

    if config.analytics.enabled {
        request.analytics = Some(analytics_params(&config.analytics, visitor, None).await);
    }

    request.excerpt_length = state.excerpt_length.as_ref().and_then(|e| e.length);

    tracing::debug!(
        target: "search::request",
        url = %request.url,
        analytics = config.analytics.enabled,
        "Built search request"
    );
    request
}

/// Request for a regular search: the search-and-folding request plus
/// pagination, facets and the triggering event.
pub async fn build_search_request(
    state: &SearchState,
    visitor: &dyn VisitorIdProvider,
    history: &dyn HistoryStore,
    event: Option<&EventDescription>,
) -> SearchRequest {
    let mut request = build_search_and_folding_request(state, visitor, history).await;

    if let Some(pagination) = &state.pagination {
        request.first_result = Some(pagination.first_result);
        request.number_of_results = Some(pagination.number_of_results);
    }

    if let Some(facets) = state.facets.as_ref().filter(|f| !f.is_empty()) {
        request.facets = Some(facets.clone());
    }

    if let (Some(analytics), Some(event)) = (request.analytics.as_mut(), event) {
        analytics.action_cause = Some(event.action_cause.clone());
    }

    request
}

/// Request for the next page, appended after the results already displayed.
pub async fn build_fetch_more_results_request(
    state: &SearchState,
    visitor: &dyn VisitorIdProvider,
    history: &dyn HistoryStore,
    event: Option<&EventDescription>,
) -> SearchRequest {
    let mut request = build_search_request(state, visitor, history, event).await;
    request.first_result = Some(state.results_len);
    request
}

/// Request that only refreshes facet values; no results are returned.
pub async fn build_fetch_facet_values_request(
    state: &SearchState,
    visitor: &dyn VisitorIdProvider,
    history: &dyn HistoryStore,
) -> SearchRequest {
    let mut request = build_search_request(state, visitor, history, None).await;
    request.number_of_results = Some(0);
    request
}

/// Request for the completions of one query-suggest box.
pub async fn build_query_suggest_request(
    id: &str,
    state: &SearchState,
    visitor: &dyn VisitorIdProvider,
    history: &dyn HistoryStore,
) -> QuerySuggestRequest {
    let config = &state.configuration;
    let q = state
        .query_set
        .as_ref()
        .and_then(|set| set.get(id))
        .cloned()
        .unwrap_or_default();
    let count = state
        .query_suggest
        .as_ref()
        .and_then(|boxes| boxes.get(id))
        .map(|section| section.count)
        .unwrap_or_default();

    let mut request = QuerySuggestRequest {
        access_token: config.access_token.clone(),
        organization_id: config.organization_id.clone(),
        url: config.search_api_base_url(),
        locale: config.search.locale.clone(),
        timezone: config.search.timezone.clone(),
        q,
        count,
        tab: config.analytics.origin_level2.clone(),
        referrer: config.analytics.origin_level3.clone(),
        search_hub: non_empty_opt(state.search_hub.as_ref()),
        pipeline: non_empty_opt(state.pipeline.as_ref()),
        context: state.context.as_ref().map(|c| c.context_values.clone()),
        ..QuerySuggestRequest::default()
    };

    if config.analytics.enabled {
        request.visitor_id = Some(visitor.visitor_id().await);
        request.actions_history = Some(history.get_history());
        request.analytics = Some(analytics_params(&config.analytics, visitor, None).await);
    }

    request
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::EngineConfiguration;
    use crate::history::BoundedHistoryStore;
    use crate::state::{
        AdvancedSearchQueries, ContextSection, ExcerptLengthSection, FieldsSection,
        PaginationSection, QuerySuggestSection,
    };
    use crate::visitor::StaticVisitorId;

    /// History store that counts reads.
    #[derive(Default)]
    struct CountingHistory {
        reads: AtomicUsize,
    }

    impl HistoryStore for CountingHistory {
        fn add_element(&self, _entry: HistoryEntry) {}

        fn get_history(&self) -> Vec<HistoryEntry> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    fn config(analytics: bool) -> EngineConfiguration {
        let mut config = EngineConfiguration::new("o", "t");
        config.search.api_base_url = Some("u".to_string());
        config.search.locale = "en".to_string();
        config.search.timezone = "UTC".to_string();
        config.analytics.enabled = analytics;
        config
    }

    fn state(analytics: bool) -> SearchState {
        SearchState::new(Arc::new(config(analytics)))
    }

    fn visitor() -> StaticVisitorId {
        StaticVisitorId("visitor".to_string())
    }

    #[tokio::test]
    async fn minimal_state_yields_only_base_fields() {
        let history = CountingHistory::default();
        let request = build_search_and_folding_request(&state(false), &visitor(), &history).await;
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "accessToken": "t",
                "organizationId": "o",
                "url": "u",
                "locale": "en",
                "timezone": "UTC"
            })
        );
        assert_eq!(history.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analytics_adds_visitor_history_and_params() {
        let history = BoundedHistoryStore::default();
        history.add_element(HistoryEntry::query(Some("earlier")));
        let mut s = state(true);
        s.configuration = Arc::new({
            let mut c = config(true);
            c.analytics.origin_level2 = Some("All".to_string());
            c.analytics.origin_level3 = Some("https://referrer".to_string());
            c
        });

        let request = build_search_and_folding_request(&s, &visitor(), &history).await;
        assert_eq!(request.visitor_id.as_deref(), Some("visitor"));
        assert_eq!(request.actions_history.as_ref().map(Vec::len), Some(1));
        assert_eq!(request.tab.as_deref(), Some("All"));
        assert_eq!(request.referrer.as_deref(), Some("https://referrer"));
        let analytics = request.analytics.unwrap();
        assert_eq!(analytics.client_id, "visitor");
        assert_eq!(analytics.document_referrer.as_deref(), Some("https://referrer"));
    }

    #[tokio::test]
    async fn advanced_queries_skip_empty_expressions() {
        let mut s = state(false);
        s.advanced_search_queries = Some(AdvancedSearchQueries {
            aq: "@filetype==pdf".to_string(),
            cq: String::new(),
            lq: String::new(),
            dq: "@title=\"rust\"".to_string(),
        });
        let request = build_search_and_folding_request(&s, &visitor(), &CountingHistory::default()).await;
        assert_eq!(request.aq.as_deref(), Some("@filetype==pdf"));
        assert!(request.cq.is_none());
        assert!(request.lq.is_none());
        assert_eq!(request.dq.as_deref(), Some("@title=\"rust\""));
    }

    #[tokio::test]
    async fn fetch_all_fields_hides_fields_to_include() {
        let mut s = state(false);
        s.fields = Some(FieldsSection {
            fetch_all_fields: true,
            fields_to_include: vec!["author".to_string()],
        });
        let history = CountingHistory::default();
        let request = build_search_and_folding_request(&s, &visitor(), &history).await;
        assert!(request.fields_to_include.is_none());

        s.fields = Some(FieldsSection {
            fetch_all_fields: false,
            fields_to_include: vec!["author".to_string()],
        });
        let request = build_search_and_folding_request(&s, &visitor(), &history).await;
        assert_eq!(request.fields_to_include, Some(vec!["author".to_string()]));
    }

    #[tokio::test]
    async fn optional_sections_follow_their_guards() {
        let mut s = state(false).with_query("rust");
        let mut context = Map::new();
        context.insert("role".to_string(), json!("admin"));
        s.context = Some(ContextSection {
            context_values: context,
        });
        s.pipeline = Some(String::new());
        s.search_hub = Some("main".to_string());
        s.sort_criteria = Some("date descending".to_string());
        s.excerpt_length = Some(ExcerptLengthSection { length: None });

        let request = build_search_and_folding_request(&s, &visitor(), &CountingHistory::default()).await;
        assert_eq!(request.q.as_deref(), Some("rust"));
        assert_eq!(request.enable_query_syntax, Some(false));
        assert_eq!(request.context.unwrap()["role"], "admin");
        assert!(request.pipeline.is_none());
        assert_eq!(request.search_hub.as_deref(), Some("main"));
        assert_eq!(request.sort_criteria.as_deref(), Some("date descending"));
        assert!(request.excerpt_length.is_none());

        s.excerpt_length = Some(ExcerptLengthSection { length: Some(0) });
        let request = build_search_and_folding_request(&s, &visitor(), &CountingHistory::default()).await;
        assert_eq!(request.excerpt_length, Some(0));
    }

    #[tokio::test]
    async fn building_leaves_state_untouched() {
        let s = state(true).with_query("rust");
        let before = format!("{s:?}");
        let _ = build_search_request(&s, &visitor(), &BoundedHistoryStore::default(), None).await;
        assert_eq!(format!("{s:?}"), before);
    }

    #[tokio::test]
    async fn search_request_adds_pagination_facets_and_event() {
        let mut s = state(true);
        s.pagination = Some(PaginationSection {
            first_result: 20,
            number_of_results: 10,
            total_count_filtered: 100,
        });
        s.facets = Some(vec![json!({"facetId": "author", "field": "author"})]);
        let event = EventDescription::new("searchboxSubmit");

        let request =
            build_search_request(&s, &visitor(), &BoundedHistoryStore::default(), Some(&event)).await;
        assert_eq!(request.first_result, Some(20));
        assert_eq!(request.number_of_results, Some(10));
        assert_eq!(request.facets.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            request.analytics.unwrap().action_cause.as_deref(),
            Some("searchboxSubmit")
        );
    }

    #[tokio::test]
    async fn empty_facet_list_is_omitted() {
        let mut s = state(false);
        s.facets = Some(Vec::new());
        let request = build_search_request(&s, &visitor(), &CountingHistory::default(), None).await;
        assert!(request.facets.is_none());
    }

    #[tokio::test]
    async fn fetch_more_starts_after_displayed_results() {
        let mut s = state(false);
        s.pagination = Some(PaginationSection::default());
        s.results_len = 30;
        let request =
            build_fetch_more_results_request(&s, &visitor(), &CountingHistory::default(), None).await;
        assert_eq!(request.first_result, Some(30));
        assert_eq!(request.number_of_results, Some(10));
    }

    #[tokio::test]
    async fn facet_values_request_asks_for_no_results() {
        let request =
            build_fetch_facet_values_request(&state(false), &visitor(), &CountingHistory::default()).await;
        assert_eq!(request.number_of_results, Some(0));
    }

    #[tokio::test]
    async fn query_suggest_reads_the_box_state() {
        let mut s = state(false);
        s.query_set = Some(BTreeMap::from([("box".to_string(), "ru".to_string())]));
        s.query_suggest = Some(BTreeMap::from([(
            "box".to_string(),
            QuerySuggestSection { count: 3 },
        )]));
        let request = build_query_suggest_request("box", &s, &visitor(), &CountingHistory::default()).await;
        assert_eq!(request.q, "ru");
        assert_eq!(request.count, 3);
        assert!(request.visitor_id.is_none());

        let request = build_query_suggest_request("other", &s, &visitor(), &CountingHistory::default()).await;
        assert_eq!(request.q, "");
        assert_eq!(request.count, 0);
    }
}
