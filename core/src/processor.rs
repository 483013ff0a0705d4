//! Async search actions: build the request, call the API, map the response.
//!
//! # Design
//! Every action goes `Idle -> InFlight -> Fulfilled | Rejected`. A tagged
//! API error ends in `Outcome::Rejected` carrying the error body untouched and
//! never reaches the mapper; transport failures and payload validation
//! failures are `Err(ApiError)`. Nothing is retried.
//!
//! The analytics mode picks an [`ExecutionStrategy`] once, at the start of
//! the action. The legacy strategy sends the plain search-and-folding style
//! request and returns the raw response without mapping or timing.
//!
//! Each action is stamped with a sequence number per [`SearchOrigin`].
//! Completions are never dropped here; callers use
//! [`SearchProcessor::is_latest`] to discard stale ones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{
    ApiResponse, QuerySuggestCompletion, SearchApi, SearchApiErrorBody, SearchOptions, SearchOrigin,
};
use crate::config::AnalyticsMode;
use crate::error::{required_non_empty_string, ApiError};
use crate::history::{HistoryEntry, HistoryStore};
use crate::mapping::MappingTable;
use crate::request::{
    build_fetch_facet_values_request, build_fetch_more_results_request,
    build_query_suggest_request, build_search_request, EventDescription, SearchRequest,
};
use crate::state::SearchState;
use crate::visitor::VisitorIdProvider;

pub const BROWSE_RESULTS: &str = "browseResults";

/// Caller-supplied rewrite of a mapped search response.
pub type ResponseMiddleware = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Analytics action of the current analytics mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchAction {
    pub action_cause: String,
}

impl SearchAction {
    pub fn new(action_cause: &str) -> Self {
        Self {
            action_cause: action_cause.to_string(),
        }
    }
}

/// Analytics action of the legacy mode. Only its name is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAnalyticsAction {
    pub name: String,
}

/// Both flavours of the action that triggered a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitiveSearchAction {
    pub legacy: LegacyAnalyticsAction,
    pub next: Option<SearchAction>,
}

impl TransitiveSearchAction {
    pub fn new(action_cause: &str) -> Self {
        Self {
            legacy: LegacyAnalyticsAction {
                name: action_cause.to_string(),
            },
            next: Some(SearchAction::new(action_cause)),
        }
    }

    fn event(&self) -> Option<EventDescription> {
        self.next
            .as_ref()
            .map(|action| EventDescription::new(&action.action_cause))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Legacy,
    Current,
}

impl ExecutionStrategy {
    pub fn for_mode(mode: AnalyticsMode) -> Self {
        match mode {
            AnalyticsMode::Legacy => ExecutionStrategy::Legacy,
            AnalyticsMode::Next => ExecutionStrategy::Current,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessorPhase {
    #[default]
    Idle,
    InFlight,
    Fulfilled,
    Rejected,
}

/// Terminal state of one action.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Fulfilled(T),
    Rejected(SearchApiErrorBody),
}

impl<T> Outcome<T> {
    pub fn phase(&self) -> ProcessorPhase {
        match self {
            Outcome::Fulfilled(_) => ProcessorPhase::Fulfilled,
            Outcome::Rejected(_) => ProcessorPhase::Rejected,
        }
    }

    pub fn fulfilled(self) -> Option<T> {
        match self {
            Outcome::Fulfilled(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }
}

/// Result of the current strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSearch {
    pub response: Value,
    pub duration: Duration,
    pub query_executed: String,
    pub request_executed: SearchRequest,
    pub origin: SearchOrigin,
    pub sequence: u64,
}

/// Result of the legacy strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacySearchReturn {
    pub response: Value,
    pub query_executed: String,
    pub analytics_action: String,
    pub origin: SearchOrigin,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteSearchReturn {
    Current(FetchedSearch),
    Legacy(LegacySearchReturn),
}

impl ExecuteSearchReturn {
    pub fn response(&self) -> &Value {
        match self {
            ExecuteSearchReturn::Current(fetched) => &fetched.response,
            ExecuteSearchReturn::Legacy(legacy) => &legacy.response,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            ExecuteSearchReturn::Current(fetched) => fetched.sequence,
            ExecuteSearchReturn::Legacy(legacy) => legacy.sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySuggestPayload {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuggestReturn {
    pub id: String,
    pub q: String,
    pub completions: Vec<QuerySuggestCompletion>,
    pub response_id: Option<String>,
    pub sequence: u64,
}

/// The search actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SearchKind {
    Execute,
    Page,
    MoreResults,
    FacetValues,
}

impl SearchKind {
    fn origin(self) -> SearchOrigin {
        match self {
            SearchKind::FacetValues => SearchOrigin::FacetValues,
            _ => SearchOrigin::MainSearch,
        }
    }

    fn records_history(self) -> bool {
        matches!(self, SearchKind::Execute | SearchKind::Page)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Flight {
    latest: u64,
    phase: ProcessorPhase,
}

/// Runs search actions against injected collaborators.
pub struct SearchProcessor {
    api: Arc<dyn SearchApi>,
    history: Arc<dyn HistoryStore>,
    visitor: Arc<dyn VisitorIdProvider>,
    mappings: Arc<MappingTable>,
    middleware: Option<ResponseMiddleware>,
    flights: Mutex<HashMap<SearchOrigin, Flight>>,
}

impl SearchProcessor {
    pub fn new(
        api: Arc<dyn SearchApi>,
        history: Arc<dyn HistoryStore>,
        visitor: Arc<dyn VisitorIdProvider>,
    ) -> Self {
        Self {
            api,
            history,
            visitor,
            mappings: Arc::new(MappingTable::new()),
            middleware: None,
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_mappings(mut self, mappings: MappingTable) -> Self {
        self.mappings = Arc::new(mappings);
        self
    }

    /// Rewrite every successful response after mapping and before it is
    /// returned. Only the current execution path runs it.
    pub fn with_response_middleware(mut self, middleware: ResponseMiddleware) -> Self {
        self.middleware = Some(middleware);
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Whether `sequence` is the most recent action started for `origin`.
    pub fn is_latest(&self, origin: SearchOrigin, sequence: u64) -> bool {
        self.flights
            .lock()
            .get(&origin)
            .is_some_and(|flight| flight.latest == sequence)
    }

    /// Phase of the most recent action started for `origin`.
    pub fn phase(&self, origin: SearchOrigin) -> ProcessorPhase {
        self.flights
            .lock()
            .get(&origin)
            .map(|flight| flight.phase)
            .unwrap_or_default()
    }

    pub async fn execute_search(
        &self,
        state: &SearchState,
        action: &TransitiveSearchAction,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        self.run(state, SearchKind::Execute, Some(action)).await
    }

    pub async fn fetch_page(
        &self,
        state: &SearchState,
        action: &TransitiveSearchAction,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        self.run(state, SearchKind::Page, Some(action)).await
    }

    pub async fn fetch_more_results(
        &self,
        state: &SearchState,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        self.run(state, SearchKind::MoreResults, None).await
    }

    pub async fn fetch_facet_values(
        &self,
        state: &SearchState,
        action: &TransitiveSearchAction,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        self.run(state, SearchKind::FacetValues, Some(action)).await
    }

    pub async fn fetch_query_suggestions(
        &self,
        state: &SearchState,
        payload: &QuerySuggestPayload,
    ) -> Result<Outcome<QuerySuggestReturn>, ApiError> {
        required_non_empty_string("id", Some(&payload.id))?;

        let origin = SearchOrigin::QuerySuggest;
        let request =
            build_query_suggest_request(&payload.id, state, self.visitor.as_ref(), self.history.as_ref())
                .await;
        let sequence = self.begin(origin);

        let response = self.api.query_suggest(&request).await;
        let outcome = match response {
            Ok(ApiResponse::Error(error)) => Outcome::Rejected(error),
            Ok(ApiResponse::Success(success)) => Outcome::Fulfilled(QuerySuggestReturn {
                id: payload.id.clone(),
                q: request.q,
                completions: success.completions,
                response_id: success.response_id,
                sequence,
            }),
            Err(e) => {
                self.settle(origin, sequence, ProcessorPhase::Rejected);
                return Err(e);
            }
        };
        self.settle(origin, sequence, outcome.phase());
        Ok(outcome)
    }

    /// Record the query in the actions history when analytics is enabled.
    pub fn add_entry_in_actions_history(&self, state: &SearchState) {
        if !state.analytics_enabled() {
            return;
        }
        let q = state.query_text();
        self.history
            .add_element(HistoryEntry::query((!q.is_empty()).then_some(q)));
    }

    async fn run(
        &self,
        state: &SearchState,
        kind: SearchKind,
        action: Option<&TransitiveSearchAction>,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        match ExecutionStrategy::for_mode(state.configuration.analytics.analytics_mode) {
            ExecutionStrategy::Legacy => self.run_legacy(state, kind, action).await,
            ExecutionStrategy::Current => self.run_current(state, kind, action).await,
        }
    }

    async fn run_current(
        &self,
        state: &SearchState,
        kind: SearchKind,
        action: Option<&TransitiveSearchAction>,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        if kind.records_history() {
            self.add_entry_in_actions_history(state);
        }

        let event = match kind {
            SearchKind::MoreResults => Some(EventDescription::new(BROWSE_RESULTS)),
            SearchKind::FacetValues => None,
            SearchKind::Execute | SearchKind::Page => action.and_then(TransitiveSearchAction::event),
        };
        let request = self.build_request(state, kind, event.as_ref()).await;
        let origin = kind.origin();
        let sequence = self.begin(origin);

        let started_at = Instant::now();
        let response = match self.api.query(&request, &SearchOptions::for_origin(origin)).await {
            Ok(response) => response,
            Err(e) => {
                self.settle(origin, sequence, ProcessorPhase::Rejected);
                return Err(e);
            }
        };
        let response = match response {
            ApiResponse::Success(body) => self.mappings.map_body(body),
            ApiResponse::Error(error) => return Ok(self.reject(origin, sequence, error)),
        };
        let response = match &self.middleware {
            Some(middleware) => middleware(response),
            None => response,
        };
        let duration = started_at.elapsed();

        self.settle(origin, sequence, ProcessorPhase::Fulfilled);
        tracing::info!(
            target: "search::processor",
            origin = origin.as_str(),
            sequence,
            duration_ms = duration.as_millis() as u64,
            "Search fulfilled"
        );
        Ok(Outcome::Fulfilled(ExecuteSearchReturn::Current(FetchedSearch {
            response,
            duration,
            query_executed: state.query_text().to_string(),
            request_executed: request,
            origin,
            sequence,
        })))
    }

    async fn run_legacy(
        &self,
        state: &SearchState,
        kind: SearchKind,
        action: Option<&TransitiveSearchAction>,
    ) -> Result<Outcome<ExecuteSearchReturn>, ApiError> {
        if kind.records_history() {
            self.add_entry_in_actions_history(state);
        }

        let analytics_action = match (kind, action) {
            (SearchKind::MoreResults, _) => BROWSE_RESULTS.to_string(),
            (_, Some(action)) => action.legacy.name.clone(),
            (_, None) => String::new(),
        };
        let request = self.build_request(state, kind, None).await;
        let origin = kind.origin();
        let sequence = self.begin(origin);

        let response = match self.api.query(&request, &SearchOptions::for_origin(origin)).await {
            Ok(response) => response,
            Err(e) => {
                self.settle(origin, sequence, ProcessorPhase::Rejected);
                return Err(e);
            }
        };
        let response = match response {
            ApiResponse::Success(body) => body,
            ApiResponse::Error(error) => return Ok(self.reject(origin, sequence, error)),
        };

        self.settle(origin, sequence, ProcessorPhase::Fulfilled);
        tracing::info!(
            target: "search::processor",
            origin = origin.as_str(),
            sequence,
            action = %analytics_action,
            "Legacy search fulfilled"
        );
        Ok(Outcome::Fulfilled(ExecuteSearchReturn::Legacy(LegacySearchReturn {
            response,
            query_executed: state.query_text().to_string(),
            analytics_action,
            origin,
            sequence,
        })))
    }

    async fn build_request(
        &self,
        state: &SearchState,
        kind: SearchKind,
        event: Option<&EventDescription>,
    ) -> SearchRequest {
        let visitor = self.visitor.as_ref();
        let history = self.history.as_ref();
        match kind {
            SearchKind::Execute | SearchKind::Page => {
                build_search_request(state, visitor, history, event).await
            }
            SearchKind::MoreResults => {
                build_fetch_more_results_request(state, visitor, history, event).await
            }
            SearchKind::FacetValues => build_fetch_facet_values_request(state, visitor, history).await,
        }
    }

    /// Enter `InFlight` and hand out the next sequence number for `origin`.
    fn begin(&self, origin: SearchOrigin) -> u64 {
        let mut flights = self.flights.lock();
        let flight = flights.entry(origin).or_default();
        flight.latest += 1;
        flight.phase = ProcessorPhase::InFlight;
        tracing::debug!(target: "search::processor", origin = origin.as_str(), sequence = flight.latest, "In flight");
        flight.latest
    }

    /// Record the terminal phase, unless a newer action has started since.
    fn settle(&self, origin: SearchOrigin, sequence: u64, phase: ProcessorPhase) {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get_mut(&origin).filter(|f| f.latest == sequence) {
            flight.phase = phase;
        }
    }

    fn reject<T>(&self, origin: SearchOrigin, sequence: u64, error: SearchApiErrorBody) -> Outcome<T> {
        self.settle(origin, sequence, ProcessorPhase::Rejected);
        tracing::warn!(
            target: "search::processor",
            origin = origin.as_str(),
            sequence,
            status = error.status_code,
            message = %error.message,
            "Search rejected"
        );
        Outcome::Rejected(error)
    }
}
