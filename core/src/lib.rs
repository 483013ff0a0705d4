//! Request shaping and async action processing for a hosted search API.
//!
//! # Overview
//! Builds search payloads from client state, sends them through a pluggable
//! transport, maps the JSON responses into the shape the state expects and
//! wraps the whole exchange in async actions that end fulfilled or rejected.
//!
//! # Design
//! - Builders are pure over `&SearchState`; the visitor id provider and the
//!   history store are injected, never global.
//! - The API client keeps the host-does-IO split: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`, a `Transport` sits
//!   in between.
//! - Tagged API errors are data (`Outcome::Rejected`); `ApiError` is reserved
//!   for validation, configuration and transport failures.

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod mapping;
pub mod processor;
pub mod request;
pub mod state;
pub mod transport;
pub mod visitor;

pub use client::{
    is_error_response, ApiResponse, HttpSearchApi, QuerySuggestCompletion, QuerySuggestResponse,
    SearchApi, SearchApiClient, SearchApiErrorBody, SearchOptions, SearchOrigin,
};
pub use config::{AnalyticsMode, EngineConfiguration, PlatformEnvironment};
pub use error::ApiError;
pub use history::{BoundedHistoryStore, HistoryEntry, HistoryStore};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mapping::{map_search_response, MappingTable};
pub use processor::{
    ExecuteSearchReturn, ExecutionStrategy, FetchedSearch, LegacySearchReturn, Outcome,
    ProcessorPhase, QuerySuggestPayload, QuerySuggestReturn, ResponseMiddleware, SearchAction,
    SearchProcessor, TransitiveSearchAction,
};
pub use request::{EventDescription, QuerySuggestRequest, SearchRequest};
pub use state::SearchState;
pub use transport::{Transport, UreqTransport};
pub use visitor::{SessionVisitorId, StaticVisitorId, VisitorIdProvider};
