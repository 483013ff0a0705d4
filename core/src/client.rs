//! Search API client: request building, response parsing and the async
//! collaborator the processor talks to.
//!
//! # Design
//! `SearchApiClient` is stateless apart from its user agent. Each endpoint
//! is split into a `build_*` method producing an `HttpRequest` and a
//! `parse_*` method consuming an `HttpResponse`. `HttpSearchApi` glues the
//! two halves to a [`Transport`] and implements [`SearchApi`], the trait the
//! processor depends on.
//!
//! A non-2xx response whose body carries `statusCode` and `message` is the
//! API's tagged error and parses into `ApiResponse::Error`; anything else
//! that is not a success is an `ApiError`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::{QuerySuggestRequest, SearchRequest};
use crate::transport::Transport;

/// Fields the client moves out of the JSON body (into the URL or headers).
const ENVELOPE_FIELDS: [&str; 3] = ["accessToken", "organizationId", "url"];

/// Machine-readable error body returned by the search API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchApiErrorBody {
    pub status_code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,
}

/// A response tagged as success or API error.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse<T> {
    Success(T),
    Error(SearchApiErrorBody),
}

impl<T> ApiResponse<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error(_))
    }
}

/// Discriminator between success and error payloads.
pub fn is_error_response<T>(response: &ApiResponse<T>) -> bool {
    response.is_error()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuggestCompletion {
    pub expression: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub highlighted: String,
    #[serde(default)]
    pub executable_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuggestResponse {
    #[serde(default)]
    pub completions: Vec<QuerySuggestCompletion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

/// Which part of the UI a search was issued for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchOrigin {
    #[default]
    MainSearch,
    FacetValues,
    FoldingCollection,
    QuerySuggest,
}

impl SearchOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchOrigin::MainSearch => "mainSearch",
            SearchOrigin::FacetValues => "facetValues",
            SearchOrigin::FoldingCollection => "foldingCollection",
            SearchOrigin::QuerySuggest => "querySuggest",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub origin: SearchOrigin,
}

impl SearchOptions {
    pub fn for_origin(origin: SearchOrigin) -> Self {
        Self { origin }
    }
}

/// Stateless request builder and response parser for the search API.
#[derive(Debug, Clone)]
pub struct SearchApiClient {
    user_agent: String,
}

impl Default for SearchApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchApiClient {
    pub fn new() -> Self {
        Self {
            user_agent: format!("search-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn build_query(
        &self,
        request: &SearchRequest,
        _options: &SearchOptions,
    ) -> Result<HttpRequest, ApiError> {
        let url = format!(
            "{}?{}",
            request.url.trim_end_matches('/'),
            organization_query(&request.organization_id)
        );
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: self.headers(&request.access_token),
            body: Some(envelope_body(request)?),
        })
    }

    pub fn build_query_suggest(&self, request: &QuerySuggestRequest) -> Result<HttpRequest, ApiError> {
        let url = format!(
            "{}/querySuggest?{}",
            request.url.trim_end_matches('/'),
            organization_query(&request.organization_id)
        );
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: self.headers(&request.access_token),
            body: Some(envelope_body(request)?),
        })
    }

    pub fn parse_query(&self, response: HttpResponse) -> Result<ApiResponse<Value>, ApiError> {
        parse_tagged(response)
    }

    pub fn parse_query_suggest(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<QuerySuggestResponse>, ApiError> {
        parse_tagged(response)
    }

    fn headers(&self, access_token: &str) -> Vec<(String, String)> {
        vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("authorization".to_string(), format!("Bearer {access_token}")),
            ("user-agent".to_string(), self.user_agent.clone()),
        ]
    }
}

fn organization_query(organization_id: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("organizationId", organization_id)
        .finish()
}

/// Serialize `payload`, dropping the fields that travel outside the body.
fn envelope_body<T: Serialize>(payload: &T) -> Result<String, ApiError> {
    let mut value =
        serde_json::to_value(payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
    if let Value::Object(object) = &mut value {
        for field in ENVELOPE_FIELDS {
            object.remove(field);
        }
    }
    serde_json::to_string(&value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn parse_tagged<T: DeserializeOwned>(response: HttpResponse) -> Result<ApiResponse<T>, ApiError> {
    if response.is_success() {
        return serde_json::from_str(&response.body)
            .map(ApiResponse::Success)
            .map_err(|e| ApiError::DeserializationError(e.to_string()));
    }
    match serde_json::from_str::<SearchApiErrorBody>(&response.body) {
        Ok(error) => Ok(ApiResponse::Error(error)),
        Err(_) => Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        }),
    }
}

/// Remote search API as seen by the processor.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn query(
        &self,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<ApiResponse<Value>, ApiError>;

    async fn query_suggest(
        &self,
        request: &QuerySuggestRequest,
    ) -> Result<ApiResponse<QuerySuggestResponse>, ApiError>;
}

/// [`SearchApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSearchApi<T> {
    client: SearchApiClient,
    transport: T,
}

impl<T: Transport> HttpSearchApi<T> {
    pub fn new(transport: T) -> Self {
        Self {
            client: SearchApiClient::new(),
            transport,
        }
    }
}

#[async_trait]
impl<T: Transport> SearchApi for HttpSearchApi<T> {
    async fn query(
        &self,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<ApiResponse<Value>, ApiError> {
        let http = self.client.build_query(request, options)?;
        tracing::debug!(target: "search::client", url = %http.url, origin = options.origin.as_str(), "Sending query");
        let response = self.transport.execute(http).await?;
        self.client.parse_query(response)
    }

    async fn query_suggest(
        &self,
        request: &QuerySuggestRequest,
    ) -> Result<ApiResponse<QuerySuggestResponse>, ApiError> {
        let http = self.client.build_query_suggest(request)?;
        tracing::debug!(target: "search::client", url = %http.url, "Sending query suggest");
        let response = self.transport.execute(http).await?;
        self.client.parse_query_suggest(response)
    }
}
