use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub unique_id: String,
    pub title: String,
    pub click_uri: String,
    pub excerpt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub total_count: usize,
    pub results: Vec<Document>,
    pub search_uid: Uuid,
    pub duration: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub r#type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub expression: String,
    pub score: f64,
    pub highlighted: String,
    pub executable_confidence: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SuggestResponse {
    pub completions: Vec<Completion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub first_result: usize,
    #[serde(default = "default_number_of_results")]
    pub number_of_results: usize,
}

#[derive(Deserialize)]
pub struct SuggestBody {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationParams {
    pub organization_id: Option<String>,
}

fn default_number_of_results() -> usize {
    10
}

const VOCABULARY: [&str; 8] = [
    "rust",
    "rust async",
    "rust ownership",
    "runtime",
    "search api",
    "search hub",
    "query pipeline",
    "query syntax",
];

pub type Index = Arc<Vec<Document>>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

fn seed() -> Vec<Document> {
    [
        "Rust ownership explained",
        "Async Rust in practice",
        "Search API reference",
        "Query pipeline rules",
        "Facets and sorting",
    ]
    .iter()
    .enumerate()
    .map(|(i, title)| Document {
        unique_id: format!("doc-{i}"),
        title: title.to_string(),
        click_uri: format!("https://docs.example.com/{i}"),
        excerpt: format!("{title}: an introduction."),
    })
    .collect()
}

pub fn app() -> Router {
    app_with_documents(seed())
}

pub fn app_with_documents(documents: Vec<Document>) -> Router {
    let index: Index = Arc::new(documents);
    Router::new()
        .route("/rest/search/v2", post(search))
        .route("/rest/search/v2/querySuggest", post(query_suggest))
        .route("/rest/search/v2/health", get(health))
        .with_state(index)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: &str, kind: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            status_code: status.as_u16(),
            message: message.to_string(),
            r#type: kind.to_string(),
        }),
    )
}

fn authorize(headers: &HeaderMap, params: &OrganizationParams) -> Result<(), (StatusCode, Json<ErrorBody>)> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty());
    match token {
        None => return Err(error(StatusCode::UNAUTHORIZED, "Missing access token", "InvalidTokenException")),
        Some("expired") => {
            return Err(error(
                StatusCode::from_u16(419).unwrap_or(StatusCode::UNAUTHORIZED),
                "Access token expired",
                "ExpiredTokenException",
            ))
        }
        Some(_) => {}
    }
    if params.organization_id.as_deref().map_or(true, str::is_empty) {
        return Err(error(StatusCode::BAD_REQUEST, "Missing organizationId", "InvalidOrganizationException"));
    }
    Ok(())
}

async fn search(
    State(index): State<Index>,
    headers: HeaderMap,
    Query(params): Query<OrganizationParams>,
    Json(body): Json<SearchBody>,
) -> ApiResult<SearchResponse> {
    authorize(&headers, &params)?;
    let needle = body.q.to_lowercase();
    let matching: Vec<&Document> = index
        .iter()
        .filter(|d| d.title.to_lowercase().contains(&needle))
        .collect();
    let results = matching
        .iter()
        .skip(body.first_result)
        .take(body.number_of_results)
        .map(|d| (*d).clone())
        .collect();
    tracing::debug!(q = %body.q, total = matching.len(), "search");
    Ok(Json(SearchResponse {
        total_count: matching.len(),
        results,
        search_uid: Uuid::new_v4(),
        duration: 1,
    }))
}

async fn query_suggest(
    headers: HeaderMap,
    Query(params): Query<OrganizationParams>,
    Json(body): Json<SuggestBody>,
) -> ApiResult<SuggestResponse> {
    authorize(&headers, &params)?;
    let prefix = body.q.to_lowercase();
    let completions = VOCABULARY
        .iter()
        .filter(|word| !prefix.is_empty() && word.starts_with(&prefix))
        .take(body.count.unwrap_or(5))
        .map(|word| Completion {
            expression: word.to_string(),
            score: 1.0,
            highlighted: format!("[{}]{}", &word[..prefix.len()], &word[prefix.len()..]),
            executable_confidence: 1.0,
        })
        .collect();
    Ok(Json(SuggestResponse { completions }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
