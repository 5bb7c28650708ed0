// 🌐 HTTP API - raw data files + filtered views over the core
//
// GET /data/persons.json, /data/filters.json   raw payloads (loader source)
// GET /api/health
// GET /api/persons                              name-sorted persons
// GET /api/filters                              filters with their index
// GET /api/visible?active=0,2                   visible persons for that active set
//
// The active set travels with each request; nothing is kept between calls.

use crate::engine::visible_persons;
use crate::error::FilterError;
use crate::filter::{Filter, FilterId, FilterStore};
use crate::person::{Person, PersonStore};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::warn;

/// Shared, read-only application state
pub struct AppState {
    pub persons: PersonStore,
    pub filters: FilterStore,
    pub data_dir: PathBuf,
}

/// API Response wrapper
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VisibleQuery {
    /// Comma-separated filter indexes
    pub active: Option<String>,
}

/// Parse "0,2, 5" into ids. Empty segments are skipped.
pub fn parse_active(raw: &str) -> Result<BTreeSet<FilterId>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map(FilterId)
                .map_err(|_| format!("invalid filter index '{}'", s))
        })
        .collect()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/persons - All persons in name order
async fn get_persons(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Person>>> {
    Json(ApiResponse::ok(state.persons.sorted().to_vec()))
}

/// GET /api/filters - All filters in load order
async fn get_filters(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Filter>>> {
    Json(ApiResponse::ok(state.filters.all_filters().to_vec()))
}

/// GET /api/visible?active=... - Persons visible for the given active set
async fn get_visible(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VisibleQuery>,
) -> Response {
    let active = match parse_active(query.active.as_deref().unwrap_or("")) {
        Ok(active) => active,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<Vec<Person>>::err(message)),
            )
                .into_response()
        }
    };
    // Indices with no loaded filter are dropped
    let active: BTreeSet<FilterId> = active
        .into_iter()
        .filter(|id| state.filters.get(*id).is_some())
        .collect();

    match visible_persons(state.persons.sorted(), state.filters.all_filters(), &active) {
        Ok(persons) => (StatusCode::OK, Json(ApiResponse::ok(persons))).into_response(),
        Err(e @ FilterError::FieldMissing { .. }) => {
            warn!("Error computing visible persons: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::<Vec<Person>>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the full router over `state`
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/persons", get(get_persons))
        .route("/filters", get(get_filters))
        .route("/visible", get(get_visible))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/data", ServeDir::new(&state.data_dir))
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RawFilter;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn test_state(data_dir: PathBuf) -> Arc<AppState> {
        let persons = PersonStore::with_persons(vec![
            Person {
                state: Some("IL".to_string()),
                ..Person::new("Bob", "Zephyr")
            },
            Person {
                state: Some("MA".to_string()),
                ..Person::new("Amy", "Adams")
            },
        ]);

        let raw = |description: &str, field: &str, value: &str| RawFilter {
            description: description.to_string(),
            criteria: BTreeMap::from([(field.to_string(), value.to_string())]),
        };
        let filters = FilterStore::with_filters(vec![
            raw("Illinois", "state", "il"),
            raw("Broken", "email", "x"),
        ]);

        Arc::new(AppState {
            persons,
            filters,
            data_dir,
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_parse_active() {
        let ids = parse_active("2, 0,,2").unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![FilterId(0), FilterId(2)]);

        assert!(parse_active("").unwrap().is_empty());
        assert!(parse_active("1,x").is_err());
    }

    #[tokio::test]
    async fn test_persons_are_sorted() {
        let app = build_router(test_state(PathBuf::from("data")));

        let (status, body) = get_json(app, "/api/persons").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["lastName"], "Adams");
        assert_eq!(body["data"][1]["lastName"], "Zephyr");
    }

    #[tokio::test]
    async fn test_filters_carry_index() {
        let app = build_router(test_state(PathBuf::from("data")));

        let (_, body) = get_json(app, "/api/filters").await;

        assert_eq!(body["data"][1]["index"], 1);
        assert_eq!(body["data"][1]["description"], "Broken");
    }

    #[tokio::test]
    async fn test_visible_without_active_is_everyone() {
        let app = build_router(test_state(PathBuf::from("data")));

        let (status, body) = get_json(app, "/api/visible").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_visible_with_active_filter() {
        let app = build_router(test_state(PathBuf::from("data")));

        let (status, body) = get_json(app, "/api/visible?active=0").await;

        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["firstName"], "Bob");
    }

    #[tokio::test]
    async fn test_visible_missing_field_is_422() {
        let app = build_router(test_state(PathBuf::from("data")));

        let (status, body) = get_json(app, "/api/visible?active=1").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn test_visible_unknown_index_is_ignored() {
        let app = build_router(test_state(PathBuf::from("data")));
        let (status, body) = get_json(app, "/api/visible?active=99").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let app = build_router(test_state(PathBuf::from("data")));
        let (status, body) = get_json(app, "/api/visible?active=0,99").await;

        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["firstName"], "Bob");
    }

    #[tokio::test]
    async fn test_visible_bad_index_is_400() {
        let app = build_router(test_state(PathBuf::from("data")));

        let (status, _) = get_json(app, "/api/visible?active=abc").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_serves_raw_data_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("filters.json"), r#"[{"description": "x"}]"#).unwrap();
        let app = build_router(test_state(dir.path().to_path_buf()));

        let (status, body) = get_json(app, "/data/filters.json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["description"], "x");
    }
}
