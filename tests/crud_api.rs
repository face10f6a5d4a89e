//! End-to-end tests: the full router over `MemoryStore`, driven with `oneshot`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::IntoResponse,
    Router,
};
use crud_api_sdk::{
    allow_access, build_app, common_routes, default_query_all, handler_fn, merge_field, AppState,
    ChangeRecord, CrudRoutes, FilterOp, HttpMethod, JwtVerifier, MemoryStore, MergeField,
    RegistryBuilder, RequestContext, Resource, Rights, Route, ValidationDetails,
};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Note {
    id: u64,
    title: String,
    priority: i64,
    category: String,
    created_date: String,
    owner_id: u64,
    #[serde(skip_deserializing)]
    history: Vec<ChangeRecord>,
}

impl Resource for Note {
    const TRACKS_HISTORY: bool = true;

    fn table_name() -> &'static str {
        "notes"
    }

    fn validate(&self) -> Result<(), ValidationDetails> {
        if self.title.is_empty() {
            return Err(json!({"success": false, "message": "title is required"}));
        }
        Ok(())
    }

    fn orderable_fields() -> &'static [&'static str] {
        &["priority", "title", "created_date"]
    }

    fn filterable_fields() -> &'static [(&'static str, FilterOp)] {
        &[
            ("category", FilterOp::In),
            ("title", FilterOp::Substring),
            ("created_date", FilterOp::Year),
            ("priority", FilterOp::Equals),
        ]
    }

    fn stamp_caller(&mut self, user_id: u64) {
        self.owner_id = user_id;
    }

    fn merge_fields() -> Vec<MergeField<Self>> {
        vec![
            merge_field!(Note, title, "Titre"),
            merge_field!(Note, priority, "Priorité"),
            merge_field!(Note, category, "Catégorie"),
            merge_field!(Note, created_date),
            merge_field!(Note, owner_id, "Auteur"),
        ]
    }

    fn set_history(&mut self, changes: Vec<ChangeRecord>) {
        self.history = changes;
    }
}

fn seed(n: usize) -> MemoryStore {
    MemoryStore::new().with_rows(
        "notes",
        "id",
        (1..=n).map(|i| {
            json!({
                "title": format!("note {}", i),
                "priority": (i % 7) as i64,
                "category": if i % 2 == 0 { "even" } else { "odd" },
                "created_date": if i <= 5 { "2020-01-15" } else { "2021-06-01" },
                "owner_id": 1,
            })
        }),
    )
}

fn app(store: MemoryStore) -> Router {
    let notes = CrudRoutes::<Note>::new()
        .list(Rights::NONE, default_query_all)
        .get(Rights(1), allow_access)
        .create(Rights(1), |_: &RequestContext, note: &Note| note.title != "forbidden")
        .update(Rights(1), |_: &RequestContext, _: &Note, _: &Note| true)
        .delete(Rights(2), allow_access)
        .build()
        .unwrap();
    let boom = Route::new(
        "Boom",
        HttpMethod::Get,
        "/api/boom",
        Rights::NONE,
        handler_fn(|_, _| async {
            let fail = true;
            if fail {
                panic!("boom");
            }
            ().into_response()
        }),
    );
    let registry = RegistryBuilder::new()
        .routes(notes)
        .unwrap()
        .routes(common_routes())
        .unwrap()
        .route(boom)
        .unwrap()
        .with_route_listing(true)
        .build()
        .unwrap();
    build_app(&registry, AppState::new(store, JwtVerifier::new(SECRET)), 1024 * 1024)
}

fn token(rights: u32) -> String {
    JwtVerifier::new(SECRET).issue(7, Rights(rights)).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, rights: Option<u32>, body: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(r) = rights {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token(r)));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn public_route_needs_no_token() {
    let app = app(seed(3));
    let (status, body) = send(&app, Method::GET, "/api/notes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "data returned");
    assert_eq!(body["total_nb_values"], 3);
}

#[tokio::test]
async fn gate_scenarios() {
    let app = app(seed(3));
    let (status, body) = send(&app, Method::GET, "/api/notes/1", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"success": false, "message": "Missing auth token"}));

    let (status, body) = send(&app, Method::GET, "/api/notes/1", Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "note 1");

    let (status, body) = send(&app, Method::DELETE, "/api/notes/1", Some(1), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Authorization required");

    let req = Request::builder()
        .uri("/api/notes/1")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::DELETE, "/api/notes/1", Some(3), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deletion successful");
}

#[tokio::test]
async fn paging_is_echoed() {
    let app = app(seed(25));
    let (status, body) = send(&app, Method::GET, "/api/notes?page=2&pagesize=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_page"], 2);
    assert_eq!(body["size_page"], 10);
    assert_eq!(body["total_nb_values"], 25);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);
    assert_eq!(body["data"][0]["title"], "note 11");

    let (_, body) = send(&app, Method::GET, "/api/notes", None, None).await;
    assert_eq!(body["current_page"], 1);
    assert_eq!(body["size_page"], 20);
}

#[tokio::test]
async fn invalid_paging_is_a_retrieval_error() {
    let app = app(seed(3));
    for query in ["pagesize=0", "page=0", "page=abc", "page=9223372036854775807&pagesize=2"] {
        let (status, body) = send(&app, Method::GET, &format!("/api/notes?{}", query), None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", query);
        assert_eq!(body["message"], "Error while retrieving data");
    }
}

#[tokio::test]
async fn ordering_fails_open() {
    let app = app(seed(10));
    let (status, plain) = send(&app, Method::GET, "/api/notes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    for order in ["bogus_desc", "priority_sideways", "priority", "owner_id_asc"] {
        let (status, body) = send(&app, Method::GET, &format!("/api/notes?order={}", order), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], plain["data"], "{}", order);
    }

    let (_, body) = send(&app, Method::GET, "/api/notes?order=priority_desc", None, None).await;
    let priorities: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["priority"].as_i64().unwrap())
        .collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);
}

#[tokio::test]
async fn filters_are_whitelisted() {
    let app = app(seed(10));
    let (_, body) = send(&app, Method::GET, "/api/notes?owner_id=99&unknown=x", None, None).await;
    assert_eq!(body["total_nb_values"], 10);

    let (_, body) = send(&app, Method::GET, "/api/notes?category=even", None, None).await;
    assert_eq!(body["total_nb_values"], 5);

    let (_, body) = send(&app, Method::GET, "/api/notes?category=even&category=odd&created_date=2020", None, None).await;
    assert_eq!(body["total_nb_values"], 5);

    let (_, body) = send(&app, Method::GET, "/api/notes?title=note%201", None, None).await;
    // "note 1" and "note 10"
    assert_eq!(body["total_nb_values"], 2);

    let (_, body) = send(&app, Method::GET, "/api/notes?category=x'%20OR%201=1--", None, None).await;
    assert_eq!(body["total_nb_values"], 0);
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let app = app(seed(2));
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/notes",
        Some(1),
        Some(r#"{"title":"fresh","priority":4,"category":"odd"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["message"], "success");
    let id = created["data"]["id"].as_u64().unwrap();
    assert_eq!(id, 3);
    assert_eq!(created["data"]["owner_id"], 7);

    let (status, fetched) = send(&app, Method::GET, &format!("/api/notes/{}", id), Some(1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["title"], "fresh");
    assert_eq!(fetched["data"]["priority"], 4);
}

#[tokio::test]
async fn create_rejections() {
    let app = app(seed(1));
    let (status, body) = send(&app, Method::POST, "/api/notes", Some(1), Some("{oops")).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert!(body["message"].as_str().unwrap().starts_with("Error : "));

    let (status, body) = send(&app, Method::POST, "/api/notes", Some(1), Some(r#"{"priority":1}"#)).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body, json!({"success": false, "message": "title is required"}));

    let (status, body) = send(&app, Method::POST, "/api/notes", Some(1), Some(r#"{"title":"forbidden"}"#)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden");

    let (_, body) = send(&app, Method::GET, "/api/notes", None, None).await;
    assert_eq!(body["total_nb_values"], 1);
}

#[tokio::test]
async fn partial_update_records_one_change() {
    let app = app(seed(1));
    let (status, body) = send(&app, Method::PUT, "/api/notes/1", Some(1), Some(r#"{"priority":6}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "note 1");
    assert_eq!(body["data"]["priority"], 6);
    // Stored owner 1, caller 7: attribution moves but is not a recorded change.
    assert_eq!(body["data"]["owner_id"], 7);
    assert_eq!(
        body["data"]["history"],
        json!([{"field": "Priorité", "oldValue": "1", "newValue": "6"}])
    );
}

#[tokio::test]
async fn unknown_and_non_numeric_ids_are_not_found() {
    let app = app(seed(1));
    let (status, _) = send(&app, Method::GET, "/api/notes/abc", Some(1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/notes/999", Some(1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not Found");

    let (status, _) = send(&app, Method::PUT, "/api/notes/999", Some(1), Some(r#"{"priority":2}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn panics_become_internal_errors() {
    let app = app(seed(0));
    let (status, body) = send(&app, Method::GET, "/api/boom", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn route_listing_and_health() {
    let app = app(seed(0));
    let (status, body) = send(&app, Method::GET, "/api/routes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let routes = body["data"].as_array().unwrap();
    assert!(routes.contains(&json!({
        "name": "DeleteNotes",
        "method": "DELETE",
        "pattern": "/api/notes/{id}",
        "auth": 2
    })));

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
