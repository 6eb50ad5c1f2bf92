use std::sync::{Arc, Mutex};

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracklog_infra::{Filter, RestClient, RestError};

#[derive(Clone, Default)]
struct Seen {
    queries: Arc<Mutex<Vec<String>>>,
    keys: Arc<Mutex<Vec<String>>>,
}

async fn start_server() -> (String, Seen, tokio::task::JoinHandle<()>) {
    let seen = Seen::default();

    async fn list(
        State(seen): State<Seen>,
        headers: HeaderMap,
        RawQuery(q): RawQuery,
    ) -> Json<Value> {
        seen.queries.lock().unwrap().push(q.unwrap_or_default());
        if let Some(key) = headers.get("apikey").and_then(|v| v.to_str().ok()) {
            seen.keys.lock().unwrap().push(key.to_string());
        }
        Json(json!([{ "id": 1, "name": "Ada" }, { "id": 2, "name": "Grace" }]))
    }

    async fn create(Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
        body["id"] = json!(55);
        (StatusCode::CREATED, Json(json!([body])))
    }

    async fn update(RawQuery(q): RawQuery, Json(mut body): Json<Value>) -> Json<Value> {
        let q = q.unwrap_or_default();
        if q.contains("404") {
            return Json(json!([]));
        }
        body["id"] = json!(7);
        Json(json!([body]))
    }

    async fn remove(RawQuery(q): RawQuery) -> Json<Value> {
        if q.unwrap_or_default().contains("eq.7") {
            Json(json!([{ "id": 7 }]))
        } else {
            Json(json!([]))
        }
    }

    let app = Router::new()
        .route(
            "/rest/v1/people",
            get(list).post(create).patch(update).delete(remove),
        )
        .route(
            "/rest/v1/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/rest/v1"), seen, handle)
}

#[tokio::test]
async fn select_sends_filters_and_api_key() {
    let (base, seen, _server) = start_server().await;
    let client = RestClient::new(reqwest::Client::new(), &base)
        .unwrap()
        .with_api_key("secret")
        .with_rate_limit(100);

    let rows: Vec<Value> = client
        .select("people", &[Filter::eq("archived", false)])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let queries = seen.queries.lock().unwrap().clone();
    assert_eq!(queries, vec!["select=*&archived=eq.false".to_string()]);
    assert_eq!(seen.keys.lock().unwrap().clone(), vec!["secret".to_string()]);
}

#[tokio::test]
async fn writes_return_the_stored_row() {
    let (base, _seen, _server) = start_server().await;
    let client = RestClient::new(reqwest::Client::new(), &base).unwrap();

    let created: Value = client
        .insert("people", &json!({ "name": "Ada" }))
        .await
        .unwrap();
    assert_eq!(created["id"], 55);
    assert_eq!(created["name"], "Ada");

    let updated: Value = client
        .update("people", 7, &json!({ "name": "Ada L." }))
        .await
        .unwrap();
    assert_eq!(updated["name"], "Ada L.");

    let missing = client
        .update::<_, Value>("people", 404, &json!({ "name": "x" }))
        .await
        .unwrap_err();
    assert!(missing.is_not_found());

    assert!(client.delete("people", 7).await.unwrap());
    assert!(!client.delete("people", 8).await.unwrap());
}

#[tokio::test]
async fn server_errors_and_bad_bodies_are_distinguished() {
    let (base, _seen, _server) = start_server().await;
    let client = RestClient::new(reqwest::Client::new(), &base).unwrap();

    let err = client.select::<Value>("broken", &[]).await.unwrap_err();
    assert!(matches!(err, RestError::Status { status: 500, .. }));

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Strict {
        id: i64,
        missing_column: String,
    }
    let err = client.select::<Strict>("people", &[]).await.unwrap_err();
    assert!(matches!(err, RestError::Decode(_)));
}
