//! HTTP surface tests
//!
//! Drives the real router with in-process requests: authentication,
//! the ingest -> build -> query -> ask flow, clamping behavior, and
//! error shapes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use graphmind::config::ServerConfig;
use graphmind::handlers::router::build_router;
use graphmind::handlers::state::AppContext;

const TOKEN: &str = "test-token";
const BOUNDARY: &str = "graphmind-test-boundary";

fn spawn_app() -> (Router, TempDir) {
    let temp = TempDir::new().expect("temp dir");
    let config = ServerConfig {
        auth_token: TOKEN.to_string(),
        ..ServerConfig::default()
    };
    let state = Arc::new(AppContext::with_data_dir(config, temp.path()).expect("app context"));
    (build_router(state), temp)
}

fn authed(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = authed(Request::builder().method("GET").uri(uri))
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = authed(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json"),
    )
    .body(Body::from(body.to_string()))
    .expect("request");
    send(app, request).await
}

fn multipart_upload(files: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"urls\"\r\n\r\n[]\r\n--{BOUNDARY}--\r\n"
    ));

    authed(
        Request::builder()
            .method("POST")
            .uri("/api/ingest/jobs")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ),
    )
    .body(Body::from(body))
    .expect("request")
}

/// Poll a status endpoint until the given field reaches a terminal
/// value.
async fn wait_for_status(app: &Router, uri: &str, expected: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = get_json(app, uri).await;
        assert_eq!(status, StatusCode::OK, "polling {uri}: {body}");
        let current = body["status"].as_str().unwrap_or_default().to_string();
        if current == expected {
            return body;
        }
        if current == "failed" {
            panic!("unexpected failure while polling {uri}: {body}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {expected} at {uri}");
}

/// Upload a small corpus and build its graph, returning the job id.
async fn ingest_and_build(app: &Router) -> String {
    let (status, body) = send(
        app,
        multipart_upload(&[(
            "ml.txt",
            "Machine Learning powers modern recommendation engines. \
             Machine Learning depends on training data. \
             Neural Networks extend Machine Learning with deep architectures.",
        )]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let job_id = body["job_id"].as_str().expect("job id").to_string();

    wait_for_status(app, &format!("/api/ingest/jobs/{job_id}"), "completed").await;

    let (status, body) = post_json(app, "/api/graph/build", json!({ "ingest_job_id": job_id })).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let sync_id = body["sync_id"].as_str().expect("sync id").to_string();
    assert_eq!(body["status"], "pending");

    wait_for_status(app, &format!("/api/graph/build/{sync_id}"), "completed").await;
    job_id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_is_public() {
    let (app, _temp) = spawn_app();

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_api_requires_bearer_token() {
    let (app, _temp) = spawn_app();

    let request = Request::builder()
        .method("GET")
        .uri("/api/graph/summary")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("GET")
        .uri("/api/graph/summary")
        .header(header::AUTHORIZATION, "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_json(&app, "/api/graph/summary").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_ingestion_payload_rejected() {
    let (app, _temp) = spawn_app();

    let (status, body) = send(&app, multipart_upload(&[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_job_and_sync_are_404() {
    let (app, _temp) = spawn_app();

    let (status, _) = get_json(&app, "/api/ingest/jobs/no-such-job").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/api/graph/build/no-such-sync").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        post_json(&app, "/api/graph/build", json!({ "ingest_job_id": "missing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_ingest_build_query_flow() {
    let (app, _temp) = spawn_app();
    ingest_and_build(&app).await;

    // Summary reflects the built graph
    let (status, summary) = get_json(&app, "/api/graph/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert!(summary["nodes_by_label"]["Concept"].as_u64().unwrap() > 0);
    assert!(summary["total_relationships"].as_u64().unwrap() > 0);

    // Concept search finds the merged concept
    let (status, found) = get_json(&app, "/api/graph/search?q=machine%20learning&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let concepts = found["concepts"].as_array().unwrap();
    assert_eq!(concepts.len(), 1);
    let concept_id = concepts[0]["id"].as_str().unwrap().to_string();

    // Subgraph query around the concept, with the fixed layout seed
    let (status, subgraph) = post_json(
        &app,
        "/api/graph/subgraph",
        json!({ "concept_ids": [concept_id], "max_hops": 2, "max_nodes": 50 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(subgraph["layout_seed"], 42);
    assert!(!subgraph["nodes"].as_array().unwrap().is_empty());

    // Node detail returns provenance back to the source document
    let (status, detail) = get_json(&app, &format!("/api/graph/nodes/{concept_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["provenance"]["source_count"].as_u64().unwrap(), 1);
    assert_eq!(detail["provenance"]["documents"][0]["source_uri"], "ml.txt");

    // Ask a question with evidence
    let (status, answer) = post_json(
        &app,
        "/api/qa/ask",
        json!({ "question": "What is machine learning?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(answer["answer"].as_str().unwrap().contains("Machine Learning"));
    assert!(!answer["evidence"]["node_ids"].as_array().unwrap().is_empty());
    assert!(!answer["evidence"]["document_ids"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rebuild_of_completed_job_allowed() {
    let (app, _temp) = spawn_app();
    let job_id = ingest_and_build(&app).await;

    // A second build for a completed job is allowed (idempotent re-run).
    // The previous build releases its slot just after flipping the sync
    // to completed, so tolerate a brief 409 window.
    let mut created = None;
    for _ in 0..50 {
        let (status, body) =
            post_json(&app, "/api/graph/build", json!({ "ingest_job_id": job_id })).await;
        if status == StatusCode::CONFLICT {
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }
        assert_eq!(status, StatusCode::CREATED, "{body}");
        created = Some(body);
        break;
    }
    let body = created.expect("rebuild accepted");
    let sync_id = body["sync_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &format!("/api/graph/build/{sync_id}"), "completed").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subgraph_rejects_unknown_relation_type() {
    let (app, _temp) = spawn_app();

    let (status, body) = post_json(
        &app,
        "/api/graph/subgraph",
        json!({ "relation_types": ["NOT_A_RELATION"] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_empty_query_is_empty() {
    let (app, _temp) = spawn_app();
    ingest_and_build(&app).await;

    let (status, body) = get_json(&app, "/api/graph/search?q=&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["concepts"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_question_rejected() {
    let (app, _temp) = spawn_app();

    let (status, body) = post_json(&app, "/api/qa/ask", json!({ "question": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_match_question_logs_one_ok_entry() {
    let (app, _temp) = spawn_app();
    ingest_and_build(&app).await;

    let (status, body) = post_json(
        &app,
        "/api/qa/ask",
        json!({ "question": "zebra quasar spectroscopy" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .contains("couldn't find any relevant information"));
    assert!(body["evidence"]["node_ids"].as_array().unwrap().is_empty());
    assert!(body["evidence"]["edge_ids"].as_array().unwrap().is_empty());
    assert!(body["evidence"]["document_ids"].as_array().unwrap().is_empty());

    let (status, logs) = get_json(&app, "/api/qa/logs").await;
    assert_eq!(status, StatusCode::OK);
    let entries = logs["logs"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "ok");
    assert_eq!(entries[0]["question"], "zebra quasar spectroscopy");
    assert_eq!(entries[0]["evidence_counts"]["nodes"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_qa_logs_accumulate_newest_first() {
    let (app, _temp) = spawn_app();
    ingest_and_build(&app).await;

    for question in ["first question", "second question", "third question"] {
        let (status, _) = post_json(&app, "/api/qa/ask", json!({ "question": question })).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, logs) = get_json(&app, "/api/qa/logs?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let entries = logs["logs"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["question"], "third question");
    assert_eq!(entries[1]["question"], "second question");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_return_subgraph_option() {
    let (app, _temp) = spawn_app();
    ingest_and_build(&app).await;

    let (status, body) = post_json(
        &app,
        "/api/qa/ask",
        json!({
            "question": "What is machine learning?",
            "options": { "return_subgraph": true, "max_hops": 99 }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(!body["subgraph"]["nodes"].as_array().unwrap().is_empty());
}
