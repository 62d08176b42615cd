//! End-to-end HTTP tests against in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracker_core::{Application, Comment, NaiveDate, RecordingEventSink, Ticket};
use tracker_runtime::{PublisherConfig, TrackerServices};
use tracker_testing::{InMemoryStorage, StaticTagSource, TagQuery, init_tracing};
use tracker_web::{AppState, CORRELATION_ID_HEADER, build_router};

struct Harness {
    server: TestServer,
    storage: InMemoryStorage,
    sink: RecordingEventSink,
    tags: StaticTagSource,
    services: TrackerServices,
}

fn harness_with_tags(tags: StaticTagSource) -> Harness {
    init_tracing();
    let storage = InMemoryStorage::new();
    let sink = RecordingEventSink::new();
    let services = TrackerServices::new(
        Arc::new(storage.clone()),
        Arc::new(sink.clone()),
        Arc::new(tags.clone()),
        PublisherConfig::default(),
    );
    let server = TestServer::new(build_router(AppState::new(services.clone()))).unwrap();

    Harness {
        server,
        storage,
        sink,
        tags,
        services,
    }
}

fn harness() -> Harness {
    harness_with_tags(StaticTagSource::default())
}

async fn create_ticket(server: &TestServer) -> i64 {
    let response = server
        .post("/api/ticket")
        .json(&json!({"title": "Login broken", "description": "SSO loops"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let location = response.header("location");
    let location = location.to_str().unwrap();
    location
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
        .expect("location ends with the ticket id")
}

async fn create_application(server: &TestServer, name: &str) -> Application {
    let response = server
        .post("/api/application")
        .json(&json!({"name": name, "description": "payments", "owner": "Kate Williams"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn health_reports_ok_with_a_correlation_id() {
    let h = harness();

    let response = h.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
    let correlation_id = response.header(CORRELATION_ID_HEADER);
    assert!(!correlation_id.is_empty());
}

#[tokio::test]
async fn metrics_without_a_recorder_is_unavailable() {
    let h = harness();

    let response = h.server.get("/metrics").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn created_ticket_is_readable_at_its_location() {
    let h = harness();
    let id = create_ticket(&h.server).await;

    let ticket: Ticket = h.server.get(&format!("/api/ticket/{id}")).await.json();

    assert_eq!(ticket.id.get(), id);
    assert_eq!(ticket.title, "Login broken");
}

#[tokio::test]
async fn five_comments_are_listed_and_published() {
    let h = harness();
    let ticket_id = create_ticket(&h.server).await;

    for i in 1..=5 {
        let response = h
            .server
            .post("/api/comments/add")
            .json(&json!({"ticketId": ticket_id, "commentText": format!("Comment {i}"), "userId": 1}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let comments: Vec<Comment> = h
        .server
        .get("/api/comments")
        .add_query_param("ticketId", ticket_id)
        .await
        .json();
    let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(
        bodies,
        ["Comment 1", "Comment 2", "Comment 3", "Comment 4", "Comment 5"]
    );

    assert!(h.sink.wait_for(5, Duration::from_secs(2)).await);
    h.services.shutdown().await;
    assert_eq!(h.sink.len(), 5);
    assert!(h.sink.sent().iter().all(|sent| sent.topic == "comment-events"));
}

#[tokio::test]
async fn comment_on_unknown_ticket_is_not_found_and_not_published() {
    let h = harness();

    let response = h
        .server
        .post("/api/comments/add")
        .json(&json!({"ticketId": 404, "commentText": "hello?", "userId": 1}))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.sink.is_empty());
    assert_eq!(h.storage.comment_count().await, 0);
}

#[tokio::test]
async fn listing_comments_of_unknown_ticket_is_not_found() {
    let h = harness();

    let response = h
        .server
        .get("/api/comments")
        .add_query_param("ticketId", 99)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_comment_is_unprocessable() {
    let h = harness();
    let ticket_id = create_ticket(&h.server).await;

    let response = h
        .server
        .post("/api/comments/add")
        .json(&json!({"ticketId": ticket_id, "commentText": "   ", "userId": 1}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.storage.comment_count().await, 0);
}

#[tokio::test]
async fn duplicate_application_name_conflicts_and_keeps_the_original() {
    let h = harness();
    let original = create_application(&h.server, "billing").await;

    let response = h
        .server
        .post("/api/application")
        .json(&json!({"name": "billing", "description": "other", "owner": "someone else"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let stored: Application = h
        .server
        .get(&format!("/api/application/{}", original.id))
        .await
        .json();
    assert_eq!(stored, original);
    assert_eq!(stored.owner, "Kate Williams");
}

#[tokio::test]
async fn release_view_correlates_tags_for_linked_applications() {
    let h = harness_with_tags(StaticTagSource::new(["billing-2.4.0", "ledger-1.9.2"]));

    let release: Value = h
        .server
        .post("/api/release")
        .json(&json!({"releaseDate": "2024-09-15"}))
        .await
        .json();
    let release_id = release["id"].as_i64().unwrap();
    let billing = create_application(&h.server, "billing").await;
    let ledger = create_application(&h.server, "ledger").await;

    for app in [&billing, &ledger] {
        let response = h
            .server
            .put(&format!("/api/release/{release_id}/application/{}", app.id))
            .await;
        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    }

    let view: Value = h.server.get(&format!("/api/release/{release_id}")).await.json();

    assert_eq!(view["releaseDate"], "2024-09-15");
    assert_eq!(view["gitTags"], json!(["billing-2.4.0", "ledger-1.9.2"]));
    assert_eq!(view["applications"].as_array().unwrap().len(), 2);
    assert_eq!(
        h.tags.queries(),
        vec![TagQuery {
            anchor: NaiveDate::from_ymd_opt(2024, 9, 15).unwrap(),
            repositories: vec!["billing".to_string(), "ledger".to_string()],
        }]
    );
}

#[tokio::test]
async fn attaching_twice_answers_no_content_and_links_once() {
    let h = harness();
    let release: Value = h
        .server
        .post("/api/release")
        .json(&json!({"releaseDate": "2024-01-10"}))
        .await
        .json();
    let release_id = release["id"].as_i64().unwrap();
    let app = create_application(&h.server, "billing").await;
    let path = format!("/api/release/{release_id}/application/{}", app.id);

    assert_eq!(h.server.put(&path).await.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(h.server.put(&path).await.status_code(), StatusCode::NO_CONTENT);

    assert_eq!(h.storage.link_count().await, 1);
}

#[tokio::test]
async fn attaching_to_unknown_release_is_not_found() {
    let h = harness();
    let app = create_application(&h.server, "billing").await;

    let response = h
        .server
        .put(&format!("/api/release/41/application/{}", app.id))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_release_is_not_found() {
    let h = harness();

    let response = h.server.get("/api/release/7").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(h.tags.queries().is_empty());
}
