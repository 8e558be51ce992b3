use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use axum_test::TestServer;
use serde_json::{json, Value};

use jornada_academica::api::{create_router, AppState};
use jornada_academica::database::Database;
use jornada_academica::session_gate::PortalClient;
use jornada_academica::study_service::StudyService;

const GOOD_TOKEN: &str = "token-valido-123";

/// In-process stand-in for the login portal.
async fn spawn_stub_portal() -> String {
    let app = Router::new().route(
        "/api/verify-session",
        post(|Json(body): Json<Value>| async move {
            let valid = body["token"].as_str() == Some(GOOD_TOKEN);
            Json(json!({ "valid": valid }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}

async fn create_gated_server(portal_url: &str) -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let state = AppState {
        service: StudyService::new(db, false),
        session_verifier: Some(Arc::new(PortalClient::new(portal_url))),
    };
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_gate_disabled_leaves_api_open() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let state = AppState {
        service: StudyService::new(db, false),
        session_verifier: None,
    };
    let server = TestServer::new(create_router(state)).unwrap();

    server.get("/api/estudos").await.assert_status_ok();
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let portal = spawn_stub_portal().await;
    let server = create_gated_server(&portal).await;

    let response = server.get("/api/estudos").await;
    response.assert_status_unauthorized();
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let portal = spawn_stub_portal().await;
    let server = create_gated_server(&portal).await;

    server
        .get("/api/estudos")
        .add_header("x-session-token", "token-errado")
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_valid_token_reaches_api() {
    let portal = spawn_stub_portal().await;
    let server = create_gated_server(&portal).await;

    server
        .get("/api/estudos")
        .add_header("x-session-token", GOOD_TOKEN)
        .await
        .assert_status_ok();

    // Writes pass the same gate.
    server
        .post("/api/estudos")
        .add_header("x-session-token", GOOD_TOKEN)
        .json(&json!({ "curso": "Cálculo", "conteudo": "Limites" }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn test_unreachable_portal_closes_the_gate() {
    // Nothing listens here.
    let server = create_gated_server("http://127.0.0.1:1").await;

    server
        .get("/api/estudos")
        .add_header("x-session-token", GOOD_TOKEN)
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_health_and_root_bypass_the_gate() {
    let server = create_gated_server("http://127.0.0.1:1").await;

    server.get("/health").await.assert_status_ok();
    server.get("/").await.assert_status_ok();
}
