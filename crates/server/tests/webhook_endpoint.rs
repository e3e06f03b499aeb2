//! End-to-end tests for the webhook endpoint: signature enforcement,
//! acknowledgement semantics, and the inbound upsert behind it.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use db::{
    DBService,
    models::{
        board::{Board, CreateBoard},
        task::{Task, TaskStatus},
    },
    test_utils::create_test_pool,
};
use secrecy::SecretString;
use server::{Deployment, routes};
use services::services::{config::SyncConfig, github::signature::sign};
use sqlx::SqlitePool;
use tower::util::ServiceExt;
use uuid::Uuid;

const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const WEBHOOK_SECRET: &str = "webhook-secret";

fn secret() -> SecretString {
    SecretString::from(WEBHOOK_SECRET.to_string())
}

fn test_deployment(pool: &SqlitePool) -> Deployment {
    let config = SyncConfig::from_parts(KEY_HEX, WEBHOOK_SECRET).expect("valid test config");
    Deployment::from_parts(DBService::from_pool(pool.clone()), config)
}

async fn create_synced_board(deployment: &Deployment, repo: &str) -> Board {
    let pool = &deployment.db().pool;
    let board = Board::create(
        pool,
        &CreateBoard {
            name: "Synced".to_string(),
        },
        Uuid::new_v4(),
    )
    .await
    .expect("Failed to create board");

    let encrypted = deployment
        .vault()
        .encrypt(&SecretString::from("ghp_test_token".to_string()))
        .expect("Failed to encrypt token");

    Board::set_github_sync(pool, board.id, &encrypted, repo, None, None)
        .await
        .expect("Failed to enable sync")
}

fn issue_body(action: &str, number: i64, labels: &[&str]) -> Vec<u8> {
    let labels: Vec<serde_json::Value> = labels
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "action": action,
        "issue": {
            "number": number,
            "title": "Webhook issue",
            "body": "from the tracker",
            "state": "open",
            "labels": labels
        },
        "repository": { "full_name": "acme/widgets" }
    }))
    .unwrap()
}

fn webhook_request(event: &str, body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", event);
    if let Some(sig) = signature {
        builder = builder.header("x-hub-signature-256", sig);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_signed_delivery_creates_task() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let board = create_synced_board(&deployment, "acme/widgets").await;
    let app: Router = routes::router(deployment);

    let body = issue_body("opened", 40, &["in-progress"]);
    let signature = sign(&body, &secret());
    let response = app
        .oneshot(webhook_request("issues", body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["event"], "issues");
    assert_eq!(json["action"], "opened");

    let task_id: Uuid = serde_json::from_value(json["task_id"].clone()).unwrap();
    let task = Task::find_by_id(&pool, task_id).await.unwrap().unwrap();
    assert_eq!(task.board_id, board.id);
    assert_eq!(task.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_without_writes() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let board = create_synced_board(&deployment, "acme/widgets").await;
    let app: Router = routes::router(deployment);

    let body = issue_body("opened", 41, &[]);
    // Signature computed over a different body.
    let signature = sign(b"something else", &secret());
    let response = app
        .oneshot(webhook_request("issues", body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let tasks = Task::find_by_board_id(&pool, board.id).await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_missing_signature_header_is_rejected() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let app: Router = routes::router(deployment);

    let body = issue_body("opened", 42, &[]);
    let response = app
        .oneshot(webhook_request("issues", body, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_on_webhook_path_is_method_not_allowed() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let app: Router = routes::router(deployment);

    let request = Request::builder()
        .method("GET")
        .uri("/api/webhooks/github")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_event_type_is_acknowledged() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let app: Router = routes::router(deployment);

    let body = b"{}".to_vec();
    let signature = sign(&body, &secret());
    let response = app
        .oneshot(webhook_request("workflow_run", body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["message"], "not implemented");
}

#[tokio::test]
async fn test_duplicate_delivery_results_in_one_task() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let board = create_synced_board(&deployment, "acme/widgets").await;
    let app: Router = routes::router(deployment);

    let body = issue_body("opened", 43, &[]);
    let signature = sign(&body, &secret());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(webhook_request(
                "issues",
                body.clone(),
                Some(signature.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let tasks = Task::find_by_board_id(&pool, board.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn test_health_endpoint_reports_ok() {
    let (pool, _temp_dir) = create_test_pool().await;
    let deployment = test_deployment(&pool);
    let app: Router = routes::router(deployment);

    let request = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database_ready"], true);
}
