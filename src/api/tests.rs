use super::build_router;
use crate::{
    config::Config,
    db::{Database, DonationQueries, DonationStatus},
    test_support, DonateApp,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app_with(config: Config) -> DonateApp {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    DonateApp::with_database(config, db)
}

async fn app() -> DonateApp {
    app_with(test_support::config()).await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_with_header(uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

fn admin_bearer() -> String {
    format!("Bearer {}", test_support::ADMIN_TOKEN)
}

fn webhook_body(order_id: &str, transaction_status: &str, gross_amount: &str) -> Value {
    json!({
        "order_id": order_id,
        "transaction_status": transaction_status,
        "status_code": "200",
        "gross_amount": gross_amount,
        "signature_key": test_support::sign(order_id, "200", gross_amount),
    })
}

#[tokio::test]
async fn test_health() {
    let router = build_router(app().await);
    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database_connected"], true);
}

#[tokio::test]
async fn test_register_and_fetch_creator() {
    let router = build_router(app().await);

    let (status, body) = send(
        &router,
        with_json(Method::POST, "/v1/creators", json!({ "username": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["username"], "alice");

    let (status, _) = send(
        &router,
        with_json(Method::POST, "/v1/creators", json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&router, get("/v1/creators/alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["display_name"], "alice");

    let (status, body) = send(&router, get("/v1/creators/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_donation_settlement_end_to_end() {
    let app = app().await;
    let mut events = app.notifier.subscribe();
    test_support::creator(&app.db, "alice").await;
    let router = build_router(app.clone());

    let (status, body) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/creators/alice/donations",
            json!({ "donor_name": "Budi", "message": "Mantap", "amount": 50000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "PENDING");
    let merchant_ref = body["data"]["merchant_ref"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/webhook/payment",
            webhook_body(&merchant_ref, "settlement", "50000.00"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "updated");
    assert_eq!(body["data"]["to"], "PAID");

    let (_, body) = send(&router, get(&format!("/v1/donations/{}", merchant_ref))).await;
    assert_eq!(body["data"]["status"], "PAID");

    let event = events.try_recv().unwrap();
    assert_eq!(event.name, "Budi");
    assert!(events.try_recv().is_err());

    let (status, body) = send(&router, get("/v1/creators/alice/donations?per_page=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["total_pages"], 1);
}

#[tokio::test]
async fn test_webhook_rejections_leave_status() {
    let app = app().await;
    test_support::creator(&app.db, "alice").await;
    let router = build_router(app.clone());

    let (_, body) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/creators/alice/donations",
            json!({ "donor_name": "Budi", "amount": 50000 }),
        ),
    )
    .await;
    let merchant_ref = body["data"]["merchant_ref"].as_str().unwrap().to_string();

    let mut forged = webhook_body(&merchant_ref, "settlement", "50000.00");
    forged["signature_key"] = json!("00".repeat(64));
    let (status, _) = send(
        &router,
        with_json(Method::POST, "/v1/webhook/payment", forged),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/webhook/payment",
            webhook_body(&merchant_ref, "settlement", "10000.00"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&router, get(&format!("/v1/donations/{}", merchant_ref))).await;
    assert_eq!(body["data"]["status"], "PENDING");
}

#[tokio::test]
async fn test_cron_archive_requires_secret() {
    let app = app().await;
    let creator = test_support::creator(&app.db, "alice").await;
    let aged = test_support::donation(
        &app.db,
        &creator,
        "Budi",
        10_000,
        DonationStatus::Paid,
        Utc::now() - Duration::days(5),
    )
    .await;
    let router = build_router(app.clone());

    let (status, _) = send(&router, post_with_header("/v1/jobs/archive", "x-other", "1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &router,
        post_with_header("/v1/jobs/archive", "x-cron-secret", "wrong"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        post_with_header("/v1/jobs/archive", "x-cron-secret", test_support::CRON_SECRET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["archived"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["donations_archived"], 1);
    assert!(body.get("data").is_none());

    let history = DonationQueries::new(&app.db)
        .get_history(&aged.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.archive_reason, "aged");

    let (_, body) = send(
        &router,
        post_with_header("/v1/jobs/archive", "x-cron-secret", test_support::CRON_SECRET),
    )
    .await;
    assert_eq!(body["archived"], 0);
}

#[tokio::test]
async fn test_cron_without_configured_secret_is_server_error() {
    let mut config = test_support::config();
    config.jobs.cron_secret = None;
    let router = build_router(app_with(config).await);

    let (status, body) = send(
        &router,
        post_with_header("/v1/jobs/leaderboard", "x-cron-secret", "anything"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_cron_leaderboard_run() {
    let app = app().await;
    test_support::creator(&app.db, "alice").await;
    let router = build_router(app);

    let (status, body) = send(
        &router,
        post_with_header(
            "/v1/jobs/leaderboard",
            "x-cron-secret",
            test_support::CRON_SECRET,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failed"], 0);
    assert!(body["updated"].as_u64().unwrap() >= 1);

    let (status, body) = send(&router, get("/v1/leaderboard/alice/current")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_finalized"], false);
}

#[tokio::test]
async fn test_admin_archive_threshold_override() {
    let app = app().await;
    let creator = test_support::creator(&app.db, "alice").await;
    test_support::donation(
        &app.db,
        &creator,
        "Budi",
        10_000,
        DonationStatus::Paid,
        Utc::now() - Duration::hours(3),
    )
    .await;
    let router = build_router(app);

    let (status, body) = send(
        &router,
        post_with_header(
            "/v1/admin/jobs/archive?threshold_hours=9223372036854775807",
            "authorization",
            &admin_bearer(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let (status, body) = send(
        &router,
        post_with_header(
            "/v1/admin/jobs/archive?threshold_hours=1",
            "authorization",
            &admin_bearer(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["archived"], 1);
}

#[tokio::test]
async fn test_admin_leaderboard_finalize() {
    let app = app().await;
    let creator = test_support::creator(&app.db, "alice").await;
    test_support::donation(
        &app.db,
        &creator,
        "Budi",
        10_000,
        DonationStatus::Paid,
        chrono::DateTime::parse_from_rfc3339("2025-01-10T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc),
    )
    .await;
    let router = build_router(app);

    let (status, _) = send(
        &router,
        post_with_header(
            "/v1/admin/leaderboard/alice/2025/1/finalize",
            "authorization",
            "Bearer wrong",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &router,
        post_with_header(
            "/v1/admin/leaderboard/alice/2025/1/finalize",
            "authorization",
            &admin_bearer(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["finalized"], true);

    let (_, body) = send(
        &router,
        post_with_header(
            "/v1/admin/leaderboard/alice/2025/1/refresh",
            "authorization",
            &admin_bearer(),
        ),
    )
    .await;
    assert_eq!(body["data"]["frozen"], true);
    assert_eq!(body["data"]["board"]["total_amount"], 10_000);

    let (status, body) = send(&router, get("/v1/leaderboard/alice/2025/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["top_donors"][0]["donor_name"], "Budi");
}

#[tokio::test]
async fn test_payout_flow() {
    let app = app().await;
    let creator = test_support::creator(&app.db, "alice").await;
    test_support::donation(
        &app.db,
        &creator,
        "Budi",
        40_000,
        DonationStatus::Paid,
        Utc::now(),
    )
    .await;
    let router = build_router(app.clone());

    let (status, body) = send(
        &router,
        with_json(Method::POST, "/v1/creators/alice/payouts", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    test_support::donation(
        &app.db,
        &creator,
        "Sari",
        20_000,
        DonationStatus::Paid,
        Utc::now(),
    )
    .await;

    let (_, body) = send(&router, get("/v1/creators/alice/balance")).await;
    assert_eq!(body["data"]["balance"], 60_000);

    let (status, body) = send(
        &router,
        with_json(Method::POST, "/v1/creators/alice/payouts", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let payout_id = body["data"]["id"].as_str().unwrap().to_string();

    let list_pending = Request::builder()
        .uri("/v1/admin/payouts?status=pending")
        .header("authorization", admin_bearer())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, list_pending).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&router, get("/v1/admin/payouts")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let process = Request::builder()
        .method(Method::PUT)
        .uri(format!("/v1/admin/payouts/{}", payout_id))
        .header("authorization", admin_bearer())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "status": "APPROVED", "notes": "transfer scheduled" }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&router, process).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "APPROVED");
}

#[tokio::test]
async fn test_media_share_and_replay() {
    let app = app().await;
    test_support::creator(&app.db, "alice").await;
    let router = build_router(app.clone());

    let (_, body) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/creators/alice/donations",
            json!({
                "donor_name": "Budi",
                "amount": 25000,
                "media": { "video_url": "https://youtu.be/dQw4w9WgXcQ", "duration_seconds": 30 }
            }),
        ),
    )
    .await;
    let merchant_ref = body["data"]["merchant_ref"].as_str().unwrap().to_string();
    let donation_id = body["data"]["id"].as_str().unwrap().to_string();

    send(
        &router,
        with_json(
            Method::POST,
            "/v1/webhook/payment",
            webhook_body(&merchant_ref, "capture", "25000.00"),
        ),
    )
    .await;

    let (status, body) = send(&router, get("/v1/creators/alice/media-shares")).await;
    assert_eq!(status, StatusCode::OK);
    let media_share_id = body["data"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"][0]["queue_position"], 1);

    let (status, _) = send(
        &router,
        with_json(
            Method::PUT,
            &format!("/v1/media-shares/{}/status", media_share_id),
            json!({ "status": "PLAYED" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &router,
        with_json(
            Method::PUT,
            &format!("/v1/media-shares/{}/status", media_share_id),
            json!({ "status": "PLAYING" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/overlay/alice/replay",
            json!({ "donation_id": donation_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, get("/v1/overlay/alice/replay")).await;
    assert_eq!(body["data"]["donation_id"], donation_id.as_str());
    let (_, body) = send(&router, get("/v1/overlay/alice/replay")).await;
    assert!(body["data"].is_null());

    let (status, _) = send(
        &router,
        with_json(
            Method::POST,
            "/v1/overlay/alice/replay",
            json!({ "donation_id": "unknown" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
