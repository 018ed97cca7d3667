use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use migration::MigratorTrait;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use engine::Engine;
use server::{ServerState, router};

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    router(ServerState {
        engine: Arc::new(engine),
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> (String, i64) {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "display_name": username.to_uppercase(),
            "password": "correct horse",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user_id"].as_i64().unwrap(),
    )
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = app().await;

    let (status, _) = send(&app, Method::GET, "/trips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/trips", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shared_dinner_settles_through_http() {
    let app = app().await;
    let (alice, alice_id) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    let (status, trip) = send(
        &app,
        Method::POST,
        "/trips",
        Some(&alice),
        Some(json!({ "name": "Porto", "base_currency": "EUR" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let trip_id = trip["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/trips/join",
        Some(&bob),
        Some(json!({ "code": trip["code"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, expense) = send(
        &app,
        Method::POST,
        &format!("/trips/{trip_id}/expenses"),
        Some(&alice),
        Some(json!({
            "payer_id": alice_id,
            "original_amount": "40.00",
            "currency": "EUR",
            "description": "Francesinhas",
            "date": "2025-08-02",
            "participant_ids": [alice_id, bob_id],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{expense}");
    assert_eq!(expense["amount_minor"], 4000);

    let (status, settlement) = send(
        &app,
        Method::GET,
        &format!("/trips/{trip_id}/settlement"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settlement["currency"], "EUR");
    assert_eq!(settlement["total_expenses_minor"], 4000);
    assert_eq!(
        settlement["transfers"],
        json!([{ "from": bob_id, "to": alice_id, "amount_minor": 2000 }])
    );
}

#[tokio::test]
async fn malformed_expense_input_is_unprocessable() {
    let app = app().await;
    let (alice, alice_id) = register(&app, "alice").await;
    let (_, trip) = send(
        &app,
        Method::POST,
        "/trips",
        Some(&alice),
        Some(json!({ "name": "Porto" })),
    )
    .await;
    let uri = format!("/trips/{}/expenses", trip["id"]);

    let mut body = json!({
        "payer_id": alice_id,
        "original_amount": "12.50",
        "currency": "EUR",
        "description": "Coffee",
        "date": "02/08/2025",
        "participant_ids": [alice_id],
    });
    let (status, _) = send(&app, Method::POST, &uri, Some(&alice), Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    body["date"] = json!("2025-08-02");
    body["original_amount"] = json!("twelve");
    let (status, _) = send(&app, Method::POST, &uri, Some(&alice), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn empty_patch_is_a_bad_request() {
    let app = app().await;
    let (alice, alice_id) = register(&app, "alice").await;
    let (_, trip) = send(
        &app,
        Method::POST,
        "/trips",
        Some(&alice),
        Some(json!({ "name": "Porto" })),
    )
    .await;
    let trip_id = trip["id"].as_i64().unwrap();
    let (_, expense) = send(
        &app,
        Method::POST,
        &format!("/trips/{trip_id}/expenses"),
        Some(&alice),
        Some(json!({
            "payer_id": alice_id,
            "original_amount": "9",
            "currency": "EUR",
            "description": "Tram",
            "date": "2025-08-02",
            "participant_ids": [alice_id],
        })),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/trips/{trip_id}/expenses/{}", expense["id"]),
        Some(&alice),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = app().await;
    let (alice, _) = register(&app, "alice").await;

    let (status, _) = send(&app, Method::POST, "/auth/logout", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/trips", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn virtual_member_link_needs_the_trip_code() {
    let app = app().await;
    let (alice, _) = register(&app, "alice").await;
    register(&app, "rita").await;
    let (_, trip) = send(
        &app,
        Method::POST,
        "/trips",
        Some(&alice),
        Some(json!({ "name": "Porto" })),
    )
    .await;
    let trip_id = trip["id"].as_i64().unwrap();
    let (status, ghost) = send(
        &app,
        Method::POST,
        &format!("/trips/{trip_id}/virtual-members"),
        Some(&alice),
        Some(json!({ "display_name": "Rita" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{ghost}");
    let link = format!("/trips/{trip_id}/virtual-members/{}/link", ghost["user_id"]);

    let (status, _) = send(
        &app,
        Method::POST,
        &link,
        None,
        Some(json!({ "code": "aaaaaa", "username": "rita", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, session) = send(
        &app,
        Method::POST,
        &link,
        None,
        Some(json!({ "code": trip["code"], "username": "rita", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{session}");
    assert!(session["token"].is_string());
}
