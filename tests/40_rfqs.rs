mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;
use tender_desk::types::Role;

use common::{id_of, TestApp};

#[tokio::test]
async fn create_assign_and_send() -> Result<()> {
    let app = TestApp::new();
    let buyer = app.user("Ana", None, Role::ProcurementOfficer).await;
    let helper = app.user("Bo", None, Role::Member).await;
    let outsider = app.user("Cy", None, Role::Member).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/rfqs",
            Some(&buyer.token),
            Some(json!({
                "subject": "Toner cartridges",
                "sender_address": "purchasing@acme.test",
                "items": [{ "description": "HP 305A", "quantity": 40.0, "unit": "pcs" }],
                "close_date": app.now() + Duration::days(10),
                "assignees": [helper.id, helper.id],
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["assignees"], json!([helper.id]));
    let uri = format!("/api/rfqs/{}", id_of(&body["data"]));

    let (status, _) = app.call(Method::GET, &uri, Some(&helper.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::GET, &uri, Some(&outsider.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.call(Method::GET, "/api/rfqs", Some(&helper.token), None).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    let (_, body) = app.call(Method::GET, "/api/rfqs", Some(&outsider.token), None).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let (status, _) = app.call(Method::POST, &format!("{}/send", uri), Some(&helper.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.call(Method::POST, &format!("{}/send", uri), Some(&buyer.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "sent");
    Ok(())
}

#[tokio::test]
async fn closed_rfq_cannot_be_sent_until_extended() -> Result<()> {
    let app = TestApp::new();
    let buyer = app.user("Ana", None, Role::Member).await;

    let (_, body) = app
        .call(
            Method::POST,
            "/api/rfqs",
            Some(&buyer.token),
            Some(json!({
                "subject": "Diesel",
                "sender_address": "fuel@acme.test",
                "close_date": app.now() + Duration::hours(1),
            })),
        )
        .await?;
    let uri = format!("/api/rfqs/{}", id_of(&body["data"]));

    app.clock.advance(Duration::hours(2));

    let (_, body) = app.call(Method::GET, &uri, Some(&buyer.token), None).await?;
    assert_eq!(body["data"]["status"], "closed");
    let (status, body) = app.call(Method::POST, &format!("{}/send", uri), Some(&buyer.token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(&buyer.token),
            Some(json!({ "close_date": app.now() + Duration::days(1) })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    Ok(())
}

#[tokio::test]
async fn close_before_open_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let buyer = app.user("Ana", None, Role::Member).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/rfqs",
            Some(&buyer.token),
            Some(json!({
                "subject": "Diesel",
                "sender_address": "fuel@acme.test",
                "open_date": app.now() + Duration::days(2),
                "close_date": app.now() + Duration::days(1),
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn assigning_unknown_user_fails() -> Result<()> {
    let app = TestApp::new();
    let buyer = app.user("Ana", None, Role::Member).await;

    let (_, body) = app
        .call(
            Method::POST,
            "/api/rfqs",
            Some(&buyer.token),
            Some(json!({
                "subject": "Diesel",
                "sender_address": "fuel@acme.test",
                "close_date": app.now() + Duration::days(1),
            })),
        )
        .await?;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/rfqs/{}/assignees", id_of(&body["data"])),
            Some(&buyer.token),
            Some(json!({ "user_ids": [uuid::Uuid::new_v4()] })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
