mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;
use tender_desk::types::Role;

use common::{id_of, TestApp};

#[tokio::test]
async fn imminent_sweep_sends_one_digest_per_tender() -> Result<()> {
    let app = TestApp::new();
    let admin = app.user("Root", None, Role::Admin).await;
    let owner = app.user("Ana", Some("ana@acme.test"), Role::Member).await;
    let worker = app.user("Bo", Some("bo@acme.test"), Role::Member).await;

    let tender = app.create_tender(&owner, "Bridge survey", Some(app.now() + Duration::days(30))).await?;
    let tender_id = id_of(&tender);
    for (title, hours) in [("Soil report", 2), ("Traffic plan", 10), ("Insurance", 23)] {
        app.create_task(&owner, &tender_id, title, &worker, Some(app.now() + Duration::hours(hours)))
            .await?;
    }
    app.create_task(&owner, &tender_id, "Later", &worker, Some(app.now() + Duration::days(3)))
        .await?;
    app.sender.clear();

    let (status, body) = app
        .call(Method::POST, "/api/root/reminders/imminent", Some(&admin.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job"], "imminent");
    assert_eq!(body["data"]["matched"], 3);
    assert_eq!(body["data"]["digests"], 1);

    let sent = app.sender.sent_to("bo@acme.test");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("3 task(s)"));
    assert!(!sent[0].body.contains("Later"));

    let (_, body) = app
        .call(Method::POST, "/api/root/reminders/upcoming", Some(&admin.token), None)
        .await?;
    assert_eq!(body["data"]["matched"], 1);
    Ok(())
}

#[tokio::test]
async fn unknown_tier_is_not_found() -> Result<()> {
    let app = TestApp::new();
    let admin = app.user("Root", None, Role::Admin).await;

    let (status, body) = app
        .call(Method::POST, "/api/root/reminders/hourly", Some(&admin.token), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn missing_mail_credentials_is_unavailable() -> Result<()> {
    let app = TestApp::new();
    let admin = app.user("Root", None, Role::Admin).await;
    app.sender.unconfigure(&app.tenant);

    let (status, body) = app
        .call(Method::POST, "/api/root/reminders/deadline", Some(&admin.token), None)
        .await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    // Force close needs no mail
    let (status, _) = app
        .call(Method::POST, "/api/root/reminders/force-close", Some(&admin.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn force_close_covers_tenders_nobody_read() -> Result<()> {
    let app = TestApp::new();
    let admin = app.user("Root", None, Role::Admin).await;
    let owner = app.user("Ana", None, Role::Member).await;

    let expiring = app.create_tender(&owner, "Expiring", Some(app.now() + Duration::hours(1))).await?;
    app.create_tender(&owner, "Open", Some(app.now() + Duration::days(5))).await?;
    app.call(
        Method::POST,
        "/api/rfqs",
        Some(&owner.token),
        Some(json!({
            "subject": "Diesel",
            "sender_address": "fuel@acme.test",
            "close_date": app.now() + Duration::hours(1),
        })),
    )
    .await?;

    app.clock.advance(Duration::hours(2));

    let (status, body) = app
        .call(Method::POST, "/api/root/reminders/force-close", Some(&admin.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["closed_tenders"], 1);
    assert_eq!(body["data"]["closed_rfqs"], 1);

    // Already closed in storage: a second pass has nothing to do
    let (_, body) = app
        .call(Method::POST, "/api/root/reminders/force-close", Some(&admin.token), None)
        .await?;
    assert_eq!(body["data"]["closed_tenders"], 0);

    let (_, body) = app
        .call(Method::GET, "/api/tenders?status=closed", Some(&owner.token), None)
        .await?;
    let closed = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0]["id"], expiring["id"]);
    Ok(())
}

#[tokio::test]
async fn deadline_reminder_goes_to_the_creator() -> Result<()> {
    let app = TestApp::new();
    let officer = app.user("Olu", None, Role::ProcurementOfficer).await;
    let owner = app.user("Ana", Some("ana@acme.test"), Role::Member).await;

    app.create_tender(&owner, "Closing soon", Some(app.now() + Duration::hours(6))).await?;
    app.create_tender(&owner, "Far away", Some(app.now() + Duration::days(20))).await?;

    let (status, body) = app
        .call(Method::POST, "/api/root/reminders/deadline", Some(&officer.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], 1);

    let sent = app.sender.sent_to("ana@acme.test");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("Closing soon"));
    Ok(())
}

#[tokio::test]
async fn force_closed_tender_still_takes_tasks_but_cannot_be_resolved() -> Result<()> {
    let app = TestApp::new();
    let admin = app.user("Root", None, Role::Admin).await;
    let owner = app.user("Ana", None, Role::Member).await;
    let worker = app.user("Bo", None, Role::Member).await;

    let tender = app.create_tender(&owner, "Late tender", Some(app.now() + Duration::minutes(30))).await?;
    let tender_id = id_of(&tender);
    app.clock.advance(Duration::minutes(90));

    let (status, body) = app
        .call(Method::POST, "/api/root/reminders/force-close", Some(&admin.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["closed_tenders"], 1);

    let task = app.create_task(&owner, &tender_id, "Late addendum", &worker, None).await?;
    assert_eq!(task["status"], "pending");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/tenders/{}/resolve", tender_id),
            Some(&owner.token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (_, body) = app
        .call(Method::GET, &format!("/api/tenders/{}", tender_id), Some(&owner.token), None)
        .await?;
    assert_eq!(body["data"]["status"], "closed");
    Ok(())
}
