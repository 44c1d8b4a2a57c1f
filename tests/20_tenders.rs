mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;
use tender_desk::types::Role;

use common::{id_of, TestApp};

#[tokio::test]
async fn create_then_read_back() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;

    let tender = app.create_tender(&owner, "Road resurfacing", Some(app.now() + Duration::days(3))).await?;
    assert_eq!(tender["status"], "active");
    assert_eq!(tender["created_by"], owner.id.to_string());

    let (status, body) = app
        .call(Method::GET, &format!("/api/tenders/{}", id_of(&tender)), Some(&owner.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Road resurfacing");
    Ok(())
}

#[tokio::test]
async fn blank_title_is_a_validation_error() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;

    let (status, body) = app
        .call(Method::POST, "/api/tenders", Some(&owner.token), Some(json!({ "title": "   " })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn past_deadline_reads_as_closed_and_cannot_be_resolved() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;
    let tender = app.create_tender(&owner, "Fleet lease", Some(app.now() + Duration::hours(2))).await?;
    let uri = format!("/api/tenders/{}", id_of(&tender));

    app.clock.advance(Duration::hours(3));

    let (_, body) = app.call(Method::GET, &uri, Some(&owner.token), None).await?;
    assert_eq!(body["data"]["status"], "closed");

    let (status, body) = app
        .call(Method::POST, &format!("{}/resolve", uri), Some(&owner.token), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TRANSITION");
    Ok(())
}

#[tokio::test]
async fn resolve_closes_early() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;
    let tender = app.create_tender(&owner, "Office chairs", Some(app.now() + Duration::days(5))).await?;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/tenders/{}/resolve", id_of(&tender)),
            Some(&owner.token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "closed");

    let (_, body) = app
        .call(Method::GET, "/api/tenders?status=active", Some(&owner.token), None)
        .await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn extending_the_deadline_reopens() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;
    let tender = app.create_tender(&owner, "Catering", Some(app.now() + Duration::hours(1))).await?;
    let uri = format!("/api/tenders/{}", id_of(&tender));

    app.clock.advance(Duration::hours(2));
    let new_deadline = app.now() + Duration::days(2);

    let (status, body) = app
        .call(Method::PATCH, &uri, Some(&owner.token), Some(json!({ "deadline": new_deadline })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    Ok(())
}

#[tokio::test]
async fn unknown_status_filter_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;

    let (status, body) = app
        .call(Method::GET, "/api/tenders?status=archived", Some(&owner.token), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["status"].is_string(), true);
    Ok(())
}

#[tokio::test]
async fn strangers_cannot_see_or_edit() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;
    let stranger = app.user("Sam", None, Role::Member).await;
    let admin = app.user("Root", None, Role::Admin).await;

    let tender = app.create_tender(&owner, "Printers", None).await?;
    let uri = format!("/api/tenders/{}", id_of(&tender));

    let (status, _) = app.call(Method::GET, &uri, Some(&stranger.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::PATCH, &uri, Some(&stranger.token), Some(json!({ "title": "Mine now" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.call(Method::GET, "/api/tenders", Some(&stranger.token), None).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let (_, body) = app.call(Method::GET, "/api/tenders", Some(&admin.token), None).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn delete_removes_tasks_and_files() -> Result<()> {
    let app = TestApp::new();
    let owner = app.user("Ana", None, Role::Member).await;
    let worker = app.user("Wes", None, Role::Member).await;

    let tender = app.create_tender(&owner, "Scaffolding", None).await?;
    let task = app.create_task(&owner, &id_of(&tender), "Price sheet", &worker, None).await?;
    let (status, _) = app
        .upload(&format!("/api/tasks/{}/file?filename=prices.xlsx", id_of(&task)), &worker.token, b"cells")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.files.file_count().await, 1);

    let uri = format!("/api/tenders/{}", id_of(&tender));
    let (status, body) = app.call(Method::DELETE, &uri, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    assert_eq!(app.files.file_count().await, 0);
    let (status, _) = app.call(Method::GET, &uri, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
