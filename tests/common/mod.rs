#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tender_desk::app::{app, AppState};
use tender_desk::auth::{generate_jwt, Claims};
use tender_desk::config::SchedulerSettings;
use tender_desk::database::models::UserAccount;
use tender_desk::database::MemoryRepository;
use tender_desk::notify::RecordingSender;
use tender_desk::storage::MemoryFileStore;
use tender_desk::types::{Clock, Role, TenantId};

pub const SECRET: &str = "integration-test-secret";

/// Clock the tests can move forward
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub files: Arc<MemoryFileStore>,
    pub sender: Arc<RecordingSender>,
    pub clock: Arc<ManualClock>,
    pub tenant: TenantId,
}

/// A seeded user and a token for them
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let files = Arc::new(MemoryFileStore::new());
        let sender = Arc::new(RecordingSender::new());
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));

        let state = AppState::new(
            repo.clone(),
            files.clone(),
            sender.clone(),
            clock.clone(),
            SchedulerSettings::defaults(),
            SECRET,
        )
        .with_upload_limit(max_upload_bytes);

        Self {
            router: app(state),
            repo,
            files,
            sender,
            clock,
            tenant: TenantId::new("acme"),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn user(&self, name: &str, email: Option<&str>, role: Role) -> TestUser {
        self.user_in(&self.tenant.clone(), name, email, role).await
    }

    pub async fn user_in(&self, tenant: &TenantId, name: &str, email: Option<&str>, role: Role) -> TestUser {
        let id = Uuid::new_v4();
        self.repo
            .insert_user(
                tenant,
                UserAccount {
                    id,
                    name: name.to_string(),
                    email: email.map(str::to_string),
                    role,
                },
            )
            .await;
        let token = generate_jwt(&Claims::new(tenant, id, role, 1), SECRET).expect("token");
        TestUser {
            id,
            email: email.map(str::to_string),
            token,
        }
    }

    /// Send a JSON request and return the status and parsed body (`Null` when empty)
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn upload(&self, uri: &str, token: &str, bytes: &[u8]) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/octet-stream")
            .body(Body::from(bytes.to_vec()))?;
        self.send(request).await
    }

    pub async fn raw(&self, method: Method, uri: &str, token: &str) -> Result<(StatusCode, Vec<u8>)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, body))
    }

    pub async fn create_tender(&self, owner: &TestUser, title: &str, deadline: Option<DateTime<Utc>>) -> Result<Value> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/tenders",
                Some(&owner.token),
                Some(serde_json::json!({ "title": title, "deadline": deadline })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create tender failed: {} {}", status, body);
        Ok(body["data"].clone())
    }

    pub async fn create_task(
        &self,
        owner: &TestUser,
        tender_id: &str,
        title: &str,
        assignee: &TestUser,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Value> {
        let (status, body) = self
            .call(
                Method::POST,
                &format!("/api/tenders/{}/tasks", tender_id),
                Some(&owner.token),
                Some(serde_json::json!({ "title": title, "assignee_id": assignee.id, "due_date": due_date })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create task failed: {} {}", status, body);
        Ok(body["data"].clone())
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}
