use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SchedulerSettings;
use crate::database::Repository;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_elevated};
use crate::notify::NotificationSender;
use crate::scheduler::SchedulerRegistry;
use crate::services::{RfqService, TaskService, TenderService};
use crate::storage::FileStore;
use crate::types::SharedClock;

/// Everything a handler needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub tenders: TenderService,
    pub tasks: TaskService,
    pub rfqs: RfqService,
    pub schedulers: Arc<SchedulerRegistry>,
    pub jwt_secret: Arc<str>,
    pub max_upload_bytes: usize,
    /// `None` disables CORS; an empty list allows any origin
    pub cors_origins: Option<Vec<String>>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        files: Arc<dyn FileStore>,
        sender: Arc<dyn NotificationSender>,
        clock: SharedClock,
        scheduler: SchedulerSettings,
        jwt_secret: &str,
    ) -> Self {
        Self {
            tenders: TenderService::new(Arc::clone(&repo), Arc::clone(&files), Arc::clone(&clock)),
            tasks: TaskService::new(Arc::clone(&repo), files, Arc::clone(&sender), Arc::clone(&clock)),
            rfqs: RfqService::new(Arc::clone(&repo), Arc::clone(&clock)),
            schedulers: Arc::new(SchedulerRegistry::new(scheduler, repo, sender, clock)),
            jwt_secret: Arc::from(jwt_secret),
            max_upload_bytes: 25 * 1024 * 1024,
            cors_origins: None,
        }
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_cors(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected_routes(&state))
        .merge(elevated_routes(&state))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(origins) = &state.cors_origins {
        router = router.layer(cors_layer(origins));
    }

    router.with_state(state)
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/tenders", get(protected::tender::list).post(protected::tender::create))
        .route(
            "/api/tenders/:id",
            get(protected::tender::show)
                .patch(protected::tender::update)
                .delete(protected::tender::delete),
        )
        .route("/api/tenders/:id/resolve", post(protected::tender::resolve))
        .route(
            "/api/tenders/:id/tasks",
            get(protected::task::list).post(protected::task::create),
        )
        .route(
            "/api/tasks/:id",
            axum::routing::patch(protected::task::update).delete(protected::task::delete),
        )
        .route(
            "/api/tasks/:id/file",
            put(protected::task::upload_file)
                .get(protected::task::download_file)
                .delete(protected::task::clear_file),
        )
        .route("/api/rfqs", get(protected::rfq::list).post(protected::rfq::create))
        .route(
            "/api/rfqs/:id",
            get(protected::rfq::show)
                .patch(protected::rfq::update)
                .delete(protected::rfq::delete),
        )
        .route("/api/rfqs/:id/send", post(protected::rfq::send))
        .route("/api/rfqs/:id/assignees", put(protected::rfq::set_assignees))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn elevated_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/root/reminders/:tier", post(elevated::reminder::trigger))
        .route_layer(from_fn(require_elevated))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(parsed)
}
