pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{routing::get, Router};
use chrono::FixedOffset;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{db::Store, ingest::SubscriberStatus, stats::StatsService};

/// Shared by every request handler. All fields are cheap handles; no
/// readings are held in process memory.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Store,
    pub stats: StatsService,
    pub subscriber: SubscriberStatus,
}

impl AppState {
    pub fn new(store: Store, subscriber: SubscriberStatus) -> Self {
        Self {
            stats: StatsService::new(store.clone()),
            store,
            subscriber,
        }
    }

    /// Reports dates and timestamps in `offset` instead of UTC.
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.stats = StatsService::with_offset(self.store.clone(), offset);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/data", get(handlers::get_recent_readings))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/sensor/latest", get(handlers::get_latest_reading))
        .route("/api/sensor/stats", get(handlers::get_detailed_stats))
        .route("/api/sensor/filter", get(handlers::filter_readings))
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .split_for_parts();

    router.route(
        "/api-docs/openapi.json",
        get(move || async move { axum::Json(api) }),
    )
}
