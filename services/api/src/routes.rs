use crate::infra::{ApiServices, AppState, InMemoryPropertyDirectory};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use rentflow::lifecycle::domain::{PropertyId, UserId};
use rentflow::lifecycle::properties::PropertyFacts;
use rentflow::lifecycle::router::lifecycle_router;

pub(crate) fn with_lifecycle_routes(services: Arc<ApiServices>) -> axum::Router {
    lifecycle_router(services)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/properties",
            axum::routing::post(register_property_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Seed one property into the sandbox catalog so the lifecycle endpoints
/// have something to let. The real catalog service owns this in production.
#[derive(Debug, Deserialize)]
pub(crate) struct RegisterPropertyRequest {
    pub(crate) property_id: String,
    pub(crate) landlord_id: String,
    /// Asking rent per year, in minor currency units.
    pub(crate) annual_rent: u64,
    #[serde(default = "default_listable")]
    pub(crate) listable: bool,
}

fn default_listable() -> bool {
    true
}

pub(crate) async fn register_property_endpoint(
    Extension(directory): Extension<Arc<InMemoryPropertyDirectory>>,
    Json(request): Json<RegisterPropertyRequest>,
) -> impl IntoResponse {
    let facts = PropertyFacts {
        id: PropertyId(request.property_id),
        landlord: UserId(request.landlord_id),
        annual_rent: request.annual_rent,
        listable: request.listable,
    };
    directory.insert(facts.clone());
    (StatusCode::CREATED, Json(facts))
}
