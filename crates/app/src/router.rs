use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::dummy;
use crate::problem::ProblemResponse;
use crate::registrar::SubscriptionRegistrar;
use crate::tap::{parse_stage_list, tap_keep_alive, tap_stream, TapFilter, TapHub};
use crate::{telemetry, webhook};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    tap: TapHub,
    webhook_secret: Arc<[u8]>,
    registrar: SubscriptionRegistrar,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        tap: TapHub,
        webhook_secret: Arc<[u8]>,
        registrar: SubscriptionRegistrar,
    ) -> Self {
        Self {
            metrics,
            tap,
            webhook_secret,
            registrar,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn tap(&self) -> &TapHub {
        &self.tap
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.webhook_secret
    }

    pub fn registrar(&self) -> &SubscriptionRegistrar {
        &self.registrar
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/_debug/tap", get(debug_tap))
        .route("/eventsub", post(webhook::handle))
        .route("/subs", get(list_subscriptions))
        .route("/test/:event", post(send_test_event))
        .with_state(state)
}

async fn index() -> &'static str {
    "twi-bridge is running"
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct TapQuery {
    #[serde(default)]
    s: Option<String>,
}

async fn debug_tap(
    State(state): State<AppState>,
    Query(query): Query<TapQuery>,
) -> Result<
    Sse<impl tokio_stream::Stream<Item = Result<axum::response::sse::Event, serde_json::Error>>>,
    (StatusCode, String),
> {
    let stages = parse_stage_list(query.s).map_err(|err| (StatusCode::BAD_REQUEST, err))?;
    let filter = TapFilter::from_stages(stages);
    let stream = tap_stream(state.tap().clone(), filter);

    Ok(Sse::new(stream).keep_alive(tap_keep_alive()))
}

async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ProblemResponse> {
    state
        .registrar()
        .list_subscriptions()
        .await
        .map(Json)
        .map_err(|err| {
            error!(stage = "registrar", error = %err, "failed to list subscriptions");
            ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "subscription_list_failed",
                err.to_string(),
            )
        })
}

/// Pushes a canned notification through the dispatcher without a platform round trip.
async fn send_test_event(
    State(state): State<AppState>,
    Path(event_type): Path<String>,
) -> Result<String, ProblemResponse> {
    let event = dummy::sample_event(&event_type).ok_or_else(|| {
        ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "unknown_event_type",
            format!("no sample event for '{event_type}'"),
        )
    })?;

    let message_id = format!("test-{}", Uuid::new_v4());
    webhook::dispatch_notification(state.tap(), &message_id, &event_type, &event);
    Ok(format!("dispatched {event_type} as {message_id}\n"))
}
