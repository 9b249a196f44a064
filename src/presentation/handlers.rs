// HTTP request handlers
use crate::domain::prediction::PredictionWindow;
use crate::domain::sensor::SensorParameter;
use crate::domain::telemetry::Timeframe;
use crate::infrastructure::chunked_stream::stream_response;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_DAILY_DAYS: usize = 5;

#[derive(Deserialize)]
pub struct LatestQuery {
    pub refresh: Option<bool>,
}

#[derive(Deserialize)]
pub struct ChartQuery {
    pub timeframe: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub range: Option<String>,
}

#[derive(Deserialize)]
pub struct DailyQuery {
    pub days: Option<usize>,
}

#[derive(Serialize)]
struct LastPrediction {
    timestamp: Option<DateTime<Utc>>,
}

async fn respond<T: Serialize>(data: &T, headers: &HeaderMap) -> Response {
    match json_response(data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn store_health(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let status = state.prediction_service.store_status().await;
    respond(&status, &headers).await
}

/// Latest sensor snapshot with per-parameter trends
pub async fn latest_sensors(
    Query(query): Query<LatestQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let dashboard = state
        .dashboard_service
        .get_dashboard(query.refresh.unwrap_or(false))
        .await;
    respond(&dashboard, &headers).await
}

/// Stream dashboard updates as they arrive
pub async fn stream_sensors(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let updates = state.dashboard_service.updates().await;
    stream_response(updates, accepts_brotli(&headers))
}

pub async fn vibration_breakdown(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let breakdown = state.graph_service.vibration_breakdown().await;
    respond(&breakdown, &headers).await
}

pub async fn parameter_chart(
    Path(parameter): Path<String>,
    Query(query): Query<ChartQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(parameter) = SensorParameter::from_column(&parameter) else {
        return (StatusCode::NOT_FOUND, format!("unknown sensor parameter: {}", parameter)).into_response();
    };

    let timeframe_name = query.timeframe.as_deref().unwrap_or("1d");
    let Some(timeframe) = Timeframe::parse(timeframe_name, query.start, query.end) else {
        return (
            StatusCode::BAD_REQUEST,
            format!("invalid timeframe: {} (custom needs start and end)", timeframe_name),
        )
            .into_response();
    };

    let chart = state.graph_service.chart(parameter, timeframe).await;
    respond(&chart, &headers).await
}

pub async fn prediction_stats(
    Query(query): Query<StatsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let range = query.range.as_deref().unwrap_or("present");
    let Some(window) = PredictionWindow::parse(range) else {
        return (StatusCode::BAD_REQUEST, format!("invalid range: {}", range)).into_response();
    };

    let summary = state.prediction_service.stats(window).await;
    respond(&summary, &headers).await
}

pub async fn daily_predictions(
    Query(query): Query<DailyQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let days = query.days.unwrap_or(DEFAULT_DAILY_DAYS).max(1);
    let rollup = state.prediction_service.daily(days).await;
    respond(&rollup, &headers).await
}

pub async fn last_prediction(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match state.prediction_service.last_prediction_time().await {
        Ok(timestamp) => respond(&LastPrediction { timestamp }, &headers).await,
        Err(e) => {
            tracing::error!("Error fetching last prediction time: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
