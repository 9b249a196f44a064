// Route table
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    daily_predictions, health_check, last_prediction, latest_sensors, parameter_chart,
    prediction_stats, store_health, stream_sensors, vibration_breakdown,
};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is handled in the response builders, so no CompressionLayer here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/healthz/store", get(store_health))
        .route("/sensors/latest", get(latest_sensors))
        .route("/sensors/stream", get(stream_sensors))
        .route("/sensors/vibration", get(vibration_breakdown))
        .route("/sensors/:parameter/chart", get(parameter_chart))
        .route("/predictions/stats", get(prediction_stats))
        .route("/predictions/daily", get(daily_predictions))
        .route("/predictions/last", get(last_prediction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_service::DashboardService;
    use crate::application::graph_service::{ChartSettings, GraphService};
    use crate::application::prediction_service::PredictionService;
    use crate::application::testing::{FakeRepository, ManualClock};
    use crate::application::time_series_store::{CacheSettings, TimeSeriesStore};
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(repo: Arc<FakeRepository>) -> Router {
        let clock = Arc::new(ManualClock::at(2025, 3, 10, 12, 0, 0));
        let store = Arc::new(TimeSeriesStore::new(
            repo.clone(),
            clock.clone(),
            "sensor_data",
            CacheSettings::default(),
        ));
        let state = Arc::new(AppState {
            dashboard_service: DashboardService::new(store),
            graph_service: GraphService::new(repo.clone(), clock.clone(), "sensor_data", ChartSettings::default()),
            prediction_service: PredictionService::new(repo, clock, "predictions"),
        });
        build_router(state)
    }

    fn seeded() -> Arc<FakeRepository> {
        let repo = Arc::new(FakeRepository::new());
        repo.insert("sensor_data", json!({ "timestamp": "2025-03-10T10:00:00Z", "humidity": 40.0 }));
        repo.insert("sensor_data", json!({ "timestamp": "2025-03-10T11:00:00Z", "humidity": 44.5 }));
        repo.insert(
            "predictions",
            json!({ "timestamp": "2025-03-10T11:30:00Z", "anomaly": false, "failure_prob": 0.1, "health_index": 90.0 }),
        );
        repo
    }

    async fn get(app: Router, uri: &str) -> Response<Body> {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_routes() {
        let repo = seeded();
        assert_eq!(get(app(repo.clone()), "/healthz").await.status(), StatusCode::OK);

        let json = body_json(get(app(repo), "/healthz/store").await).await;
        assert_eq!(json["healthy"], true);
        assert_eq!(json["status"], "Connected");
    }

    #[tokio::test]
    async fn test_latest_sensors() {
        let response = get(app(seeded()), "/sensors/latest?refresh=true").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let humidity = json["cards"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["parameter"] == "humidity")
            .unwrap();
        assert_eq!(humidity["value"], 44.5);
        assert_eq!(humidity["difference"], 4.5);
    }

    #[tokio::test]
    async fn test_latest_sensors_brotli() {
        let request = Request::builder()
            .uri("/sensors/latest")
            .header(header::ACCEPT_ENCODING, "gzip, br")
            .body(Body::empty())
            .unwrap();
        let response = app(seeded()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    }

    #[tokio::test]
    async fn test_chart_route_validation() {
        let repo = seeded();
        let ok = get(app(repo.clone()), "/sensors/humidity/chart?timeframe=1d").await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["count"], 2);

        let unknown = get(app(repo.clone()), "/sensors/pressure/chart").await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let custom = get(app(repo), "/sensors/humidity/chart?timeframe=custom").await;
        assert_eq!(custom.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_prediction_routes() {
        let repo = seeded();
        let stats = body_json(get(app(repo.clone()), "/predictions/stats?range=present").await).await;
        assert_eq!(stats["total_predictions"], 1);
        assert_eq!(stats["status"], "normal");

        let bad = get(app(repo.clone()), "/predictions/stats?range=yesterday").await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let daily = body_json(get(app(repo.clone()), "/predictions/daily").await).await;
        assert_eq!(daily["daily"].as_array().unwrap().len(), 1);

        let wide = get(app(repo.clone()), "/predictions/daily?days=100000000").await;
        assert_eq!(wide.status(), StatusCode::OK);
        assert_eq!(body_json(wide).await["daily"].as_array().unwrap().len(), 1);

        let last = body_json(get(app(repo), "/predictions/last").await).await;
        assert_eq!(last["timestamp"], "2025-03-10T11:30:00Z");
    }
}
