// Application state for HTTP handlers
use crate::application::dashboard_service::DashboardService;
use crate::application::graph_service::GraphService;
use crate::application::prediction_service::PredictionService;

#[derive(Clone)]
pub struct AppState {
    pub dashboard_service: DashboardService,
    pub graph_service: GraphService,
    pub prediction_service: PredictionService,
}
