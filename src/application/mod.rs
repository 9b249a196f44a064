// Application layer - Use cases and the aggregation pipeline
pub mod clock;
pub mod dashboard_service;
pub mod downsampler;
pub mod graph_service;
pub mod prediction_service;
pub mod prediction_summarizer;
pub mod refresh;
pub mod series_filter;
pub mod stats;
pub mod telemetry_repository;
pub mod time_series_store;

#[cfg(test)]
pub(crate) mod testing;
