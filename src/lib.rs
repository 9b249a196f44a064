// Refrigeration telemetry service: sensor dashboard, charts and failure predictions
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
