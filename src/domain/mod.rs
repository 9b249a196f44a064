// Domain layer - Plain data types and pure rules
pub mod dashboard;
pub mod prediction;
pub mod sensor;
pub mod telemetry;
