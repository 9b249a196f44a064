// Dashboard domain model
use super::sensor::{SensorParameter, SensorSnapshot, TrendDirection};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One parameter card: latest value and its change since the previous reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorCard {
    pub parameter: SensorParameter,
    pub title: String,
    pub unit: &'static str,
    pub value: Option<f64>,
    pub formatted: String,
    pub difference: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub timestamp: Option<DateTime<Utc>>,
    pub cards: Vec<SensorCard>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Dashboard {
    pub fn from_snapshot(snapshot: &SensorSnapshot, cached: bool, error: Option<String>) -> Self {
        let cards = SensorParameter::DASHBOARD
            .into_iter()
            .map(|parameter| {
                let value = snapshot.current.as_ref().and_then(|r| r.value(parameter));
                SensorCard {
                    parameter,
                    title: parameter.display_name(),
                    unit: parameter.unit(),
                    value,
                    formatted: value
                        .map(|v| parameter.format_value(v))
                        .unwrap_or_else(|| "N/A".to_string()),
                    difference: snapshot.difference(parameter),
                    trend: snapshot.trend(parameter),
                }
            })
            .collect();

        Self {
            timestamp: snapshot.current.as_ref().map(|r| r.timestamp),
            cards,
            cached,
            error,
        }
    }
}
