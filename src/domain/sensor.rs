// Sensor domain model
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Monitored refrigeration parameters, one column each in the sensor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorParameter {
    EvaporatorCoilTemperature,
    FreezerTemperature,
    FridgeTemperature,
    AirTemperature,
    Humidity,
    CompressorVibration,
    CompressorCurrent,
    InputVoltage,
    GasLeakageLevel,
    PowerConsumption,
    TemperatureDiff,
    CompressorVibrationX,
    CompressorVibrationY,
    CompressorVibrationZ,
}

impl SensorParameter {
    pub const ALL: [SensorParameter; 14] = [
        SensorParameter::EvaporatorCoilTemperature,
        SensorParameter::FreezerTemperature,
        SensorParameter::FridgeTemperature,
        SensorParameter::AirTemperature,
        SensorParameter::Humidity,
        SensorParameter::CompressorVibration,
        SensorParameter::CompressorCurrent,
        SensorParameter::InputVoltage,
        SensorParameter::GasLeakageLevel,
        SensorParameter::PowerConsumption,
        SensorParameter::TemperatureDiff,
        SensorParameter::CompressorVibrationX,
        SensorParameter::CompressorVibrationY,
        SensorParameter::CompressorVibrationZ,
    ];

    /// Parameters shown as dashboard cards.
    pub const DASHBOARD: [SensorParameter; 11] = [
        SensorParameter::EvaporatorCoilTemperature,
        SensorParameter::FreezerTemperature,
        SensorParameter::FridgeTemperature,
        SensorParameter::AirTemperature,
        SensorParameter::Humidity,
        SensorParameter::CompressorVibration,
        SensorParameter::CompressorCurrent,
        SensorParameter::InputVoltage,
        SensorParameter::GasLeakageLevel,
        SensorParameter::PowerConsumption,
        SensorParameter::TemperatureDiff,
    ];

    pub const VIBRATION: [SensorParameter; 4] = [
        SensorParameter::CompressorVibration,
        SensorParameter::CompressorVibrationX,
        SensorParameter::CompressorVibrationY,
        SensorParameter::CompressorVibrationZ,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            SensorParameter::EvaporatorCoilTemperature => "evaporator_coil_temperature",
            SensorParameter::FreezerTemperature => "freezer_temperature",
            SensorParameter::FridgeTemperature => "fridge_temperature",
            SensorParameter::AirTemperature => "air_temperature",
            SensorParameter::Humidity => "humidity",
            SensorParameter::CompressorVibration => "compressor_vibration",
            SensorParameter::CompressorCurrent => "compressor_current",
            SensorParameter::InputVoltage => "input_voltage",
            SensorParameter::GasLeakageLevel => "gas_leakage_level",
            SensorParameter::PowerConsumption => "power_consumption",
            SensorParameter::TemperatureDiff => "temperature_diff",
            SensorParameter::CompressorVibrationX => "compressor_vibration_x",
            SensorParameter::CompressorVibrationY => "compressor_vibration_y",
            SensorParameter::CompressorVibrationZ => "compressor_vibration_z",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.column() == column)
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SensorParameter::EvaporatorCoilTemperature
            | SensorParameter::FreezerTemperature
            | SensorParameter::FridgeTemperature
            | SensorParameter::AirTemperature
            | SensorParameter::TemperatureDiff => "°C",
            SensorParameter::Humidity => "%",
            SensorParameter::CompressorVibration
            | SensorParameter::CompressorVibrationX
            | SensorParameter::CompressorVibrationY
            | SensorParameter::CompressorVibrationZ => "mm/s",
            SensorParameter::CompressorCurrent => "A",
            SensorParameter::InputVoltage => "V",
            SensorParameter::PowerConsumption => "W",
            SensorParameter::GasLeakageLevel => "ppm",
        }
    }

    /// "freezer_temperature" -> "Freezer Temperature"
    pub fn display_name(&self) -> String {
        self.column()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parameters where a falling reading is the good direction.
    pub fn decreasing_is_better(&self) -> bool {
        matches!(
            self,
            SensorParameter::CompressorVibration
                | SensorParameter::GasLeakageLevel
                | SensorParameter::PowerConsumption
        )
    }

    pub fn format_value(&self, value: f64) -> String {
        match self {
            SensorParameter::EvaporatorCoilTemperature
            | SensorParameter::FreezerTemperature
            | SensorParameter::FridgeTemperature
            | SensorParameter::AirTemperature
            | SensorParameter::TemperatureDiff
            | SensorParameter::Humidity => format!("{:.1}{}", value, self.unit()),
            _ => format!("{:.2}{}", value, self.unit()),
        }
    }
}

/// One timestamped row of the sensor table. Missing or non-numeric
/// columns are simply absent from `values`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<SensorParameter, f64>,
}

impl SensorReading {
    pub fn new(timestamp: DateTime<Utc>, values: BTreeMap<SensorParameter, f64>) -> Self {
        Self { timestamp, values }
    }

    /// Decode a store row. Returns `None` when the timestamp is missing or
    /// unparseable; individual malformed values are dropped.
    pub fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let timestamp = parse_timestamp(row.get("timestamp")?)?;
        let values = SensorParameter::ALL
            .into_iter()
            .filter_map(|p| row.get(p.column()).and_then(numeric_value).map(|v| (p, v)))
            .collect();
        Some(Self { timestamp, values })
    }

    pub fn value(&self, parameter: SensorParameter) -> Option<f64> {
        self.values.get(&parameter).copied()
    }
}

/// Current and previous readings held by the snapshot cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub current: Option<SensorReading>,
    pub previous: Option<SensorReading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Stable,
    Up,
    Down,
}

const STABLE_EPSILON: f64 = 0.001;

impl SensorSnapshot {
    pub fn new(current: Option<SensorReading>, previous: Option<SensorReading>) -> Self {
        Self { current, previous }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// current - previous, or 0 when either side lacks the value.
    pub fn difference(&self, parameter: SensorParameter) -> f64 {
        let current = self.current.as_ref().and_then(|r| r.value(parameter));
        let previous = self.previous.as_ref().and_then(|r| r.value(parameter));
        match (current, previous) {
            (Some(c), Some(p)) => c - p,
            _ => 0.0,
        }
    }

    pub fn trend(&self, parameter: SensorParameter) -> TrendDirection {
        let diff = self.difference(parameter);
        if diff.abs() < STABLE_EPSILON {
            return TrendDirection::Stable;
        }

        let favourable = if parameter.decreasing_is_better() {
            diff < 0.0
        } else {
            diff > 0.0
        };

        if favourable {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        }
    }
}

pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // PostgREST returns `timestamp without time zone` columns without an offset
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Finite number, or a numeric string. Anything else is malformed.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(ts: &str, pairs: &[(SensorParameter, f64)]) -> SensorReading {
        SensorReading::new(
            DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            pairs.iter().copied().collect(),
        )
    }

    #[test]
    fn test_display_name_and_unit() {
        assert_eq!(SensorParameter::FreezerTemperature.display_name(), "Freezer Temperature");
        assert_eq!(SensorParameter::CompressorVibrationX.display_name(), "Compressor Vibration X");
        assert_eq!(SensorParameter::GasLeakageLevel.unit(), "ppm");
        assert_eq!(SensorParameter::from_column("humidity"), Some(SensorParameter::Humidity));
        assert_eq!(SensorParameter::from_column("nope"), None);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(SensorParameter::FreezerTemperature.format_value(-18.26), "-18.3°C");
        assert_eq!(SensorParameter::CompressorCurrent.format_value(4.5), "4.50A");
    }

    #[test]
    fn test_from_row_drops_malformed_values() {
        let row = json!({
            "timestamp": "2025-03-01T10:00:00Z",
            "humidity": 41.5,
            "freezer_temperature": "-18.0",
            "input_voltage": "n/a",
            "compressor_current": null,
        });
        let reading = SensorReading::from_row(row.as_object().unwrap()).unwrap();

        assert_eq!(reading.value(SensorParameter::Humidity), Some(41.5));
        assert_eq!(reading.value(SensorParameter::FreezerTemperature), Some(-18.0));
        assert_eq!(reading.value(SensorParameter::InputVoltage), None);
        assert_eq!(reading.value(SensorParameter::CompressorCurrent), None);
    }

    #[test]
    fn test_from_row_requires_timestamp() {
        let row = json!({ "timestamp": "yesterday", "humidity": 40.0 });
        assert!(SensorReading::from_row(row.as_object().unwrap()).is_none());

        let row = json!({ "timestamp": "2025-03-01T10:00:00.250", "humidity": 40.0 });
        assert!(SensorReading::from_row(row.as_object().unwrap()).is_some());
    }

    #[test]
    fn test_trend_direction() {
        let snapshot = SensorSnapshot::new(
            Some(reading(
                "2025-03-01T10:00:05Z",
                &[
                    (SensorParameter::Humidity, 45.0),
                    (SensorParameter::GasLeakageLevel, 12.0),
                    (SensorParameter::InputVoltage, 230.0),
                ],
            )),
            Some(reading(
                "2025-03-01T10:00:00Z",
                &[
                    (SensorParameter::Humidity, 40.0),
                    (SensorParameter::GasLeakageLevel, 10.0),
                    (SensorParameter::InputVoltage, 230.0005),
                ],
            )),
        );

        assert_eq!(snapshot.difference(SensorParameter::Humidity), 5.0);
        assert_eq!(snapshot.trend(SensorParameter::Humidity), TrendDirection::Up);
        // rising gas leakage is bad
        assert_eq!(snapshot.trend(SensorParameter::GasLeakageLevel), TrendDirection::Down);
        assert_eq!(snapshot.trend(SensorParameter::InputVoltage), TrendDirection::Stable);
        assert_eq!(snapshot.difference(SensorParameter::AirTemperature), 0.0);
    }
}
