// In-memory repository and manual clock for service tests
use crate::application::clock::Clock;
use crate::application::telemetry_repository::{
    FilterOp, Row, RowQuery, StoreError, TelemetryRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Self::new(Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct FakeRepository {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    subscribers: Mutex<Vec<mpsc::Sender<Row>>>,
    selects: AtomicUsize,
    failing: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &str, row: Value) {
        let row = row.as_object().cloned().expect("fake rows are JSON objects");
        self.tables.lock().unwrap().entry(table.to_string()).or_default().push(row);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every later select wait until the returned handle is notified.
    pub fn hold_selects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn select_count(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub async fn push(&self, row: Value) {
        let row = row.as_object().cloned().expect("fake rows are JSON objects");
        let subscribers: Vec<_> = self.subscribers.lock().unwrap().clone();
        for tx in subscribers {
            let _ = tx.send(row.clone()).await;
        }
    }
}

fn timestamp_of(row: &Row, column: &str) -> Option<DateTime<Utc>> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl TelemetryRepository for FakeRepository {
    async fn select(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Request("connection refused".to_string()));
        }

        let mut rows = self
            .tables
            .lock()
            .unwrap()
            .get(&query.table)
            .cloned()
            .unwrap_or_default();

        for filter in &query.filters {
            let bound = DateTime::parse_from_rfc3339(&filter.value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            rows.retain(|row| match timestamp_of(row, &filter.column) {
                Some(ts) => match filter.op {
                    FilterOp::Gte => ts >= bound,
                    FilterOp::Lte => ts <= bound,
                },
                None => false,
            });
        }

        if let Some(order) = &query.order {
            rows.sort_by_key(|row| timestamp_of(row, &order.column));
            if !order.ascending {
                rows.reverse();
            }
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn subscribe_inserts(&self, _table: &str) -> Result<mpsc::Receiver<Row>, StoreError> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }
}
