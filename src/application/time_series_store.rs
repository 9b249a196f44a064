// Snapshot cache - the two most recent sensor readings
use crate::application::clock::Clock;
use crate::application::telemetry_repository::{Row, RowQuery, TelemetryRepository};
use crate::domain::sensor::{SensorReading, SensorSnapshot};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub debounce: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::milliseconds(10_000),
            debounce: Duration::milliseconds(500),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    captured_at: DateTime<Utc>,
    snapshot: SensorSnapshot,
}

#[derive(Debug, Default)]
struct StoreState {
    entry: Option<CacheEntry>,
    /// Bumped by every refresh request and every applied push; a fetch
    /// only commits if nothing was issued after it.
    generation: u64,
}

/// Result of a snapshot read.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Served from a non-stale cache entry without touching the store
    Cached(SensorSnapshot),
    /// Fetched and committed to the cache
    Fetched(SensorSnapshot),
    /// A newer request or push landed first; the cached snapshot is returned
    Superseded(SensorSnapshot),
    /// The store query failed; the cache is untouched
    Failed { snapshot: SensorSnapshot, error: String },
}

impl FetchOutcome {
    pub fn snapshot(&self) -> &SensorSnapshot {
        match self {
            FetchOutcome::Cached(s) | FetchOutcome::Fetched(s) | FetchOutcome::Superseded(s) => s,
            FetchOutcome::Failed { snapshot, .. } => snapshot,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied,
    Debounced,
    Malformed,
}

pub struct TimeSeriesStore {
    repository: Arc<dyn TelemetryRepository>,
    clock: Arc<dyn Clock>,
    table: String,
    settings: CacheSettings,
    state: Mutex<StoreState>,
    updates: broadcast::Sender<SensorSnapshot>,
}

impl TimeSeriesStore {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        clock: Arc<dyn Clock>,
        table: impl Into<String>,
        settings: CacheSettings,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            repository,
            clock,
            table: table.into(),
            settings,
            state: Mutex::new(StoreState::default()),
            updates,
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot changes, for live streaming.
    pub fn subscribe(&self) -> broadcast::Receiver<SensorSnapshot> {
        self.updates.subscribe()
    }

    pub fn cached(&self) -> Option<SensorSnapshot> {
        self.state().entry.as_ref().map(|e| e.snapshot.clone())
    }

    pub async fn get(&self, force_refresh: bool) -> FetchOutcome {
        let now = self.clock.now();

        let token = {
            let mut state = self.state();
            if !force_refresh {
                if let Some(entry) = &state.entry {
                    if now - entry.captured_at < self.settings.ttl {
                        tracing::debug!("Serving sensor snapshot from cache");
                        return FetchOutcome::Cached(entry.snapshot.clone());
                    }
                }
            }
            state.generation += 1;
            state.generation
        };

        let query = RowQuery::select(&self.table).order("timestamp", false).limit(2);
        let rows = match self.repository.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Error fetching latest sensor data: {}", e);
                return FetchOutcome::Failed {
                    snapshot: self.cached().unwrap_or_default(),
                    error: format!("fetch failed: {}", e),
                };
            }
        };

        let mut readings = rows.iter().filter_map(|row| {
            let reading = SensorReading::from_row(row);
            if reading.is_none() {
                tracing::warn!("Skipping sensor row with malformed timestamp");
            }
            reading
        });
        let current = readings.next();
        let previous = readings.next();

        if current.is_none() {
            tracing::debug!("Sensor table returned no rows, keeping cache");
            return FetchOutcome::Fetched(SensorSnapshot::default());
        }

        let snapshot = SensorSnapshot::new(current, previous);

        let mut state = self.state();
        if state.generation != token {
            tracing::debug!(token, latest = state.generation, "Discarding superseded sensor fetch");
            let cached = state.entry.as_ref().map(|e| e.snapshot.clone()).unwrap_or_default();
            return FetchOutcome::Superseded(cached);
        }

        state.entry = Some(CacheEntry {
            captured_at: now,
            snapshot: snapshot.clone(),
        });
        drop(state);

        let _ = self.updates.send(snapshot.clone());
        FetchOutcome::Fetched(snapshot)
    }

    /// Apply a pushed INSERT row. Pushes arriving within the debounce window
    /// of the last cache write are dropped.
    pub fn apply_push(&self, row: &Row) -> PushOutcome {
        let Some(reading) = SensorReading::from_row(row) else {
            tracing::warn!("Ignoring pushed sensor row with malformed timestamp");
            return PushOutcome::Malformed;
        };

        let now = self.clock.now();
        let mut state = self.state();

        let previous = match &state.entry {
            Some(entry) if now - entry.captured_at < self.settings.debounce => {
                tracing::debug!("Dropping sensor push inside debounce window");
                return PushOutcome::Debounced;
            }
            Some(entry) => entry.snapshot.current.clone(),
            None => None,
        };

        let snapshot = SensorSnapshot::new(Some(reading), previous);
        state.generation += 1;
        state.entry = Some(CacheEntry {
            captured_at: now,
            snapshot: snapshot.clone(),
        });
        drop(state);

        tracing::info!("New sensor data received via subscription");
        let _ = self.updates.send(snapshot);
        PushOutcome::Applied
    }

    /// Subscribe to sensor inserts and feed them into the cache until the
    /// returned task is aborted or the subscription ends.
    pub async fn listen(self: Arc<Self>) -> anyhow::Result<JoinHandle<()>> {
        let mut rx = self.repository.subscribe_inserts(&self.table).await?;
        let store = self.clone();

        Ok(tokio::spawn(async move {
            while let Some(row) = rx.recv().await {
                store.apply_push(&row);
            }
            tracing::info!("Sensor subscription closed");
        }))
    }
}
