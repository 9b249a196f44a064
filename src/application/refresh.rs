// Periodic refresh timers and the realtime listener
use crate::application::prediction_service::PredictionService;
use crate::application::time_series_store::TimeSeriesStore;
use crate::domain::prediction::PredictionWindow;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    pub ttl_check: Duration,
    pub sensor: Duration,
    pub prediction: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            ttl_check: Duration::from_secs(10),
            sensor: Duration::from_secs(30),
            prediction: Duration::from_secs(60),
        }
    }
}

/// Owns every background task; shutting down (or dropping) aborts them all so
/// no callback outlives its consumer.
#[derive(Default)]
pub struct RefreshScheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn start(
        store: Arc<TimeSeriesStore>,
        predictions: PredictionService,
        settings: RefreshSettings,
    ) -> Self {
        let mut scheduler = Self::default();

        let ttl_store = store.clone();
        scheduler.every(settings.ttl_check, move || {
            let store = ttl_store.clone();
            async move {
                store.get(false).await;
            }
        });

        scheduler.every(settings.sensor, move || {
            let store = store.clone();
            async move {
                if let Some(error) = store.get(true).await.error() {
                    tracing::warn!("Sensor refresh failed: {}", error);
                }
            }
        });

        scheduler.every(settings.prediction, move || {
            let predictions = predictions.clone();
            async move {
                for window in [
                    PredictionWindow::Present,
                    PredictionWindow::Last7Days,
                    PredictionWindow::AllTime,
                ] {
                    predictions.stats(window).await;
                }
            }
        });

        scheduler
    }

    fn every<F, Fut>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let period = if period.is_zero() {
            tracing::warn!("Zero refresh period, using {:?}", MIN_PERIOD);
            MIN_PERIOD
        } else {
            period
        };
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tick().await;
            }
        }));
    }

    /// Start feeding realtime inserts into the store.
    pub async fn attach_listener(&mut self, store: Arc<TimeSeriesStore>) -> anyhow::Result<()> {
        let handle = store.listen().await?;
        self.tasks.push(handle);
        Ok(())
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!("Refresh timers stopped");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            self.shutdown();
        }
    }
}
