// Dashboard service - Use case for the live sensor cards
use crate::application::time_series_store::{FetchOutcome, TimeSeriesStore};
use crate::domain::dashboard::Dashboard;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<TimeSeriesStore>,
}

impl DashboardService {
    pub fn new(store: Arc<TimeSeriesStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    pub async fn get_dashboard(&self, force_refresh: bool) -> Dashboard {
        let outcome = self.store.get(force_refresh).await;
        let cached = matches!(outcome, FetchOutcome::Cached(_));
        let error = outcome.error().map(str::to_string);
        Dashboard::from_snapshot(outcome.snapshot(), cached, error)
    }

    /// The current dashboard, then one per store update. Lagging consumers
    /// skip the updates they missed.
    pub async fn updates(&self) -> BoxStream<'static, Dashboard> {
        let initial = self.get_dashboard(false).await;
        let mut changes = BroadcastStream::new(self.store.subscribe());
        Box::pin(async_stream::stream! {
            yield initial;
            while let Some(change) = changes.next().await {
                match change {
                    Ok(snapshot) => {
                        yield Dashboard::from_snapshot(&snapshot, false, None);
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!("Dashboard stream lagged, skipped {} updates", skipped);
                    }
                }
            }
        })
    }
}
