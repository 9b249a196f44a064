// PostgREST repository implementation
use crate::application::telemetry_repository::{Row, RowQuery, StoreError, TelemetryRepository};
use crate::infrastructure::realtime;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct PostgrestRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestRepository {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// `{base}/rest/v1/{table}?select=..&col=op.value&order=col.dir&limit=n`
    fn build_query_url(&self, query: &RowQuery) -> String {
        let mut url = format!(
            "{}/rest/v1/{}?select={}",
            self.base_url,
            urlencoding::encode(&query.table),
            urlencoding::encode(&query.column_list())
        );

        for filter in &query.filters {
            url.push_str(&format!(
                "&{}={}.{}",
                urlencoding::encode(&filter.column),
                filter.op.as_str(),
                urlencoding::encode(&filter.value)
            ));
        }

        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            url.push_str(&format!("&order={}.{}", urlencoding::encode(&order.column), direction));
        }

        if let Some(limit) = query.limit {
            url.push_str(&format!("&limit={}", limit));
        }

        url
    }
}

#[async_trait]
impl TelemetryRepository for PostgrestRepository {
    async fn select(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        let url = self.build_query_url(query);
        tracing::debug!("Executing select: {}", url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn subscribe_inserts(&self, table: &str) -> Result<mpsc::Receiver<Row>, StoreError> {
        let url = realtime::realtime_url(&self.base_url, &self.api_key)?;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(realtime::run(url, table.to_string(), tx));
        Ok(rx)
    }
}
