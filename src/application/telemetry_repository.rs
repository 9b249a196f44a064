// Repository trait for telemetry data access
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// One table row as returned by the store.
pub type Row = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request to data store failed: {0}")]
    Request(String),

    #[error("data store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode data store response: {0}")]
    Decode(String),

    #[error("realtime subscription failed: {0}")]
    Subscription(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Gte,
    Lte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Narrow select: columns, range filters, a single ordering and a limit.
#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn select(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Gte,
            value: value.to_string(),
        });
        self
    }

    pub fn lte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Lte,
            value: value.to_string(),
        });
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Comma separated column list, `*` when none were given.
    pub fn column_list(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        }
    }
}

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Run a select and return the matching rows
    async fn select(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError>;

    /// Stream newly inserted rows of `table`. The subscription ends when the
    /// receiver is dropped.
    async fn subscribe_inserts(&self, table: &str) -> Result<mpsc::Receiver<Row>, StoreError>;
}
