// Realtime insert subscription over the Phoenix websocket protocol
use crate::application::telemetry_repository::{Row, StoreError};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct PhoenixMessage {
    topic: String,
    event: &'static str,
    payload: Value,
    #[serde(rename = "ref")]
    reference: String,
}

/// Websocket endpoint for a project base URL.
pub fn realtime_url(base_url: &str, api_key: &str) -> Result<String, StoreError> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        return Err(StoreError::Subscription(format!(
            "unsupported store url scheme: {}",
            base_url
        )));
    };

    Ok(format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        ws_base,
        urlencoding::encode(api_key)
    ))
}

fn topic(table: &str) -> String {
    format!("realtime:public:{}", table)
}

fn join_message(table: &str) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic(table),
        event: "phx_join",
        payload: json!({
            "config": {
                "postgres_changes": [
                    { "event": "INSERT", "schema": "public", "table": table }
                ]
            }
        }),
        reference: "1".to_string(),
    }
}

fn heartbeat_message(seq: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat",
        payload: json!({}),
        reference: seq.to_string(),
    }
}

/// Pull the inserted record out of a change notification. Newer servers
/// nest it under `payload.data.record`, older ones under `payload.record`.
pub fn extract_inserted_record(text: &str) -> Option<Row> {
    let message: Value = serde_json::from_str(text).ok()?;
    let payload = message.get("payload")?;

    let (record, change_type) = match payload.get("data") {
        Some(data) => (data.get("record")?, data.get("type")),
        None => (payload.get("record")?, payload.get("type")),
    };

    if let Some(kind) = change_type.and_then(Value::as_str) {
        if kind != "INSERT" {
            return None;
        }
    }

    record.as_object().cloned()
}

/// Join `realtime:public:{table}` for INSERT changes and forward each
/// inserted record to `tx`. Heartbeats keep the socket alive and a dropped
/// connection is retried after a fixed delay, until `tx` is closed.
pub async fn run(url: String, table: String, tx: mpsc::Sender<Row>) {
    while !tx.is_closed() {
        tracing::info!(table = %table, "Connecting to realtime endpoint");

        match connect_async(url.as_str()).await {
            Ok((ws_stream, _response)) => {
                tracing::info!(table = %table, "Realtime connected");
                run_session(ws_stream, &table, &tx).await;
                if tx.is_closed() {
                    break;
                }
                tracing::warn!(table = %table, "Realtime session ended, reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "Realtime connection failed");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = tx.closed() => break,
        }
    }
    tracing::info!(table = %table, "Realtime subscription closed");
}

async fn run_session(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    table: &str,
    tx: &mpsc::Sender<Row>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    if let Err(e) = send(&mut sink, &join_message(table)).await {
        tracing::error!(error = %e, "Failed to join realtime channel");
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.reset();
    let mut seq: u64 = 1;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            _ = heartbeat.tick() => {
                seq += 1;
                if let Err(e) = send(&mut sink, &heartbeat_message(seq)).await {
                    tracing::error!(error = %e, "Failed to send heartbeat");
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(row) = extract_inserted_record(&text) {
                            if tx.send(row).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Realtime server closed the socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Realtime receive error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

async fn send<S>(sink: &mut S, message: &PhoenixMessage) -> Result<(), StoreError>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message).map_err(|e| StoreError::Subscription(e.to_string()))?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| StoreError::Subscription(e.to_string()))
}
