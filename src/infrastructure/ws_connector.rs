// WebSocket connector - One task per connection attempt, talking to the session by events
use crate::application::session::EventSender;
use crate::application::transport::{
    ConnectTarget, ConnectionEvent, ConnectionHandle, Connector, OutboundRequest, PayloadError,
    ViewKind,
};
use crate::infrastructure::wire::{decode_snapshot, encode_request};
use anyhow::{Context, bail};
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

#[derive(Debug, Clone)]
pub struct WsConnector {
    ws_base: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(ws_base: String, connect_timeout: Duration) -> Self {
        Self {
            ws_base: ws_base.trim_end_matches('/').to_string(),
            connect_timeout,
        }
    }

    /// `/ws/{unit}` for the dashboard rows, `/ws/hourly/{unit}` for the hourly breakdown.
    pub fn endpoint(&self, target: &ConnectTarget) -> String {
        let unit = urlencoding::encode(target.unit.as_str());
        match target.view {
            ViewKind::Dashboard => format!("{}/ws/{}", self.ws_base, unit),
            ViewKind::Hourly => format!("{}/ws/hourly/{}", self.ws_base, unit),
        }
    }
}

impl Connector for WsConnector {
    fn connect(&self, target: ConnectTarget, events: EventSender) -> ConnectionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = self.endpoint(&target);
        let id = target.connection;
        let connect_timeout = self.connect_timeout;

        let task = tokio::spawn(async move {
            match drive(&url, &target, rx, &events, connect_timeout).await {
                Ok(()) => {
                    tracing::debug!(unit = %target.unit, connection = target.connection, "connection closed by client");
                }
                Err(e) => {
                    tracing::warn!(unit = %target.unit, connection = target.connection, error = %e, "connection failed");
                    target.emit(
                        &events,
                        ConnectionEvent::Lost {
                            reason: format!("{e:#}"),
                        },
                    );
                }
            }
        });

        ConnectionHandle::new(id, tx, Some(task.abort_handle()))
    }
}

/// Run one connection until the client drops its handle (`Ok`) or the transport fails (`Err`).
///
/// The backend answers requests on a socket one at a time, so each inbound frame is
/// attributed to the oldest request still awaiting an answer.
async fn drive(
    url: &str,
    target: &ConnectTarget,
    mut outbound: mpsc::UnboundedReceiver<OutboundRequest>,
    events: &EventSender,
    connect_timeout: Duration,
) -> anyhow::Result<()> {
    tracing::debug!(url, "connecting");
    let (stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .context("connect timed out")?
        .with_context(|| format!("failed to connect to {url}"))?;

    if !target.emit(events, ConnectionEvent::Opened) {
        return Ok(());
    }

    let (mut write, mut read) = stream.split();
    let mut awaiting: VecDeque<u64> = VecDeque::new();

    loop {
        tokio::select! {
            request = outbound.recv() => {
                let Some(request) = request else {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                };
                let body = encode_request(&request.request).context("failed to encode request")?;
                write
                    .send(Message::Text(body))
                    .await
                    .context("failed to send request")?;
                awaiting.push_back(request.generation);
            }
            frame = read.next() => {
                let payload = match frame {
                    Some(Ok(Message::Text(text))) => decode_snapshot(target.view, text.as_bytes()),
                    Some(Ok(Message::Binary(bytes))) => decode_snapshot(target.view, &bytes),
                    Some(Ok(Message::Close(frame))) => {
                        bail!("closed by server: {}", frame.map(|f| f.reason.to_string()).unwrap_or_default())
                    }
                    Some(Ok(Message::Frame(_))) => Err(PayloadError::UnsupportedFrame("raw frame".into())),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e).context("websocket error"),
                    None => bail!("connection closed"),
                };
                // Unsolicited frames carry generation 0 and are never current.
                let generation = awaiting.pop_front().unwrap_or(0);
                if !target.emit(events, ConnectionEvent::Payload { generation, payload }) {
                    return Ok(());
                }
            }
        }
    }
}
