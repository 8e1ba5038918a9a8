// Connection seam between channels and the streaming backend
use crate::application::session::{EventSender, SessionEvent};
use crate::domain::metrics::Snapshot;
use crate::domain::unit::UnitId;
use crate::domain::window::TimeWindow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Identifies one connection attempt. Unique for the whole session, so events from a
/// replaced or closed connection can never be mistaken for the current one.
pub type ConnectionId = u64;

/// Which endpoint family a channel talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Per-model rows for the multi-unit dashboard.
    Dashboard,
    /// Single-unit hourly breakdown.
    Hourly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest {
    pub window: TimeWindow,
    /// Set for a full anchored-span request, clear for a periodic resync.
    pub initial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundRequest {
    pub generation: u64,
    pub request: WindowRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("connection {0} is no longer accepting requests")]
    Disconnected(ConnectionId),
    #[error("channel for {0} has no open connection")]
    NotConnected(UnitId),
    #[error("channel for {0} has no anchored window")]
    NotAnchored(UnitId),
}

/// What a connection reports back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    Payload {
        generation: u64,
        payload: Result<Snapshot, PayloadError>,
    },
    Lost {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub unit: UnitId,
    pub view: ViewKind,
    pub connection: ConnectionId,
}

impl ConnectTarget {
    /// Post an event for this connection. Returns false once the session is gone.
    pub fn emit(&self, events: &EventSender, event: ConnectionEvent) -> bool {
        events
            .send(SessionEvent::Connection {
                unit: self.unit.clone(),
                connection: self.connection,
                event,
            })
            .is_ok()
    }
}

/// Opens streaming connections. Implementations run the I/O in their own task and only ever
/// talk to the session through `events`.
pub trait Connector: Send + Sync {
    fn connect(&self, target: ConnectTarget, events: EventSender) -> ConnectionHandle;
}

/// Owning handle for one connection attempt. Dropping it tears the connection down.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<OutboundRequest>,
    task: Option<AbortHandle>,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<OutboundRequest>,
        task: Option<AbortHandle>,
    ) -> Self {
        Self { id, outbound, task }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, request: OutboundRequest) -> Result<(), ChannelError> {
        self.outbound
            .send(request)
            .map_err(|_| ChannelError::Disconnected(self.id))
    }
}

/// How long a dropped connection gets to close cleanly before its task is aborted.
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        // Dropping `outbound` tells the task to close; the abort only catches a task stuck in I/O.
        let Some(task) = self.task.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(CLOSE_GRACE).await;
                    task.abort();
                });
            }
            Err(_) => task.abort(),
        }
    }
}

/// Hands out session-unique connection ids and opens connections through the connector.
pub struct Dialer {
    connector: Arc<dyn Connector>,
    events: EventSender,
    last_connection: ConnectionId,
}

impl Dialer {
    pub fn new(connector: Arc<dyn Connector>, events: EventSender) -> Self {
        Self {
            connector,
            events,
            last_connection: 0,
        }
    }

    pub fn dial(&mut self, unit: &UnitId, view: ViewKind) -> ConnectionHandle {
        self.last_connection += 1;
        let target = ConnectTarget {
            unit: unit.clone(),
            view,
            connection: self.last_connection,
        };
        tracing::debug!(unit = %unit, connection = target.connection, ?view, "dialing");
        self.connector.connect(target, self.events.clone())
    }
}
