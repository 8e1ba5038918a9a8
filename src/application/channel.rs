// Channel - One unit's live subscription and its connection state machine
use crate::application::resync::TimerHandle;
use crate::application::transport::{
    ChannelError, ConnectionHandle, ConnectionId, Dialer, OutboundRequest, PayloadError, ViewKind,
    WindowRequest,
};
use crate::domain::metrics::Snapshot;
use crate::domain::unit::UnitId;
use crate::domain::window::TimeWindow;
use chrono::NaiveDateTime;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
    /// Closed after an abrupt loss, with a backoff retry pending.
    Reconnecting,
}

/// How channels of one view behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewProfile {
    pub kind: ViewKind,
    pub resync_interval: Duration,
    /// `Some` makes lost connections retry on their own after the delay.
    pub reconnect_delay: Option<Duration>,
    /// Re-anchor to the current shift once it starts.
    pub follow_shift: bool,
}

impl ViewProfile {
    pub fn dashboard(resync_interval: Duration) -> Self {
        Self {
            kind: ViewKind::Dashboard,
            resync_interval,
            reconnect_delay: None,
            follow_shift: false,
        }
    }

    pub fn hourly(resync_interval: Duration, reconnect_delay: Duration) -> Self {
        Self {
            kind: ViewKind::Hourly,
            resync_interval,
            reconnect_delay: Some(reconnect_delay),
            follow_shift: true,
        }
    }
}

/// Outcome of handing a payload to a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Applied,
    /// A newer request has been sent since; dropped without effect.
    Stale,
    NotOpen,
    Rejected(PayloadError),
}

#[derive(Debug)]
pub struct Channel {
    unit: UnitId,
    view: ViewKind,
    state: ConnectionState,
    anchor: Option<TimeWindow>,
    pending_window: Option<TimeWindow>,
    last_snapshot: Option<Snapshot>,
    retry_count: u32,
    connection: Option<ConnectionHandle>,
    generation: u64,
    last_resync_end: Option<NaiveDateTime>,
    resync_timer: Option<TimerHandle>,
    retry_timer: Option<TimerHandle>,
}

impl Channel {
    pub fn new(unit: UnitId, view: ViewKind) -> Self {
        Self {
            unit,
            view,
            state: ConnectionState::Closed,
            anchor: None,
            pending_window: None,
            last_snapshot: None,
            retry_count: 0,
            connection: None,
            generation: 0,
            last_resync_end: None,
            resync_timer: None,
            retry_timer: None,
        }
    }

    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn anchor(&self) -> Option<TimeWindow> {
        self.anchor
    }

    /// Window the next successful handshake will anchor to, falling back to the current anchor.
    pub fn reopen_window(&self) -> Option<TimeWindow> {
        self.pending_window.or(self.anchor)
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(ConnectionHandle::id)
    }

    #[cfg(test)]
    pub fn has_resync_timer(&self) -> bool {
        self.resync_timer.is_some()
    }

    /// Start a fresh connection attempt anchored (on success) to `window`.
    /// Any previous connection and timers are dropped first.
    pub fn open(&mut self, window: TimeWindow, dialer: &mut Dialer) {
        self.release();
        self.pending_window = Some(window);
        self.connection = Some(dialer.dial(&self.unit, self.view));
        self.state = ConnectionState::Opening;
    }

    /// Handshake completed: anchor the pending window and ask for the whole span.
    /// Returns the generation of the initial request, or `None` if the channel was not opening.
    pub fn on_opened(&mut self) -> Result<Option<u64>, ChannelError> {
        if self.state != ConnectionState::Opening {
            return Ok(None);
        }
        let window = self
            .pending_window
            .take()
            .ok_or_else(|| ChannelError::NotAnchored(self.unit.clone()))?;

        self.state = ConnectionState::Open;
        self.retry_count = 0;
        self.anchor = Some(window);
        self.last_resync_end = None;
        self.send(WindowRequest {
            window,
            initial: true,
        })
        .map(Some)
    }

    /// Operator-chosen window. Re-anchors an open channel, otherwise (re)opens with it.
    pub fn refresh(&mut self, window: TimeWindow, dialer: &mut Dialer) -> Result<(), ChannelError> {
        match self.state {
            ConnectionState::Open => {
                self.anchor = Some(window);
                self.last_resync_end = None;
                // The initial response arms a fresh timer.
                self.resync_timer = None;
                self.send(WindowRequest {
                    window,
                    initial: true,
                })?;
            }
            ConnectionState::Opening => {
                self.pending_window = Some(window);
            }
            ConnectionState::Closed | ConnectionState::Reconnecting => {
                self.open(window, dialer);
            }
        }
        Ok(())
    }

    /// Periodic re-request: same anchor start, end moved up to `now`.
    /// Returns `None` when there is nothing to request yet.
    pub fn resync(&mut self, now: NaiveDateTime) -> Result<Option<u64>, ChannelError> {
        if self.state != ConnectionState::Open {
            return Ok(None);
        }
        let anchor = self
            .anchor
            .ok_or_else(|| ChannelError::NotAnchored(self.unit.clone()))?;

        let end = match self.last_resync_end {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        let Ok(window) = anchor.extended_to(end) else {
            return Ok(None);
        };

        self.last_resync_end = Some(end);
        self.send(WindowRequest {
            window,
            initial: false,
        })
        .map(Some)
    }

    fn send(&mut self, request: WindowRequest) -> Result<u64, ChannelError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| ChannelError::NotConnected(self.unit.clone()))?;
        self.generation += 1;
        connection.send(OutboundRequest {
            generation: self.generation,
            request,
        })?;
        Ok(self.generation)
    }

    /// Accept a payload only if it answers the latest request on an open channel.
    pub fn on_payload(&mut self, generation: u64, payload: Result<Snapshot, PayloadError>) -> Delivery {
        if self.state != ConnectionState::Open {
            return Delivery::NotOpen;
        }
        if generation != self.generation {
            return Delivery::Stale;
        }
        match payload {
            Ok(snapshot) => {
                self.last_snapshot = Some(snapshot);
                Delivery::Applied
            }
            Err(e) => Delivery::Rejected(e),
        }
    }

    /// Abrupt loss of the connection. Returns the state the channel was in.
    pub fn on_lost(&mut self) -> ConnectionState {
        let previous = self.state;
        self.release();
        self.state = ConnectionState::Closed;
        previous
    }

    /// Park a lost channel until its backoff timer fires.
    pub fn schedule_retry(&mut self, timer: TimerHandle) {
        self.retry_count += 1;
        self.retry_timer = Some(timer);
        self.state = ConnectionState::Reconnecting;
    }

    pub fn arm_resync(&mut self, timer: TimerHandle) {
        // Replacing the handle cancels any earlier timer, so they never stack.
        self.resync_timer = Some(timer);
    }

    pub fn take_resync_timer(&mut self, token: u64) -> bool {
        take_if_current(&mut self.resync_timer, token)
    }

    pub fn take_retry_timer(&mut self, token: u64) -> bool {
        take_if_current(&mut self.retry_timer, token)
    }

    /// Close from any state. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed && self.connection.is_none() {
            return;
        }
        self.release();
        self.pending_window = None;
        self.state = ConnectionState::Closed;
    }

    fn release(&mut self) {
        self.connection = None;
        self.resync_timer = None;
        self.retry_timer = None;
    }
}

fn take_if_current(slot: &mut Option<TimerHandle>, token: u64) -> bool {
    if slot.as_ref().map(TimerHandle::token) == Some(token) {
        slot.take();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{at, rows, FakeConnector};
    use crate::domain::metrics::Row;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn window(h1: u32, h2: u32) -> TimeWindow {
        TimeWindow::new(at(h1, 0, 0), at(h2, 0, 0)).unwrap()
    }

    fn setup() -> (Arc<FakeConnector>, Dialer, Channel) {
        let connector = Arc::new(FakeConnector::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let dialer = Dialer::new(connector.clone(), tx);
        (connector, dialer, Channel::new("LINE-A".into(), ViewKind::Dashboard))
    }

    #[test]
    fn test_open_then_handshake_sends_initial_request() {
        let (connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        assert_eq!(channel.state(), ConnectionState::Opening);
        assert_eq!(channel.anchor(), None);

        assert_eq!(channel.on_opened().unwrap(), Some(1));
        assert_eq!(channel.state(), ConnectionState::Open);
        assert_eq!(channel.anchor(), Some(window(8, 9)));

        let sent = connector.take_requests(&"LINE-A".into());
        assert_eq!(sent.len(), 1);
        assert!(sent[0].request.initial);
        assert_eq!(sent[0].request.window, window(8, 9));
    }

    #[test]
    fn test_out_of_order_response_is_stale() {
        let (_connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        channel.on_opened().unwrap();
        let second = channel.resync(at(9, 0, 30)).unwrap().unwrap();
        assert_eq!(second, 2);

        let newer = vec![Row::new("M2", 2, 0)];
        assert_eq!(channel.on_payload(2, Ok(Snapshot::Rows(newer.clone()))), Delivery::Applied);
        assert_eq!(channel.on_payload(1, Ok(rows("M1", 1, 0))), Delivery::Stale);
        assert_eq!(channel.last_snapshot(), Some(&Snapshot::Rows(newer)));
    }

    #[test]
    fn test_malformed_payload_keeps_channel_open() {
        let (_connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        channel.on_opened().unwrap();
        channel.on_payload(1, Ok(rows("M1", 1, 0)));

        let delivery = channel.on_payload(1, Err(PayloadError::Malformed("eof".into())));
        assert!(matches!(delivery, Delivery::Rejected(_)));
        assert_eq!(channel.state(), ConnectionState::Open);
        assert_eq!(channel.last_snapshot(), Some(&rows("M1", 1, 0)));
    }

    #[test]
    fn test_resync_keeps_anchor_start() {
        let (connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        channel.on_opened().unwrap();

        channel.resync(at(9, 0, 30)).unwrap();
        channel.resync(at(9, 1, 0)).unwrap();
        // wall clock stepping backwards must not shrink the window
        channel.resync(at(9, 0, 45)).unwrap();

        let sent = connector.take_requests(&"LINE-A".into());
        let resyncs: Vec<_> = sent.iter().filter(|r| !r.request.initial).collect();
        assert_eq!(resyncs.len(), 3);
        let mut previous_end = None;
        for r in resyncs {
            assert_eq!(r.request.window.start(), at(8, 0, 0));
            if let Some(prev) = previous_end {
                assert!(r.request.window.end() >= prev);
            }
            previous_end = Some(r.request.window.end());
        }
        assert_eq!(channel.anchor(), Some(window(8, 9)));
    }

    #[test]
    fn test_refresh_open_channel_reanchors() {
        let (connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        channel.on_opened().unwrap();

        channel.refresh(window(10, 12), &mut dialer).unwrap();
        channel.refresh(window(10, 12), &mut dialer).unwrap();

        let sent = connector.take_requests(&"LINE-A".into());
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].request, sent[2].request);
        assert!(sent[2].request.initial);
        assert_eq!(channel.anchor(), Some(window(10, 12)));
        assert_eq!(connector.connect_count(), 1);
    }

    #[test]
    fn test_refresh_closed_channel_reopens() {
        let (connector, mut dialer, mut channel) = setup();
        channel.refresh(window(8, 9), &mut dialer).unwrap();
        assert_eq!(channel.state(), ConnectionState::Opening);
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(channel.reopen_window(), Some(window(8, 9)));
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_payloads() {
        let (_connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        channel.on_opened().unwrap();

        channel.close();
        channel.close();
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(channel.connection_id(), None);
        assert_eq!(channel.on_payload(1, Ok(rows("M1", 1, 0))), Delivery::NotOpen);
        assert_eq!(channel.last_snapshot(), None);
    }

    #[test]
    fn test_retry_count_resets_on_open() {
        let (_connector, mut dialer, mut channel) = setup();
        channel.open(window(8, 9), &mut dialer);
        assert_eq!(channel.on_lost(), ConnectionState::Opening);
        assert_eq!(channel.state(), ConnectionState::Closed);
        channel.retry_count = 2;

        channel.open(window(8, 9), &mut dialer);
        channel.on_opened().unwrap();
        assert_eq!(channel.retry_count(), 0);
    }
}
