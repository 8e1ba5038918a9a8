// Session controller - Owns the registry and reacts to one event at a time
use crate::application::aggregator::Aggregator;
use crate::application::channel::{Channel, Delivery, ViewProfile};
use crate::application::clock::Clock;
use crate::application::command::{InputError, OperatorCommand};
use crate::application::registry::ChannelRegistry;
use crate::application::resync::{ResyncScheduler, Tick};
use crate::application::sink::PresentationSink;
use crate::application::transport::{
    ConnectionEvent, ConnectionId, Connector, Dialer, PayloadError, ViewKind,
};
use crate::domain::metrics::Snapshot;
use crate::domain::unit::{UnitId, UnitListing};
use crate::domain::window::{ShiftTable, TimeWindow};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Everything the session reacts to. Connections, timers and the operator all post here.
#[derive(Debug)]
pub enum SessionEvent {
    Connection {
        unit: UnitId,
        connection: ConnectionId,
        event: ConnectionEvent,
    },
    ResyncDue(Tick),
    RetryDue(Tick),
    Operator(OperatorCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Session {
    profile: ViewProfile,
    shifts: ShiftTable,
    registry: ChannelRegistry,
    scheduler: ResyncScheduler,
    aggregator: Aggregator,
    dialer: Dialer,
    sink: Arc<dyn PresentationSink>,
    clock: Arc<dyn Clock>,
    selected_window: Option<TimeWindow>,
    listing: Option<UnitListing>,
    lookup_error: Option<String>,
}

impl Session {
    pub fn new(
        profile: ViewProfile,
        shifts: ShiftTable,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn PresentationSink>,
        clock: Arc<dyn Clock>,
        events: EventSender,
    ) -> Self {
        Self {
            profile,
            shifts,
            registry: ChannelRegistry::new(),
            scheduler: ResyncScheduler::new(events.clone()),
            aggregator: Aggregator::new(sink.clone()),
            dialer: Dialer::new(connector, events),
            sink,
            clock,
            selected_window: None,
            listing: None,
            lookup_error: None,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn selected_window(&self) -> Option<TimeWindow> {
        self.selected_window
    }

    /// Process events until the operator quits. The session keeps senders of its own
    /// (timers, connections), so the queue never closes underneath it.
    pub async fn run(mut self, mut events: EventReceiver) {
        info!(view = ?self.profile.kind, "session started");
        while let Some(event) = events.recv().await {
            if self.handle(event) == Flow::Stop {
                break;
            }
        }
        self.shutdown();
    }

    pub fn handle(&mut self, event: SessionEvent) -> Flow {
        match event {
            SessionEvent::Connection {
                unit,
                connection,
                event,
            } => self.on_connection(unit, connection, event),
            SessionEvent::ResyncDue(tick) => self.on_resync_due(tick),
            SessionEvent::RetryDue(tick) => self.on_retry_due(tick),
            SessionEvent::Operator(command) => match self.execute(command) {
                Ok(flow) => return flow,
                Err(e) => {
                    warn!(error = %e, "operator input rejected");
                    self.sink.render_error(None, &e.to_string());
                }
            },
        }
        Flow::Continue
    }

    /// Apply an operator command. Rejected input leaves the session untouched.
    pub fn execute(&mut self, command: OperatorCommand) -> Result<Flow, InputError> {
        match command {
            OperatorCommand::Select(unit) => self.select(unit)?,
            OperatorCommand::Deselect(unit) => self.deselect(&unit),
            OperatorCommand::Start(units) => self.start(units)?,
            OperatorCommand::SetWindow(window) => {
                info!(window = %window, "window selected");
                self.selected_window = Some(window);
            }
            OperatorCommand::Shift(name) => {
                let window = self.shifts.by_name(&name)?.window_at(self.clock.now())?;
                info!(shift = %name, window = %window, "shift window selected");
                self.selected_window = Some(window);
            }
            OperatorCommand::Refresh => self.refresh()?,
            OperatorCommand::UnitsLoaded(listing) => {
                self.sink.render_units(&listing);
                self.listing = Some(listing);
                self.lookup_error = None;
            }
            OperatorCommand::UnitsFailed(reason) => {
                warn!(reason = %reason, "unit lookup failed");
                self.sink.render_units_failed(&reason);
                self.lookup_error = Some(reason);
            }
            OperatorCommand::ShowUnits => match (&self.listing, &self.lookup_error) {
                (Some(listing), _) => self.sink.render_units(listing),
                (None, Some(reason)) => self.sink.render_units_failed(reason),
                (None, None) => self.sink.render_error(None, "unit list has not been loaded"),
            },
            OperatorCommand::Quit => {
                self.shutdown();
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    pub fn select(&mut self, unit: UnitId) -> Result<(), InputError> {
        self.check_known(&unit)?;
        let window = self.window_for_open()?;
        if self.registry.contains(&unit) {
            self.sink.remove(&unit);
        }
        self.open_unit(unit, window);
        self.publish_totals();
        Ok(())
    }

    pub fn deselect(&mut self, unit: &UnitId) {
        if self.registry.remove(unit).is_some() {
            info!(unit = %unit, "channel closed");
        }
        self.sink.remove(unit);
        self.publish_totals();
    }

    /// Replace the whole selection: every channel is closed and the listed units reopened.
    pub fn start(&mut self, units: Vec<UnitId>) -> Result<(), InputError> {
        let units: BTreeSet<UnitId> = units.into_iter().collect();
        if units.is_empty() {
            return Err(InputError::NoUnitSelected);
        }
        for unit in &units {
            self.check_known(unit)?;
        }
        let window = self.window_for_open()?;

        for unit in self.registry.clear() {
            self.sink.remove(&unit);
        }
        for unit in units {
            self.open_unit(unit, window);
        }
        self.publish_totals();
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<(), InputError> {
        let window = self.selected_window.ok_or(InputError::NoWindow)?;
        info!(window = %window, channels = self.registry.len(), "refreshing");

        let mut failed = Vec::new();
        for channel in self.registry.iter_mut() {
            if let Err(e) = channel.refresh(window, &mut self.dialer) {
                failed.push((channel.unit().clone(), e));
            }
        }
        for (unit, e) in failed {
            self.connection_lost(&unit, &e.to_string());
        }
        Ok(())
    }

    fn check_known(&self, unit: &UnitId) -> Result<(), InputError> {
        match &self.listing {
            Some(listing) if !listing.contains(unit) => Err(InputError::UnknownUnit(unit.clone())),
            _ => Ok(()),
        }
    }

    /// Window for a newly opened channel. The hourly view always follows the current shift;
    /// the dashboard uses the operator's window and only falls back to the current shift.
    fn window_for_open(&mut self) -> Result<TimeWindow, InputError> {
        let now = self.clock.now();
        if self.profile.follow_shift {
            return Ok(self.shifts.default_window(now)?);
        }
        if let Some(window) = self.selected_window {
            return Ok(window);
        }
        let window = self.shifts.default_window(now)?;
        info!(window = %window, "no window selected, using the current shift");
        self.selected_window = Some(window);
        Ok(window)
    }

    fn open_unit(&mut self, unit: UnitId, window: TimeWindow) {
        info!(unit = %unit, window = %window, "opening channel");
        let mut channel = Channel::new(unit, self.profile.kind);
        channel.open(window, &mut self.dialer);
        self.registry.insert(channel);
    }

    fn on_connection(&mut self, unit: UnitId, connection: ConnectionId, event: ConnectionEvent) {
        let Some(channel) = self.registry.get_mut(&unit) else {
            debug!(unit = %unit, connection, "event for unregistered unit dropped");
            return;
        };
        if channel.connection_id() != Some(connection) {
            debug!(unit = %unit, connection, "event from superseded connection dropped");
            return;
        }

        match event {
            ConnectionEvent::Opened => match channel.on_opened() {
                Ok(Some(generation)) => {
                    info!(unit = %unit, connection, generation, "channel open, initial request sent");
                }
                Ok(None) => {}
                Err(e) => self.connection_lost(&unit, &e.to_string()),
            },
            ConnectionEvent::Payload {
                generation,
                payload,
            } => self.on_payload(&unit, generation, payload),
            ConnectionEvent::Lost { reason } => self.connection_lost(&unit, &reason),
        }
    }

    fn on_payload(&mut self, unit: &UnitId, generation: u64, payload: Result<Snapshot, PayloadError>) {
        let Some(channel) = self.registry.get_mut(unit) else {
            return;
        };

        match channel.on_payload(generation, payload) {
            Delivery::Applied => {
                match channel.last_snapshot() {
                    Some(Snapshot::Rows(rows)) => self.sink.render(unit, rows),
                    Some(Snapshot::Hourly(summary)) => self.sink.render_hourly(summary),
                    None => {}
                }
                debug!(unit = %unit, generation, "snapshot applied");
            }
            Delivery::Rejected(e) => {
                warn!(unit = %unit, generation, error = %e, "discarding malformed response");
                self.sink.render_error(Some(unit), &e.to_string());
            }
            Delivery::Stale => {
                debug!(unit = %unit, generation, latest = channel.generation(), "stale response dropped");
                return;
            }
            Delivery::NotOpen => {
                debug!(unit = %unit, generation, "response on a channel that is not open dropped");
                return;
            }
        }

        // Every answered request, initial or not, arms exactly one follow-up.
        if let Some(connection) = channel.connection_id() {
            let timer = self
                .scheduler
                .arm_resync(unit, connection, self.profile.resync_interval);
            channel.arm_resync(timer);
        }
        self.publish_totals();
    }

    fn connection_lost(&mut self, unit: &UnitId, reason: &str) {
        let Some(channel) = self.registry.get_mut(unit) else {
            return;
        };
        let lost_connection = channel.connection_id();
        let previous = channel.on_lost();
        warn!(unit = %unit, ?previous, reason, "connection lost");

        match (self.profile.reconnect_delay, lost_connection) {
            (Some(delay), Some(connection)) => {
                let timer = self.scheduler.arm_retry(unit, connection, delay);
                channel.schedule_retry(timer);
                self.sink.render_error(
                    Some(unit),
                    &format!(
                        "connection lost ({reason}), reconnecting in {}s",
                        delay.as_secs()
                    ),
                );
            }
            _ => self.sink.render_error(
                Some(unit),
                &format!("connection lost ({reason}), select the unit again or refresh to reconnect"),
            ),
        }
        self.publish_totals();
    }

    fn on_resync_due(&mut self, tick: Tick) {
        let Some(channel) = self.scheduler.claim_resync(&mut self.registry, &tick) else {
            debug!(unit = %tick.unit, token = tick.token, "resync timer discarded");
            return;
        };
        let now = self.clock.now();

        if self.profile.follow_shift {
            if let Ok(current) = self.shifts.default_window(now) {
                if channel.anchor().map(|a| a.start()) != Some(current.start()) {
                    info!(unit = %tick.unit, window = %current, "new shift, re-anchoring");
                    if let Err(e) = channel.refresh(current, &mut self.dialer) {
                        self.connection_lost(&tick.unit, &e.to_string());
                    }
                    return;
                }
            }
        }

        match channel.resync(now) {
            Ok(Some(generation)) => debug!(unit = %tick.unit, generation, "resync request sent"),
            Ok(None) => {
                let timer = self
                    .scheduler
                    .arm_resync(&tick.unit, tick.connection, self.profile.resync_interval);
                channel.arm_resync(timer);
            }
            Err(e) => self.connection_lost(&tick.unit, &e.to_string()),
        }
    }

    fn on_retry_due(&mut self, tick: Tick) {
        let now = self.clock.now();
        let shift_window = if self.profile.follow_shift {
            self.shifts.default_window(now).ok()
        } else {
            None
        };

        let Some(channel) = self.scheduler.claim_retry(&mut self.registry, &tick) else {
            debug!(unit = %tick.unit, token = tick.token, "retry timer discarded");
            return;
        };

        match shift_window.or_else(|| channel.reopen_window()) {
            Some(window) => {
                info!(unit = %tick.unit, attempt = channel.retry_count(), window = %window, "reconnecting");
                channel.open(window, &mut self.dialer);
            }
            None => {
                if let Some(delay) = self.profile.reconnect_delay {
                    let timer = self.scheduler.arm_retry(&tick.unit, tick.connection, delay);
                    channel.schedule_retry(timer);
                }
            }
        }
    }

    fn publish_totals(&self) {
        if self.profile.kind == ViewKind::Dashboard {
            self.aggregator.publish(&self.registry);
        }
    }

    fn shutdown(&mut self) {
        let units = self.registry.clear();
        info!(channels = units.len(), "session closed");
    }
}
