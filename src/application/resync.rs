// Resync scheduler - One-shot, anchor-preserving re-request timers
use crate::application::channel::{Channel, ConnectionState};
use crate::application::registry::ChannelRegistry;
use crate::application::session::{EventSender, SessionEvent};
use crate::application::transport::ConnectionId;
use crate::domain::unit::UnitId;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Timer firing, addressed by unit rather than by reference to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub unit: UnitId,
    pub connection: ConnectionId,
    pub token: u64,
}

/// Armed one-shot timer. Dropping the handle cancels it.
#[derive(Debug)]
pub struct TimerHandle {
    token: u64,
    task: AbortHandle,
}

impl TimerHandle {
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Resync,
    Retry,
}

pub struct ResyncScheduler {
    events: EventSender,
    last_token: u64,
}

impl ResyncScheduler {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            last_token: 0,
        }
    }

    pub fn arm_resync(&mut self, unit: &UnitId, connection: ConnectionId, after: Duration) -> TimerHandle {
        self.arm(TimerKind::Resync, unit, connection, after)
    }

    pub fn arm_retry(&mut self, unit: &UnitId, connection: ConnectionId, after: Duration) -> TimerHandle {
        self.arm(TimerKind::Retry, unit, connection, after)
    }

    fn arm(&mut self, kind: TimerKind, unit: &UnitId, connection: ConnectionId, after: Duration) -> TimerHandle {
        self.last_token += 1;
        let tick = Tick {
            unit: unit.clone(),
            connection,
            token: self.last_token,
        };
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let event = match kind {
                TimerKind::Resync => SessionEvent::ResyncDue(tick),
                TimerKind::Retry => SessionEvent::RetryDue(tick),
            };
            // The session may already be gone; nothing to do then.
            let _ = events.send(event);
        });

        TimerHandle {
            token: self.last_token,
            task: task.abort_handle(),
        }
    }

    /// Resolve a resync tick against the registry. Yields the channel only if it still exists,
    /// is open on the same connection, and this tick belongs to its current timer.
    pub fn claim_resync<'r>(&self, registry: &'r mut ChannelRegistry, tick: &Tick) -> Option<&'r mut Channel> {
        let channel = registry.get_mut(&tick.unit)?;
        if channel.state() != ConnectionState::Open || channel.connection_id() != Some(tick.connection) {
            return None;
        }
        if channel.take_resync_timer(tick.token) {
            Some(channel)
        } else {
            None
        }
    }

    /// Same as [`claim_resync`](Self::claim_resync) for the reconnect backoff timer.
    pub fn claim_retry<'r>(&self, registry: &'r mut ChannelRegistry, tick: &Tick) -> Option<&'r mut Channel> {
        let channel = registry.get_mut(&tick.unit)?;
        if channel.state() != ConnectionState::Reconnecting {
            return None;
        }
        if channel.take_retry_timer(tick.token) {
            Some(channel)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_after_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ResyncScheduler::new(tx);
        let start = tokio::time::Instant::now();

        let handle = scheduler.arm_resync(&"LINE-A".into(), 7, Duration::from_secs(30));
        let event = rx.recv().await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(30));
        match event {
            SessionEvent::ResyncDue(tick) => {
                assert_eq!(tick.unit, UnitId::new("LINE-A"));
                assert_eq!(tick.connection, 7);
                assert_eq!(tick.token, handle.token());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ResyncScheduler::new(tx);

        let handle = scheduler.arm_retry(&"LINE-A".into(), 1, Duration::from_secs(5));
        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_unique() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = ResyncScheduler::new(tx);
        let a = scheduler.arm_resync(&"A".into(), 1, Duration::from_secs(1));
        let b = scheduler.arm_resync(&"A".into(), 1, Duration::from_secs(1));
        assert_ne!(a.token(), b.token());
    }
}
