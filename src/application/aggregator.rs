// Aggregator - Cross-unit totals derived from the registry on demand
use crate::application::registry::ChannelRegistry;
use crate::application::sink::PresentationSink;
use crate::domain::metrics::Totals;
use std::sync::Arc;

/// Holds no totals of its own; every call recomputes from the registry.
#[derive(Clone)]
pub struct Aggregator {
    sink: Arc<dyn PresentationSink>,
}

impl Aggregator {
    pub fn new(sink: Arc<dyn PresentationSink>) -> Self {
        Self { sink }
    }

    pub fn totals(registry: &ChannelRegistry) -> Totals {
        Totals::from_rows(registry.healthy_rows())
    }

    /// Recompute and push to the sink.
    pub fn publish(&self, registry: &ChannelRegistry) -> Totals {
        let totals = Self::totals(registry);
        tracing::debug!(
            success = totals.success_qty,
            fail = totals.fail_qty,
            total = totals.total_qty,
            channels = registry.len(),
            "totals recomputed"
        );
        self.sink.render_totals(&totals);
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::channel::Channel;
    use crate::application::testing::{at, rows, FakeConnector, RecordingSink};
    use crate::application::transport::{Dialer, ViewKind};
    use crate::domain::metrics::Snapshot;
    use crate::domain::window::TimeWindow;
    use tokio::sync::mpsc;

    fn open_with(registry: &mut ChannelRegistry, dialer: &mut Dialer, unit: &str, snapshot: Option<Snapshot>) {
        let mut channel = Channel::new(unit.into(), ViewKind::Dashboard);
        channel.open(TimeWindow::new(at(8, 0, 0), at(9, 0, 0)).unwrap(), dialer);
        channel.on_opened().unwrap();
        if let Some(snapshot) = snapshot {
            channel.on_payload(1, Ok(snapshot));
        }
        registry.insert(channel);
    }

    #[test]
    fn test_removal_leaves_no_residue() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut dialer = Dialer::new(std::sync::Arc::new(FakeConnector::default()), tx);
        let mut with_b = ChannelRegistry::new();
        open_with(&mut with_b, &mut dialer, "A", Some(rows("M1", 3, 1)));
        open_with(&mut with_b, &mut dialer, "B", Some(rows("M2", 7, 0)));
        with_b.remove(&"B".into());

        let mut without_b = ChannelRegistry::new();
        open_with(&mut without_b, &mut dialer, "A", Some(rows("M1", 3, 1)));

        assert_eq!(Aggregator::totals(&with_b), Aggregator::totals(&without_b));
    }

    #[test]
    fn test_channels_without_snapshot_or_closed_are_skipped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut dialer = Dialer::new(std::sync::Arc::new(FakeConnector::default()), tx);
        let mut registry = ChannelRegistry::new();
        open_with(&mut registry, &mut dialer, "A", Some(rows("M1", 3, 1)));
        open_with(&mut registry, &mut dialer, "B", None);
        open_with(&mut registry, &mut dialer, "C", Some(rows("M3", 100, 0)));
        registry.get_mut(&"C".into()).unwrap().on_lost();

        let sink = std::sync::Arc::new(RecordingSink::default());
        let totals = Aggregator::new(sink.clone()).publish(&registry);
        assert_eq!(totals.success_qty, 3);
        assert_eq!(totals.total_qty, 4);
        assert_eq!(sink.last_totals(), Some(totals));
    }
}
