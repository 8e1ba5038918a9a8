// Presentation sink - Where channel snapshots and totals are pushed for display
use crate::domain::metrics::{HourlySummary, Row, Totals};
use crate::domain::unit::{UnitId, UnitListing};
use std::sync::Arc;

pub trait PresentationSink: Send + Sync {
    fn render(&self, unit: &UnitId, rows: &[Row]);

    fn render_totals(&self, totals: &Totals);

    fn render_hourly(&self, summary: &HourlySummary);

    /// `unit` is `None` for errors that are not scoped to a single unit.
    fn render_error(&self, unit: Option<&UnitId>, message: &str);

    fn render_units(&self, listing: &UnitListing);

    /// The unit lookup could not be answered.
    fn render_units_failed(&self, reason: &str);

    /// Forget everything shown for a unit that is no longer selected.
    fn remove(&self, unit: &UnitId);
}

/// Forwards every call to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn PresentationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn PresentationSink>>) -> Self {
        Self { sinks }
    }
}

impl PresentationSink for FanoutSink {
    fn render(&self, unit: &UnitId, rows: &[Row]) {
        self.sinks.iter().for_each(|s| s.render(unit, rows));
    }

    fn render_totals(&self, totals: &Totals) {
        self.sinks.iter().for_each(|s| s.render_totals(totals));
    }

    fn render_hourly(&self, summary: &HourlySummary) {
        self.sinks.iter().for_each(|s| s.render_hourly(summary));
    }

    fn render_error(&self, unit: Option<&UnitId>, message: &str) {
        self.sinks.iter().for_each(|s| s.render_error(unit, message));
    }

    fn render_units(&self, listing: &UnitListing) {
        self.sinks.iter().for_each(|s| s.render_units(listing));
    }

    fn render_units_failed(&self, reason: &str) {
        self.sinks.iter().for_each(|s| s.render_units_failed(reason));
    }

    fn remove(&self, unit: &UnitId) {
        self.sinks.iter().for_each(|s| s.remove(unit));
    }
}
