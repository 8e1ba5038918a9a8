// Console sink - Renders tables as log lines
use crate::application::sink::PresentationSink;
use crate::domain::metrics::{HourlySummary, Row, Totals};
use crate::domain::unit::{UnitId, UnitListing};
use crate::presentation::format::{format_hourly, format_row, format_totals};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl PresentationSink for ConsoleSink {
    fn render(&self, unit: &UnitId, rows: &[Row]) {
        info!(unit = %unit, rows = rows.len(), "== {unit} ==");
        if rows.is_empty() {
            info!(unit = %unit, "no production in window");
        }
        for row in rows {
            info!(unit = %unit, "{}", format_row(row));
        }
    }

    fn render_totals(&self, totals: &Totals) {
        info!("totals: {}", format_totals(totals));
    }

    fn render_hourly(&self, summary: &HourlySummary) {
        for line in format_hourly(summary) {
            info!(unit = %summary.unit_name, "{line}");
        }
    }

    fn render_error(&self, unit: Option<&UnitId>, message: &str) {
        match unit {
            Some(unit) => warn!(unit = %unit, "{message}"),
            None => warn!("{message}"),
        }
    }

    fn render_units(&self, listing: &UnitListing) {
        match listing {
            UnitListing::NoUnits => info!("no production units available"),
            UnitListing::Units(ids) => {
                let names: Vec<&str> = ids.iter().map(UnitId::as_str).collect();
                info!(count = ids.len(), "units: {}", names.join(", "));
            }
        }
    }

    fn render_units_failed(&self, reason: &str) {
        warn!("error loading units: {reason}");
    }

    fn remove(&self, unit: &UnitId) {
        info!(unit = %unit, "unit removed from view");
    }
}
