// Status board - Latest rendered state, shared with the status API
use crate::application::sink::PresentationSink;
use crate::domain::metrics::{HourlySummary, Row, Totals};
use crate::domain::unit::{UnitId, UnitListing};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitStatus {
    pub rows: Option<Vec<Row>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardState {
    pub units: BTreeMap<UnitId, UnitStatus>,
    pub totals: Totals,
    pub hourly: Option<HourlySummary>,
    pub listing: Option<UnitListing>,
    /// Set when the last unit lookup failed, cleared by a successful one.
    pub listing_error: Option<String>,
    /// Errors not tied to a unit, most recent last.
    pub errors: Vec<String>,
}

const MAX_GLOBAL_ERRORS: usize = 20;

#[derive(Clone, Default)]
pub struct StatusBoard {
    state: Arc<RwLock<BoardState>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BoardState {
        self.read().clone()
    }

    pub fn unit(&self, unit: &UnitId) -> Option<UnitStatus> {
        self.read().units.get(unit).cloned()
    }

    pub fn totals(&self) -> Totals {
        self.read().totals.clone()
    }

    pub fn hourly(&self) -> Option<HourlySummary> {
        self.read().hourly.clone()
    }

    pub fn listing(&self) -> Option<UnitListing> {
        self.read().listing.clone()
    }

    pub fn listing_error(&self) -> Option<String> {
        self.read().listing_error.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BoardState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BoardState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PresentationSink for StatusBoard {
    fn render(&self, unit: &UnitId, rows: &[Row]) {
        let mut state = self.write();
        let status = state.units.entry(unit.clone()).or_default();
        status.rows = Some(rows.to_vec());
        status.error = None;
    }

    fn render_totals(&self, totals: &Totals) {
        self.write().totals = totals.clone();
    }

    fn render_hourly(&self, summary: &HourlySummary) {
        self.write().hourly = Some(summary.clone());
    }

    fn render_error(&self, unit: Option<&UnitId>, message: &str) {
        let mut state = self.write();
        match unit {
            Some(unit) => {
                state.units.entry(unit.clone()).or_default().error = Some(message.to_string());
            }
            None => {
                state.errors.push(message.to_string());
                if state.errors.len() > MAX_GLOBAL_ERRORS {
                    state.errors.remove(0);
                }
            }
        }
    }

    fn render_units(&self, listing: &UnitListing) {
        let mut state = self.write();
        state.listing = Some(listing.clone());
        state.listing_error = None;
    }

    fn render_units_failed(&self, reason: &str) {
        self.write().listing_error = Some(reason.to_string());
    }

    fn remove(&self, unit: &UnitId) {
        self.write().units.remove(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_replace_and_clear_error() {
        let board = StatusBoard::new();
        let unit = UnitId::new("LINE-A");
        board.render_error(Some(&unit), "connection lost");
        assert_eq!(board.unit(&unit).unwrap().error.as_deref(), Some("connection lost"));

        board.render(&unit, &[Row::new("X-100", 10, 2)]);
        board.render(&unit, &[Row::new("X-100", 12, 2)]);
        let status = board.unit(&unit).unwrap();
        assert_eq!(status.error, None);
        assert_eq!(status.rows.unwrap(), vec![Row::new("X-100", 12, 2)]);
    }

    #[test]
    fn test_remove_drops_unit_section() {
        let board = StatusBoard::new();
        let unit = UnitId::new("LINE-A");
        board.render(&unit, &[Row::new("X-100", 10, 2)]);
        board.remove(&unit);
        assert!(board.unit(&unit).is_none());
        assert!(board.snapshot().units.is_empty());
    }

    #[test]
    fn test_global_errors_are_bounded() {
        let board = StatusBoard::new();
        for i in 0..(MAX_GLOBAL_ERRORS + 5) {
            board.render_error(None, &format!("error {i}"));
        }
        let errors = board.snapshot().errors;
        assert_eq!(errors.len(), MAX_GLOBAL_ERRORS);
        assert_eq!(errors.last().unwrap(), &format!("error {}", MAX_GLOBAL_ERRORS + 4));
    }

    #[test]
    fn test_failed_lookup_is_kept_until_a_listing_arrives() {
        let board = StatusBoard::new();
        board.render_units_failed("connection refused");
        assert_eq!(board.listing(), None);
        assert_eq!(board.listing_error().as_deref(), Some("connection refused"));

        board.render_units(&UnitListing::from_ids(vec!["LINE-A".into()]));
        assert_eq!(board.listing_error(), None);
        assert!(board.listing().is_some());
    }

    #[test]
    fn test_listing_serializes_no_units_state() {
        let board = StatusBoard::new();
        board.render_units(&UnitListing::NoUnits);
        let json = serde_json::to_value(board.listing().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"state": "no_units"}));
    }
}
