// Test doubles shared by the application tests
use crate::application::session::EventSender;
use crate::application::sink::PresentationSink;
use crate::application::transport::{
    ConnectTarget, ConnectionHandle, ConnectionId, Connector, OutboundRequest,
};
use crate::domain::metrics::{HourlySummary, Row, Snapshot, Totals};
use crate::domain::unit::{UnitId, UnitListing};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// 2026-10-19 at the given time of day.
pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn rows(model: &str, success: u64, fail: u64) -> Snapshot {
    Snapshot::Rows(vec![Row::new(model, success, fail)])
}

struct FakeLink {
    target: ConnectTarget,
    outbound: mpsc::UnboundedReceiver<OutboundRequest>,
}

/// Connector that never touches the network; it records every request a channel sends.
#[derive(Default)]
pub struct FakeConnector {
    links: Mutex<Vec<FakeLink>>,
}

impl Connector for FakeConnector {
    fn connect(&self, target: ConnectTarget, _events: EventSender) -> ConnectionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = target.connection;
        self.links.lock().unwrap().push(FakeLink {
            target,
            outbound: rx,
        });
        ConnectionHandle::new(id, tx, None)
    }
}

impl FakeConnector {
    pub fn connect_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn last_connection(&self, unit: &UnitId) -> Option<ConnectionId> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|l| &l.target.unit == unit)
            .map(|l| l.target.connection)
    }

    /// Drain everything sent for `unit`, across all of its connections, in send order.
    pub fn take_requests(&self, unit: &UnitId) -> Vec<OutboundRequest> {
        let mut links = self.links.lock().unwrap();
        let mut requests = Vec::new();
        for link in links.iter_mut().filter(|l| &l.target.unit == unit) {
            while let Ok(request) = link.outbound.try_recv() {
                requests.push(request);
            }
        }
        requests
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Rows(UnitId, Vec<Row>),
    Totals(Totals),
    Hourly(HourlySummary),
    Error(Option<UnitId>, String),
    Units(UnitListing),
    UnitsFailed(String),
    Removed(UnitId),
}

#[derive(Default)]
pub struct RecordingSink {
    rendered: Mutex<Vec<Rendered>>,
}

impl RecordingSink {
    pub fn rendered(&self) -> Vec<Rendered> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn last_totals(&self) -> Option<Totals> {
        self.rendered().into_iter().rev().find_map(|r| match r {
            Rendered::Totals(t) => Some(t),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<(Option<UnitId>, String)> {
        self.rendered()
            .into_iter()
            .filter_map(|r| match r {
                Rendered::Error(unit, message) => Some((unit, message)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, rendered: Rendered) {
        self.rendered.lock().unwrap().push(rendered);
    }
}

impl PresentationSink for RecordingSink {
    fn render(&self, unit: &UnitId, rows: &[Row]) {
        self.push(Rendered::Rows(unit.clone(), rows.to_vec()));
    }

    fn render_totals(&self, totals: &Totals) {
        self.push(Rendered::Totals(totals.clone()));
    }

    fn render_hourly(&self, summary: &HourlySummary) {
        self.push(Rendered::Hourly(summary.clone()));
    }

    fn render_error(&self, unit: Option<&UnitId>, message: &str) {
        self.push(Rendered::Error(unit.cloned(), message.to_string()));
    }

    fn render_units(&self, listing: &UnitListing) {
        self.push(Rendered::Units(listing.clone()));
    }

    fn render_units_failed(&self, reason: &str) {
        self.push(Rendered::UnitsFailed(reason.to_string()));
    }

    fn remove(&self, unit: &UnitId) {
        self.push(Rendered::Removed(unit.clone()));
    }
}
