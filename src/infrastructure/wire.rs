// JSON wire codec for the per-unit streaming endpoints
use crate::application::transport::{PayloadError, ViewKind, WindowRequest};
use crate::domain::metrics::{HourlySummary, Row, Snapshot};
use crate::domain::window::format_timestamp;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct RangeRequest {
    start_time: String,
    end_time: String,
    is_initial_request: bool,
}

pub fn encode_request(request: &WindowRequest) -> serde_json::Result<String> {
    serde_json::to_string(&RangeRequest {
        start_time: format_timestamp(request.window.start()),
        end_time: format_timestamp(request.window.end()),
        is_initial_request: request.initial,
    })
}

/// Decode a response frame according to the endpoint family it came from.
pub fn decode_snapshot(view: ViewKind, body: &[u8]) -> Result<Snapshot, PayloadError> {
    let malformed = |e: serde_json::Error| PayloadError::Malformed(e.to_string());
    match view {
        ViewKind::Dashboard => serde_json::from_slice::<Vec<Row>>(body)
            .map(Snapshot::Rows)
            .map_err(malformed),
        ViewKind::Hourly => serde_json::from_slice::<HourlySummary>(body)
            .map(Snapshot::Hourly)
            .map_err(malformed),
    }
}
