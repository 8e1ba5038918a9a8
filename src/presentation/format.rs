// Display formatting for metric tables
use crate::domain::metrics::{HourlyRow, HourlySummary, Row, Totals};
use chrono::NaiveDateTime;

pub const NOT_AVAILABLE: &str = "N/A";

/// Ratio in `[0, 1]` as a percentage with two decimals.
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_target(target: Option<f64>) -> String {
    match target {
        Some(t) if t != 0.0 => format!("{t}"),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_quantity(qty: Option<u64>) -> String {
    qty.map_or_else(|| NOT_AVAILABLE.to_string(), |q| q.to_string())
}

pub fn format_hour_range(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

pub fn format_row(row: &Row) -> String {
    format!(
        "{:<16} ok={:<6} repair={:<6} total={:<6} target={:<6} quality={:<8} performance={:<8} oee={}",
        row.model,
        format_quantity(row.success_qty),
        format_quantity(row.fail_qty),
        format_quantity(row.total_qty),
        format_target(row.target),
        format_percentage(row.quality),
        format_percentage(row.performance),
        format_percentage(row.oee),
    )
}

pub fn format_hourly_row(row: &HourlyRow) -> String {
    format!(
        "{} ok={:<6} repair={:<6} quality={:<8} performance={:<8} oee={}",
        format_hour_range(row.hour_start, row.hour_end),
        format_quantity(row.success_qty),
        format_quantity(row.fail_qty),
        format_percentage(row.quality),
        format_percentage(row.performance),
        format_percentage(row.oee),
    )
}

/// Header line plus one line per hour, latest hour first.
pub fn format_hourly(summary: &HourlySummary) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: total ok={} oee={}",
        summary.unit_name,
        format_quantity(summary.total_success),
        format_percentage(summary.total_oee),
    )];
    lines.extend(summary.newest_first().into_iter().map(format_hourly_row));
    lines
}

pub fn format_totals(totals: &Totals) -> String {
    format!(
        "ok={} repair={} total={} avg performance={}",
        totals.success_qty,
        totals.fail_qty,
        totals.total_qty,
        format_percentage(totals.average_performance),
    )
}
