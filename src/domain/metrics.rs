// Production metric domain models
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One metric record for one product model within a unit.
///
/// Ratios are computed by the backend and arrive in `[0, 1]` or absent.
/// `total_qty == success_qty + fail_qty` is the backend's promise, not checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub model: String,
    #[serde(default)]
    pub success_qty: Option<u64>,
    #[serde(default)]
    pub fail_qty: Option<u64>,
    #[serde(default)]
    pub total_qty: Option<u64>,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub performance: Option<f64>,
    #[serde(default)]
    pub oee: Option<f64>,
}

#[cfg(test)]
impl Row {
    pub fn new(model: impl Into<String>, success_qty: u64, fail_qty: u64) -> Self {
        Self {
            model: model.into(),
            success_qty: Some(success_qty),
            fail_qty: Some(fail_qty),
            total_qty: Some(success_qty + fail_qty),
            target: None,
            quality: None,
            performance: None,
            oee: None,
        }
    }

    pub fn with_performance(mut self, performance: Option<f64>) -> Self {
        self.performance = performance;
        self
    }
}

/// One hour of the single-unit breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRow {
    pub hour_start: NaiveDateTime,
    pub hour_end: NaiveDateTime,
    #[serde(default)]
    pub success_qty: Option<u64>,
    #[serde(default)]
    pub fail_qty: Option<u64>,
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub performance: Option<f64>,
    #[serde(default)]
    pub oee: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySummary {
    pub unit_name: String,
    #[serde(default)]
    pub total_success: Option<u64>,
    #[serde(default)]
    pub total_oee: Option<f64>,
    #[serde(default)]
    pub hourly_data: Vec<HourlyRow>,
}

impl HourlySummary {
    /// Hours ordered latest first, the way the breakdown table lists them.
    pub fn newest_first(&self) -> Vec<&HourlyRow> {
        let mut rows: Vec<&HourlyRow> = self.hourly_data.iter().collect();
        rows.sort_by(|a, b| b.hour_start.cmp(&a.hour_start));
        rows
    }
}

/// Latest payload received on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Rows(Vec<Row>),
    Hourly(HourlySummary),
}

impl Snapshot {
    pub fn rows(&self) -> &[Row] {
        match self {
            Snapshot::Rows(rows) => rows,
            Snapshot::Hourly(_) => &[],
        }
    }
}

/// Cross-unit aggregate, always derived from the current channel snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub success_qty: u64,
    pub fail_qty: u64,
    pub total_qty: u64,
    /// Mean over rows that report a performance value; `None` when no row does.
    pub average_performance: Option<f64>,
}

impl Totals {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut totals = Totals::default();
        let mut performance_sum = 0.0;
        let mut performance_count = 0u32;

        for row in rows {
            totals.success_qty = totals.success_qty.saturating_add(row.success_qty.unwrap_or(0));
            totals.fail_qty = totals.fail_qty.saturating_add(row.fail_qty.unwrap_or(0));
            totals.total_qty = totals.total_qty.saturating_add(row.total_qty.unwrap_or(0));
            if let Some(performance) = row.performance {
                performance_sum += performance;
                performance_count += 1;
            }
        }

        if performance_count > 0 {
            totals.average_performance = Some(performance_sum / f64::from(performance_count));
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_performance_excluded_from_average() {
        let a = [Row::new("M1", 10, 2).with_performance(Some(0.8))];
        let b = [Row::new("M2", 5, 1).with_performance(None)];
        let totals = Totals::from_rows(a.iter().chain(b.iter()));

        assert_eq!(totals.success_qty, 15);
        assert_eq!(totals.fail_qty, 3);
        assert_eq!(totals.total_qty, 18);
        assert_eq!(totals.average_performance, Some(0.8));
    }

    #[test]
    fn test_null_quantities_count_as_zero() {
        let row: Row = serde_json::from_str(
            r#"{"model":"M1","success_qty":null,"fail_qty":4,"target":null,"performance":null}"#,
        )
        .unwrap();
        let totals = Totals::from_rows([&row]);
        assert_eq!(totals.success_qty, 0);
        assert_eq!(totals.fail_qty, 4);
        assert_eq!(totals.total_qty, 0);
        assert_eq!(totals.average_performance, None);
    }

    #[test]
    fn test_order_independent() {
        let rows = [
            Row::new("A", 3, 1).with_performance(Some(0.5)),
            Row::new("B", 7, 0).with_performance(Some(1.0)),
            Row::new("C", 1, 1),
        ];
        let forward = Totals::from_rows(rows.iter());
        let backward = Totals::from_rows(rows.iter().rev());
        assert_eq!(forward, backward);
        assert_eq!(forward.average_performance, Some(0.75));
    }

    #[test]
    fn test_huge_quantities_saturate() {
        let mut huge = Row::new("M1", 0, 0);
        huge.success_qty = Some(u64::MAX);
        huge.total_qty = Some(u64::MAX);
        let small = Row::new("M2", 1, 1);

        let totals = Totals::from_rows([&huge, &small]);
        assert_eq!(totals.success_qty, u64::MAX);
        assert_eq!(totals.fail_qty, 1);
        assert_eq!(totals.total_qty, u64::MAX);
    }

    #[test]
    fn test_hourly_newest_first() {
        let summary: HourlySummary = serde_json::from_str(
            r#"{"unit_name":"LINE-A","total_success":12,"total_oee":0.5,"hourly_data":[
                {"hour_start":"2026-10-19T08:00:00","hour_end":"2026-10-19T09:00:00","success_qty":5,"fail_qty":0,"quality":1.0,"performance":0.4,"oee":0.4},
                {"hour_start":"2026-10-19T09:00:00","hour_end":"2026-10-19T10:00:00","success_qty":7,"fail_qty":1,"quality":0.875,"performance":null,"oee":null}
            ]}"#,
        )
        .unwrap();
        let ordered = summary.newest_first();
        assert_eq!(ordered[0].success_qty, Some(7));
        assert_eq!(ordered[1].success_qty, Some(5));
    }
}
