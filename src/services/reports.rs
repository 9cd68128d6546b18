use chrono::NaiveDate;
use diesel::PgConnection;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::db::enums::ReportType;
use crate::db::models::{NewReport, Report};
use crate::db::store::UsageStore;
use crate::error::Result;
use crate::schema;
use crate::services::aggregation::{self, ReportSummary};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateReport {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub report_type: ReportType,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub efficiency_rate: f64,
    /// Caller supplied notes, stored alongside the computed summary.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Compute the snapshot for a report without storing it.
pub fn build_report<S: UsageStore + ?Sized>(
    store: &mut S,
    generated_by: Option<i64>,
    request: &GenerateReport,
) -> Result<NewReport> {
    let summary = aggregation::report_summary(store, request.start_date, request.end_date)?;
    let efficiency_rate = if request.efficiency_rate.is_finite() {
        request.efficiency_rate.clamp(0.0, 100.0)
    } else {
        0.0
    };

    Ok(NewReport {
        title: request.title.trim().to_string(),
        report_type: request.report_type,
        description: request.description.clone(),
        generated_by,
        start_date: request.start_date,
        end_date: request.end_date,
        total_usage: summary.totals.total,
        efficiency_rate,
        data: summary_payload(&summary, request.data.clone()),
    })
}

pub fn generate(conn: &mut PgConnection, generated_by: Option<i64>, request: &GenerateReport) -> Result<Report> {
    use schema::reports::dsl as R;

    let row = build_report(conn, generated_by, request)?;
    Ok(diesel::insert_into(R::reports)
        .values(&row)
        .returning(Report::as_returning())
        .get_result(conn)?)
}

fn summary_payload(summary: &ReportSummary, extra: Option<serde_json::Value>) -> serde_json::Value {
    let mut payload = json!({
        "zones": summary.zone_breakdown.len(),
        "measurements": summary.totals.count,
        "peak_usage": summary.totals.peak,
        "low_usage": summary.totals.low,
        "average_usage": summary.totals.average,
        "zone_breakdown": summary.zone_breakdown,
    });
    if let (Some(extra), Some(map)) = (extra, payload.as_object_mut()) {
        map.insert("notes".to_string(), extra);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::services::aggregation::tests::MemoryStore;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn request(start: NaiveDate, end: NaiveDate) -> GenerateReport {
        GenerateReport {
            title: " March usage ".to_string(),
            report_type: ReportType::Monthly,
            description: String::new(),
            start_date: start,
            end_date: end,
            efficiency_rate: 92.5,
            data: Some(json!({"reviewed": true})),
        }
    }

    #[test]
    fn snapshot_carries_computed_totals() {
        let mut store = MemoryStore::default();
        store
            .zone(1, "Building A")
            .zone(2, "Irrigation System")
            .usage(1, 30.0, Utc.with_ymd_and_hms(2026, 3, 3, 8, 0, 0).unwrap())
            .usage(2, 10.0, Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap());

        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let row = build_report(&mut store, Some(5), &request(start, end)).unwrap();

        assert_eq!(row.title, "March usage");
        assert_eq!(row.generated_by, Some(5));
        assert_relative_eq!(row.total_usage, 40.0);
        assert_relative_eq!(row.efficiency_rate, 92.5);
        assert_eq!(row.data["measurements"], 2);
        assert_eq!(row.data["zones"], 2);
        assert_eq!(row.data["zone_breakdown"][0]["zone"], "Building A");
        assert_eq!(row.data["zone_breakdown"][0]["percentage"], 75.0);
        assert_eq!(row.data["notes"]["reviewed"], true);
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let mut store = MemoryStore::default();
        let start = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let err = build_report(&mut store, None, &request(start, end)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[test]
    fn efficiency_outside_bounds_fails_validation() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut req = request(start, start);
        req.efficiency_rate = 140.0;
        assert!(req.validate().is_err());
    }
}
