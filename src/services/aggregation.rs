//! Derived usage statistics for the dashboard, zone pages and reports.
//!
//! Nothing computed here is stored. Every call rescans the relevant window
//! through a [`UsageStore`], and empty windows degrade to zero (or, for water
//! quality, 100) instead of failing so the dashboard can always render.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::db::models::{Alert, UsageRecord, Zone};
use crate::db::store::UsageStore;
use crate::error::{Error, Result};

pub const DEFAULT_TOP_ZONES: usize = 4;
pub const DEFAULT_TOP_ZONE_DAYS: i64 = 7;
pub const DEFAULT_TREND_DAYS: i64 = 7;
pub const MAX_TREND_DAYS: i64 = 366;
const HEALTH_PENALTY_PER_ALERT: i64 = 5;
const DEFAULT_QUALITY_PCT: f64 = 100.0;

/// Sum/peak/low/mean/count over a window. All zero when `count == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WindowedTotals {
    pub total: f64,
    pub peak: f64,
    pub low: f64,
    pub average: f64,
    pub count: i64,
}

impl WindowedTotals {
    pub fn from_records(records: &[UsageRecord]) -> Self {
        let mut totals = WindowedTotals::default();
        let mut peak = f64::MIN;
        let mut low = f64::MAX;

        for volume in records.iter().filter_map(usable_volume) {
            totals.total += volume;
            totals.count += 1;
            peak = peak.max(volume);
            low = low.min(volume);
        }

        if totals.count > 0 {
            totals.peak = peak;
            totals.low = low;
            totals.average = totals.total / totals.count as f64;
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneUsageStats {
    pub zone_id: i64,
    pub zone_name: String,
    #[serde(flatten)]
    pub totals: WindowedTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub usage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneShare {
    pub zone_id: i64,
    #[serde(rename = "zone")]
    pub zone_name: String,
    pub usage: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneUsage {
    pub zone_id: i64,
    #[serde(rename = "zone")]
    pub zone_name: String,
    pub usage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub total_usage: f64,
    pub daily_average: f64,
    pub water_quality: i64,
    pub system_health: i64,
    pub active_alerts: i64,
    pub total_zones: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(flatten)]
    pub totals: WindowedTotals,
    pub zone_breakdown: Vec<ZoneShare>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub report_type: &'static str,
    pub period: String,
    pub total_usage: f64,
    pub zone_breakdown: Vec<ZoneShare>,
}

/// Totals over `[since, until)`, for one zone or across all active zones.
pub fn windowed_totals<S: UsageStore + ?Sized>(
    store: &mut S,
    zone_id: Option<i64>,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<WindowedTotals> {
    if since > until {
        return Err(Error::InvalidRange(format!("window start {since} is after end {until}")));
    }
    if let Some(zone_id) = zone_id {
        require_active_zone(store, zone_id)?;
    }
    let records = store.usage_between(zone_id, since, Some(until))?;
    Ok(WindowedTotals::from_records(&records))
}

/// Trailing 24h totals for one active zone.
pub fn zone_usage_stats<S: UsageStore + ?Sized>(
    store: &mut S,
    zone_id: i64,
    now: DateTime<Utc>,
) -> Result<ZoneUsageStats> {
    let zone = require_active_zone(store, zone_id)?;
    let records = store.usage_between(Some(zone.id), now - Duration::hours(24), Some(now))?;
    Ok(ZoneUsageStats {
        zone_id: zone.id,
        zone_name: zone.name,
        totals: WindowedTotals::from_records(&records),
    })
}

/// One entry per UTC calendar day for the last `days` days ending today, oldest first.
pub fn daily_trend<S: UsageStore + ?Sized>(
    store: &mut S,
    zone_id: Option<i64>,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<DailyUsage>> {
    check_day_count(days)?;
    if let Some(zone_id) = zone_id {
        require_active_zone(store, zone_id)?;
    }
    if days == 0 {
        return Ok(Vec::new());
    }

    let today = now.date_naive();
    let first_day = today - Duration::days(days - 1);
    let since = start_of_day(first_day);
    let until = start_of_day(today + Duration::days(1));
    let records = store.usage_between(zone_id, since, Some(until))?;

    let mut buckets: BTreeMap<NaiveDate, f64> = first_day.iter_days().take(days as usize).map(|d| (d, 0.0)).collect();
    for record in &records {
        let Some(volume) = usable_volume(record) else { continue };
        if let Some(slot) = buckets.get_mut(&record.measured_at.date_naive()) {
            *slot += volume;
        }
    }

    Ok(buckets.into_iter().map(|(date, usage)| DailyUsage { date, usage }).collect())
}

/// Every active zone's share of usage since `since`.
pub fn zone_breakdown<S: UsageStore + ?Sized>(store: &mut S, since: DateTime<Utc>) -> Result<Vec<ZoneShare>> {
    breakdown_between(store, since, None)
}

/// The `limit` active zones with the highest usage over the trailing `days` days.
pub fn top_zones<S: UsageStore + ?Sized>(
    store: &mut S,
    days: i64,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<ZoneUsage>> {
    check_day_count(days)?;
    let zones = store.active_zones()?;
    let records = store.usage_between(None, now - Duration::days(days), None)?;
    let per_zone = sum_by_zone(&records);

    let mut ranked: Vec<ZoneUsage> = zones
        .into_iter()
        .map(|zone| ZoneUsage {
            usage: per_zone.get(&zone.id).copied().unwrap_or(0.0),
            zone_id: zone.id,
            zone_name: zone.name,
        })
        .collect();
    // stable: equal usage keeps listing order
    ranked.sort_by(|a, b| b.usage.total_cmp(&a.usage));
    ranked.truncate(limit);
    Ok(ranked)
}

pub fn dashboard_snapshot<S: UsageStore + ?Sized>(store: &mut S, now: DateTime<Utc>) -> Result<DashboardSnapshot> {
    let recent = store.usage_between(None, now - Duration::hours(24), Some(now))?;
    let totals = WindowedTotals::from_records(&recent);
    let daily_average = store.average_usage()?.filter(|v| v.is_finite()).unwrap_or(0.0);
    let active_alerts = store.count_active_alerts()?;
    let total_zones = store.active_zones()?.len() as i64;

    Ok(DashboardSnapshot {
        total_usage: totals.total,
        daily_average,
        water_quality: average_quality(&recent) as i64,
        system_health: system_health(active_alerts),
        active_alerts,
        total_zones,
    })
}

/// 100 minus 5 per active alert, never below zero.
pub fn system_health(active_alerts: i64) -> i64 {
    (100 - HEALTH_PENALTY_PER_ALERT.saturating_mul(active_alerts.max(0))).clamp(0, 100)
}

/// Re-resolving an already resolved alert overwrites the resolution stamp.
pub fn resolve_alert<S: UsageStore + ?Sized>(
    store: &mut S,
    alert_id: i64,
    actor_id: i64,
    now: DateTime<Utc>,
) -> Result<Alert> {
    store
        .resolve_alert(alert_id, actor_id, now)?
        .ok_or_else(|| Error::NotFound(format!("alert {alert_id}")))
}

/// Totals and per-zone breakdown for the inclusive date range `start..=end`.
pub fn report_summary<S: UsageStore + ?Sized>(
    store: &mut S,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ReportSummary> {
    if start > end {
        return Err(Error::InvalidRange(format!("start date {start} is after end date {end}")));
    }
    let since = start_of_day(start);
    let until = end
        .succ_opt()
        .map(start_of_day)
        .ok_or_else(|| Error::InvalidRange(format!("end date {end} is out of range")))?;
    let records = store.usage_between(None, since, Some(until))?;
    let zone_breakdown = breakdown_between(store, since, Some(until))?;

    Ok(ReportSummary {
        start_date: start,
        end_date: end,
        totals: WindowedTotals::from_records(&records),
        zone_breakdown,
    })
}

/// Month-to-date usage summary, from the first of the current month through today.
pub fn monthly_report<S: UsageStore + ?Sized>(store: &mut S, now: DateTime<Utc>) -> Result<MonthlyReport> {
    let today = now.date_naive();
    let first = today.with_day(1).unwrap_or(today);
    let summary = report_summary(store, first, today)?;

    Ok(MonthlyReport {
        report_type: "monthly",
        period: format!("{first} to {today}"),
        total_usage: summary.totals.total,
        zone_breakdown: summary.zone_breakdown,
    })
}

fn breakdown_between<S: UsageStore + ?Sized>(
    store: &mut S,
    since: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
) -> Result<Vec<ZoneShare>> {
    let zones = store.active_zones()?;
    let records = store.usage_between(None, since, until)?;
    let per_zone = sum_by_zone(&records);
    Ok(shares(
        zones
            .into_iter()
            .map(|zone| {
                let usage = per_zone.get(&zone.id).copied().unwrap_or(0.0);
                (zone, usage)
            })
            .collect(),
    ))
}

/// Percentages of the combined total; all zero when the total is zero.
fn shares(zone_usage: Vec<(Zone, f64)>) -> Vec<ZoneShare> {
    let total: f64 = zone_usage.iter().map(|(_, usage)| usage).sum();
    zone_usage
        .into_iter()
        .map(|(zone, usage)| ZoneShare {
            zone_id: zone.id,
            zone_name: zone.name,
            usage,
            percentage: if total > 0.0 { usage / total * 100.0 } else { 0.0 },
        })
        .collect()
}

fn sum_by_zone(records: &[UsageRecord]) -> HashMap<i64, f64> {
    let mut per_zone = HashMap::new();
    for record in records {
        if let Some(volume) = usable_volume(record) {
            *per_zone.entry(record.zone_id).or_insert(0.0) += volume;
        }
    }
    per_zone
}

fn average_quality(records: &[UsageRecord]) -> f64 {
    if records.is_empty() {
        return DEFAULT_QUALITY_PCT;
    }
    let sum: f64 = records.iter().map(|r| f64::from(r.quality_pct.clamp(0, 100))).sum();
    sum / records.len() as f64
}

fn usable_volume(record: &UsageRecord) -> Option<f64> {
    if record.usage_liters.is_finite() && record.usage_liters >= 0.0 {
        Some(record.usage_liters)
    } else {
        warn!(
            "Skipping usage record {} with unusable volume {}",
            record.id, record.usage_liters
        );
        None
    }
}

fn require_active_zone<S: UsageStore + ?Sized>(store: &mut S, zone_id: i64) -> Result<Zone> {
    match store.find_zone(zone_id)? {
        Some(zone) if zone.is_active => Ok(zone),
        _ => Err(Error::NotFound(format!("zone {zone_id}"))),
    }
}

fn check_day_count(days: i64) -> Result<()> {
    if days < 0 {
        return Err(Error::InvalidRange(format!("days must not be negative, got {days}")));
    }
    if days > MAX_TREND_DAYS {
        return Err(Error::Validation(format!("days must be at most {MAX_TREND_DAYS}, got {days}")));
    }
    Ok(())
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::enums::{AlertStatus, AlertType, ZoneType};
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    /// Vector-backed store mirroring the PostgreSQL filtering rules.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub zones: Vec<Zone>,
        pub usage: Vec<UsageRecord>,
        pub alerts: Vec<Alert>,
    }

    impl MemoryStore {
        pub fn zone(&mut self, id: i64, name: &str) -> &mut Self {
            self.zones.push(Zone {
                id,
                name: name.to_string(),
                description: String::new(),
                zone_type: ZoneType::Building,
                is_active: true,
                created_at: base_time(),
                updated_at: base_time(),
            });
            self
        }

        pub fn usage(&mut self, zone_id: i64, liters: f64, at: DateTime<Utc>) -> &mut Self {
            self.usage_with_quality(zone_id, liters, at, 100)
        }

        pub fn usage_with_quality(&mut self, zone_id: i64, liters: f64, at: DateTime<Utc>, quality: i32) -> &mut Self {
            let id = self.usage.len() as i64 + 1;
            self.usage.push(UsageRecord {
                id,
                zone_id,
                usage_liters: liters,
                measured_at: at,
                is_peak: false,
                quality_pct: quality,
                created_at: at,
            });
            self
        }

        pub fn alert(&mut self, id: i64, status: AlertStatus) -> &mut Self {
            self.alerts.push(Alert {
                id,
                zone_id: None,
                title: format!("alert {id}"),
                message: String::new(),
                alert_type: AlertType::Warning,
                status,
                severity: 3,
                created_at: base_time(),
                resolved_at: None,
                resolved_by: None,
            });
            self
        }

        fn is_active_zone(&self, zone_id: i64) -> bool {
            self.zones.iter().any(|z| z.id == zone_id && z.is_active)
        }
    }

    impl UsageStore for MemoryStore {
        fn find_zone(&mut self, zone_id: i64) -> Result<Option<Zone>> {
            Ok(self.zones.iter().find(|z| z.id == zone_id).cloned())
        }

        fn active_zones(&mut self) -> Result<Vec<Zone>> {
            let mut zones: Vec<Zone> = self.zones.iter().filter(|z| z.is_active).cloned().collect();
            zones.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            Ok(zones)
        }

        fn usage_between(
            &mut self,
            zone_id: Option<i64>,
            since: DateTime<Utc>,
            until: Option<DateTime<Utc>>,
        ) -> Result<Vec<UsageRecord>> {
            let mut rows: Vec<UsageRecord> = self
                .usage
                .iter()
                .filter(|r| r.measured_at >= since && until.is_none_or(|u| r.measured_at < u))
                .filter(|r| match zone_id {
                    Some(id) => r.zone_id == id,
                    None => self.is_active_zone(r.zone_id),
                })
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.measured_at.cmp(&a.measured_at));
            Ok(rows)
        }

        fn average_usage(&mut self) -> Result<Option<f64>> {
            let volumes: Vec<f64> = self
                .usage
                .iter()
                .filter(|r| self.is_active_zone(r.zone_id))
                .map(|r| r.usage_liters)
                .collect();
            if volumes.is_empty() {
                Ok(None)
            } else {
                Ok(Some(volumes.iter().sum::<f64>() / volumes.len() as f64))
            }
        }

        fn count_active_alerts(&mut self) -> Result<i64> {
            Ok(self.alerts.iter().filter(|a| a.status == AlertStatus::Active).count() as i64)
        }

        fn resolve_alert(&mut self, alert_id: i64, actor_id: i64, now: DateTime<Utc>) -> Result<Option<Alert>> {
            let Some(alert) = self.alerts.iter_mut().find(|a| a.id == alert_id) else {
                return Ok(None);
            };
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(now);
            alert.resolved_by = Some(actor_id);
            Ok(Some(alert.clone()))
        }
    }

    pub(crate) fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_window_is_all_zero() {
        let mut store = MemoryStore::default();
        store.zone(1, "Building A");
        let now = base_time();

        let totals = windowed_totals(&mut store, None, now - Duration::hours(24), now).unwrap();
        assert_eq!(totals, WindowedTotals::default());

        let totals = windowed_totals(&mut store, Some(1), now - Duration::hours(24), now).unwrap();
        assert_eq!(totals.count, 0);
        assert_eq!(totals.peak, 0.0);
        assert_eq!(totals.low, 0.0);
    }

    #[test]
    fn totals_of_three_records() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "Building A")
            .usage(1, 10.0, now - Duration::hours(1))
            .usage(1, 20.0, now - Duration::hours(2))
            .usage(1, 30.0, now - Duration::hours(3))
            // outside the window on both sides
            .usage(1, 500.0, now - Duration::hours(25))
            .usage(1, 700.0, now);

        let totals = windowed_totals(&mut store, Some(1), now - Duration::hours(24), now).unwrap();
        assert_relative_eq!(totals.total, 60.0);
        assert_relative_eq!(totals.peak, 30.0);
        assert_relative_eq!(totals.low, 10.0);
        assert_relative_eq!(totals.average, 20.0);
        assert_eq!(totals.count, 3);
    }

    #[test]
    fn inverted_window_is_invalid_range() {
        let now = base_time();
        let mut store = MemoryStore::default();
        let err = windowed_totals(&mut store, None, now, now - Duration::hours(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[test]
    fn unknown_or_inactive_zone_is_not_found() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store.zone(1, "Building A").zone(2, "Old Wing");
        store.zones[1].is_active = false;

        let err = windowed_totals(&mut store, Some(42), now - Duration::hours(1), now).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = zone_usage_stats(&mut store, 2, now).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn inactive_zones_are_left_out_of_global_totals() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "Building A")
            .zone(2, "Old Wing")
            .usage(1, 10.0, now - Duration::hours(1))
            .usage(2, 90.0, now - Duration::hours(1));
        store.zones[1].is_active = false;

        let totals = windowed_totals(&mut store, None, now - Duration::hours(24), now).unwrap();
        assert_relative_eq!(totals.total, 10.0);
        assert_eq!(totals.count, 1);
    }

    #[test]
    fn unusable_volumes_are_skipped() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "Building A")
            .usage(1, 5.0, now - Duration::hours(1))
            .usage(1, f64::NAN, now - Duration::hours(2))
            .usage(1, -3.0, now - Duration::hours(3));

        let totals = windowed_totals(&mut store, None, now - Duration::hours(24), now).unwrap();
        assert_relative_eq!(totals.total, 5.0);
        assert_eq!(totals.count, 1);
    }

    #[test]
    fn trend_has_one_entry_per_day_even_without_data() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store.zone(1, "Building A");

        let trend = daily_trend(&mut store, None, 7, now).unwrap();
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert_eq!(trend[6].date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert!(trend.windows(2).all(|w| w[0].date < w[1].date));
        assert!(trend.iter().all(|d| d.usage == 0.0));
    }

    #[test]
    fn trend_buckets_by_stored_calendar_date() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "Building A")
            .zone(2, "Building B")
            // earlier today and late yesterday land on different days
            .usage(1, 4.0, Utc.with_ymd_and_hms(2026, 3, 15, 0, 30, 0).unwrap())
            .usage(1, 6.0, Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).unwrap())
            .usage(2, 1.0, Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap())
            // before the first day
            .usage(1, 99.0, Utc.with_ymd_and_hms(2026, 3, 12, 23, 59, 0).unwrap());

        let trend = daily_trend(&mut store, None, 3, now).unwrap();
        let usage: Vec<f64> = trend.iter().map(|d| d.usage).collect();
        assert_eq!(usage, vec![0.0, 7.0, 4.0]);

        let zone_trend = daily_trend(&mut store, Some(2), 3, now).unwrap();
        let usage: Vec<f64> = zone_trend.iter().map(|d| d.usage).collect();
        assert_eq!(usage, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn trend_rejects_bad_day_counts() {
        let now = base_time();
        let mut store = MemoryStore::default();
        assert!(matches!(daily_trend(&mut store, None, -1, now), Err(Error::InvalidRange(_))));
        assert!(matches!(
            daily_trend(&mut store, None, MAX_TREND_DAYS + 1, now),
            Err(Error::Validation(_))
        ));
        assert!(daily_trend(&mut store, None, 0, now).unwrap().is_empty());
    }

    #[test]
    fn top_zones_rejects_bad_day_counts() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store.zone(1, "A");
        assert!(matches!(top_zones(&mut store, -1, DEFAULT_TOP_ZONES, now), Err(Error::InvalidRange(_))));
        assert!(matches!(
            top_zones(&mut store, MAX_TREND_DAYS + 1, DEFAULT_TOP_ZONES, now),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            top_zones(&mut store, 1_000_000_000, DEFAULT_TOP_ZONES, now),
            Err(Error::Validation(_))
        ));
        assert!(matches!(top_zones(&mut store, i64::MAX, DEFAULT_TOP_ZONES, now), Err(Error::Validation(_))));
        assert_eq!(top_zones(&mut store, MAX_TREND_DAYS, DEFAULT_TOP_ZONES, now).unwrap().len(), 1);
    }

    #[test]
    fn breakdown_with_one_zone_holding_everything() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "A")
            .zone(2, "B")
            .usage(1, 60.0, now - Duration::hours(2))
            .usage(1, 40.0, now - Duration::hours(1));

        let shares = zone_breakdown(&mut store, now - Duration::days(1)).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].zone_name, "A");
        assert_relative_eq!(shares[0].usage, 100.0);
        assert_relative_eq!(shares[0].percentage, 100.0);
        assert_eq!(shares[1].zone_name, "B");
        assert_eq!(shares[1].usage, 0.0);
        assert_eq!(shares[1].percentage, 0.0);
    }

    #[test]
    fn breakdown_percentages_sum_to_hundred() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "A")
            .zone(2, "B")
            .zone(3, "C")
            .usage(1, 1.0, now - Duration::hours(1))
            .usage(2, 2.0, now - Duration::hours(1))
            .usage(3, 4.0, now - Duration::hours(1));

        let shares = zone_breakdown(&mut store, now - Duration::days(1)).unwrap();
        let sum: f64 = shares.iter().map(|s| s.percentage).sum();
        assert_relative_eq!(sum, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn breakdown_without_usage_is_all_zero() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store.zone(1, "A").zone(2, "B");

        let shares = zone_breakdown(&mut store, now - Duration::days(1)).unwrap();
        assert!(shares.iter().all(|s| s.percentage == 0.0 && s.usage == 0.0));
    }

    #[test]
    fn top_zones_are_limited_and_sorted() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "A")
            .zone(2, "B")
            .zone(3, "C")
            .zone(4, "D")
            .zone(5, "E")
            .usage(1, 5.0, now - Duration::days(1))
            .usage(2, 50.0, now - Duration::days(2))
            .usage(3, 20.0, now - Duration::days(3))
            .usage(5, 20.0, now - Duration::days(4))
            // too old to count
            .usage(4, 1000.0, now - Duration::days(8));

        let top = top_zones(&mut store, 7, DEFAULT_TOP_ZONES, now).unwrap();
        assert_eq!(top.len(), 4);
        let names: Vec<&str> = top.iter().map(|z| z.zone_name.as_str()).collect();
        // C and E tie; listing order wins
        assert_eq!(names, vec!["B", "C", "E", "A"]);
        assert!(top.windows(2).all(|w| w[0].usage >= w[1].usage));
    }

    #[test]
    fn system_health_is_clamped() {
        assert_eq!(system_health(0), 100);
        assert_eq!(system_health(3), 85);
        assert_eq!(system_health(20), 0);
        assert_eq!(system_health(250), 0);
        assert_eq!(system_health(i64::MAX), 0);
    }

    #[test]
    fn dashboard_snapshot_combines_windows() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "A")
            .zone(2, "B")
            .usage_with_quality(1, 30.0, now - Duration::hours(2), 90)
            .usage_with_quality(2, 10.0, now - Duration::hours(3), 95)
            .usage_with_quality(1, 80.0, now - Duration::days(3), 10)
            .alert(1, AlertStatus::Active)
            .alert(2, AlertStatus::Active)
            .alert(3, AlertStatus::Resolved);

        let snapshot = dashboard_snapshot(&mut store, now).unwrap();
        assert_relative_eq!(snapshot.total_usage, 40.0);
        assert_relative_eq!(snapshot.daily_average, 40.0);
        assert_eq!(snapshot.water_quality, 92);
        assert_eq!(snapshot.system_health, 90);
        assert_eq!(snapshot.active_alerts, 2);
        assert_eq!(snapshot.total_zones, 2);
    }

    #[test]
    fn dashboard_defaults_when_empty() {
        let mut store = MemoryStore::default();
        let snapshot = dashboard_snapshot(&mut store, base_time()).unwrap();
        assert_eq!(snapshot.total_usage, 0.0);
        assert_eq!(snapshot.daily_average, 0.0);
        assert_eq!(snapshot.water_quality, 100);
        assert_eq!(snapshot.system_health, 100);
        assert_eq!(snapshot.total_zones, 0);
    }

    #[test]
    fn resolving_unknown_alert_leaves_store_untouched() {
        let mut store = MemoryStore::default();
        store.alert(1, AlertStatus::Active);

        let err = resolve_alert(&mut store, 99, 7, base_time()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.alerts[0].status, AlertStatus::Active);
        assert!(store.alerts[0].resolved_at.is_none());
    }

    #[test]
    fn resolving_stamps_actor_and_time() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store.alert(1, AlertStatus::Active);

        let alert = resolve_alert(&mut store, 1, 7, now).unwrap();
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert_eq!(alert.resolved_by, Some(7));
        assert_eq!(alert.resolved_at, Some(now));

        // second resolution overwrites the stamp
        let later = now + Duration::minutes(5);
        let again = resolve_alert(&mut store, 1, 8, later).unwrap();
        assert_eq!(again.resolved_by, Some(8));
        assert_eq!(again.resolved_at, Some(later));
    }

    #[test]
    fn report_summary_covers_whole_end_day() {
        let mut store = MemoryStore::default();
        store
            .zone(1, "A")
            .usage(1, 10.0, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
            .usage(1, 15.0, Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap())
            .usage(1, 99.0, Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap());

        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let summary = report_summary(&mut store, start, end).unwrap();
        assert_relative_eq!(summary.totals.total, 25.0);
        assert_eq!(summary.totals.count, 2);
        assert_relative_eq!(summary.zone_breakdown[0].percentage, 100.0);

        assert!(matches!(report_summary(&mut store, end, start), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn report_summary_rejects_end_date_at_calendar_limit() {
        let mut store = MemoryStore::default();
        store.zone(1, "A");
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(matches!(
            report_summary(&mut store, start, NaiveDate::MAX),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn monthly_report_runs_from_first_of_month() {
        let now = base_time();
        let mut store = MemoryStore::default();
        store
            .zone(1, "A")
            .usage(1, 12.0, Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap())
            .usage(1, 100.0, Utc.with_ymd_and_hms(2026, 2, 28, 6, 0, 0).unwrap());

        let report = monthly_report(&mut store, now).unwrap();
        assert_eq!(report.period, "2026-03-01 to 2026-03-15");
        assert_relative_eq!(report.total_usage, 12.0);
        assert_eq!(report.report_type, "monthly");
    }
}
