//! Read access the aggregation engine needs from persistence.
//!
//! `PgConnection` is the production implementation. The trait keeps the engine
//! independent of diesel so it can be exercised against plain vectors.

use chrono::{DateTime, Utc};
use diesel::PgConnection;
use diesel::dsl::avg;
use diesel::prelude::*;
use log::warn;

use crate::db::enums::AlertStatus;
use crate::db::models::{Alert, UsageRecord, Zone};
use crate::error::{Error, Result};
use crate::schema;

pub trait UsageStore {
    /// Zone by id, active or not.
    fn find_zone(&mut self, zone_id: i64) -> Result<Option<Zone>>;

    /// Active zones in listing order (by name, then id).
    fn active_zones(&mut self) -> Result<Vec<Zone>>;

    /// Usage records with `since <= measured_at < until`, newest first.
    ///
    /// Without a zone filter only records of active zones are returned.
    /// A missing `until` leaves the window open-ended.
    fn usage_between(
        &mut self,
        zone_id: Option<i64>,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageRecord>>;

    /// All-time mean volume per record over active zones.
    fn average_usage(&mut self) -> Result<Option<f64>>;

    fn count_active_alerts(&mut self) -> Result<i64>;

    /// Atomically mark an alert resolved. `None` when the id is unknown.
    fn resolve_alert(&mut self, alert_id: i64, actor_id: i64, now: DateTime<Utc>) -> Result<Option<Alert>>;
}

impl UsageStore for PgConnection {
    fn find_zone(&mut self, zone_id: i64) -> Result<Option<Zone>> {
        use schema::zones::dsl as Z;

        Ok(Z::zones
            .find(zone_id)
            .select(Zone::as_select())
            .first(self)
            .optional()?)
    }

    fn active_zones(&mut self) -> Result<Vec<Zone>> {
        use schema::zones::dsl as Z;

        Ok(Z::zones
            .filter(Z::is_active.eq(true))
            .order((Z::name.asc(), Z::id.asc()))
            .select(Zone::as_select())
            .load(self)?)
    }

    fn usage_between(
        &mut self,
        zone_id: Option<i64>,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageRecord>> {
        use schema::usage_records::dsl as U;
        use schema::zones::dsl as Z;

        let mut query = U::usage_records
            .inner_join(Z::zones)
            .filter(U::measured_at.ge(since))
            .select(UsageRecord::as_select())
            .order(U::measured_at.desc())
            .into_boxed();

        query = match zone_id {
            Some(zone_id) => query.filter(U::zone_id.eq(zone_id)),
            None => query.filter(Z::is_active.eq(true)),
        };
        if let Some(until) = until {
            query = query.filter(U::measured_at.lt(until));
        }

        Ok(query.load(self)?)
    }

    fn average_usage(&mut self) -> Result<Option<f64>> {
        use schema::usage_records::dsl as U;
        use schema::zones::dsl as Z;

        Ok(U::usage_records
            .inner_join(Z::zones)
            .filter(Z::is_active.eq(true))
            .select(avg(U::usage_liters))
            .first::<Option<f64>>(self)?)
    }

    fn count_active_alerts(&mut self) -> Result<i64> {
        use schema::alerts::dsl as A;

        Ok(A::alerts
            .filter(A::status.eq(AlertStatus::Active))
            .count()
            .get_result(self)?)
    }

    fn resolve_alert(&mut self, alert_id: i64, actor_id: i64, now: DateTime<Utc>) -> Result<Option<Alert>> {
        use schema::alerts::dsl as A;

        self.transaction::<_, Error, _>(|conn| {
            let current = A::alerts
                .find(alert_id)
                .select(Alert::as_select())
                .for_update()
                .first(conn)
                .optional()?;
            let Some(current) = current else {
                return Ok(None);
            };

            if current.status == AlertStatus::Resolved {
                warn!(
                    "Alert {} already resolved at {:?} by {:?}; overwriting with user {}",
                    alert_id, current.resolved_at, current.resolved_by, actor_id
                );
            }

            let updated = diesel::update(A::alerts.find(alert_id))
                .set((
                    A::status.eq(AlertStatus::Resolved),
                    A::resolved_at.eq(Some(now)),
                    A::resolved_by.eq(Some(actor_id)),
                ))
                .returning(Alert::as_returning())
                .get_result(conn)?;
            Ok(Some(updated))
        })
    }
}
