use crate::db::models::{ActivityLogEntry, NewActivityLogEntry};
use crate::error::Result;
use crate::schema;
use diesel::PgConnection;
use diesel::prelude::*;
use log::warn;

// Standardized values for `activity_logs.action`.
pub mod actions {
    pub const USER_CREATED: &str = "user_created";
    pub const USER_UPDATED: &str = "user_updated";
    pub const USER_DELETED: &str = "user_deleted";
    pub const PROFILE_UPDATED: &str = "profile_updated";

    pub const ZONE_CREATED: &str = "zone_created";
    pub const ZONE_UPDATED: &str = "zone_updated";
    pub const ZONE_DELETED: &str = "zone_deleted";

    pub const USAGE_DELETED: &str = "usage_deleted";

    pub const ALERT_CREATED: &str = "alert_created";
    pub const ALERT_UPDATED: &str = "alert_updated";
    pub const ALERT_RESOLVED: &str = "alert_resolved";
    pub const ALERT_DELETED: &str = "alert_deleted";

    pub const REPORT_GENERATED: &str = "report_generated";
    pub const REPORT_DELETED: &str = "report_deleted";

    pub const SETTINGS_UPDATED: &str = "settings_updated";

    pub const COMPLIANCE_CREATED: &str = "compliance_created";
    pub const COMPLIANCE_UPDATED: &str = "compliance_updated";
    pub const COMPLIANCE_DELETED: &str = "compliance_deleted";
}

/// Who did something and from where.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
}

pub fn record(
    conn: &mut PgConnection,
    origin: &Origin,
    action: &str,
    description: impl Into<String>,
) -> Result<ActivityLogEntry> {
    use schema::activity_logs::dsl as L;

    let row = NewActivityLogEntry {
        user_id: origin.user_id,
        action: action.to_string(),
        description: description.into(),
        ip_address: origin.ip_address.clone(),
    };
    Ok(diesel::insert_into(L::activity_logs)
        .values(&row)
        .returning(ActivityLogEntry::as_returning())
        .get_result(conn)?)
}

/// Audit entries must never fail the action they describe; failures are only logged.
pub fn record_or_warn(conn: &mut PgConnection, origin: &Origin, action: &str, description: impl Into<String>) {
    if let Err(e) = record(conn, origin, action, description) {
        warn!("Failed to append activity log entry '{}': {}", action, e);
    }
}

pub fn recent(conn: &mut PgConnection, limit: i64) -> Result<Vec<ActivityLogEntry>> {
    use schema::activity_logs::dsl as L;

    Ok(L::activity_logs
        .order((L::timestamp.desc(), L::id.desc()))
        .limit(limit)
        .select(ActivityLogEntry::as_select())
        .load(conn)?)
}
