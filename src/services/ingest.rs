use crate::db::models::{NewUsageRecord, UsageRecord};
use crate::error::Result;
use crate::schema;
use diesel::PgConnection;
use diesel::prelude::*;

/// Insert a batch of usage readings in one statement. Unknown zone ids fail the whole batch.
pub fn insert_usage_records(conn: &mut PgConnection, rows: &[NewUsageRecord]) -> Result<Vec<UsageRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    use schema::usage_records::dsl as U;

    Ok(diesel::insert_into(U::usage_records)
        .values(rows)
        .returning(UsageRecord::as_returning())
        .get_results(conn)?)
}
