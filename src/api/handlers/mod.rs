pub mod activity;
pub mod alerts;
pub mod compliance;
pub mod dashboard;
pub mod profiles;
pub mod reports;
pub mod settings;
pub mod usage;
pub mod users;
pub mod zones;

use crate::api::AppState;
use crate::db::models::{User, Zone};
use crate::error::Result;
use crate::schema;
use axum::Json;
use axum::extract::State;
use diesel::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub database: bool,
}

/// Liveness plus a database round-trip. Does not require authentication.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let database = state
        .with_conn(|conn| Ok(diesel::sql_query("SELECT 1").execute(conn).is_ok()))
        .await
        .unwrap_or(false);

    Ok(Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("BUILD_TIME_GIT_HASH"),
        database,
    }))
}

/// Display names for the given user ids; unknown ids are absent.
pub(crate) fn user_names(conn: &mut PgConnection, ids: impl IntoIterator<Item = i64>) -> Result<HashMap<i64, String>> {
    use schema::users::dsl as U;

    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users: Vec<User> = U::users
        .filter(U::id.eq_any(&ids))
        .select(User::as_select())
        .load(conn)?;
    Ok(users.into_iter().map(|u| (u.id, u.full_name())).collect())
}

pub(crate) fn zone_names(conn: &mut PgConnection, ids: impl IntoIterator<Item = i64>) -> Result<HashMap<i64, String>> {
    use schema::zones::dsl as Z;

    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let zones: Vec<Zone> = Z::zones
        .filter(Z::id.eq_any(&ids))
        .select(Zone::as_select())
        .load(conn)?;
    Ok(zones.into_iter().map(|z| (z.id, z.name)).collect())
}
