use crate::api::auth::Actor;
use crate::api::handlers::zone_names;
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::models::{NewUsageRecord, UsageRecord};
use crate::error::{Error, Result};
use crate::schema;
use crate::services::activity::{self, actions};
use crate::services::aggregation::{self, DEFAULT_TREND_DAYS, DailyUsage};
use crate::services::ingest::insert_usage_records;
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct UsageView {
    #[serde(flatten)]
    pub record: UsageRecord,
    pub zone_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageFilter {
    pub zone: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendParams {
    pub days: Option<i64>,
    pub zone: Option<i64>,
}

/// Readings newest first, optionally for a single zone.
pub async fn list_usage(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filter): Query<UsageFilter>,
) -> Result<Json<Vec<UsageView>>> {
    let views = state
        .with_conn(move |conn| {
            use schema::usage_records::dsl as U;

            let mut query = U::usage_records.select(UsageRecord::as_select()).into_boxed();
            if let Some(zone_id) = filter.zone {
                query = query.filter(U::zone_id.eq(zone_id));
            }
            let records = query
                .order((U::measured_at.desc(), U::id.desc()))
                .limit(params.limit())
                .offset(params.offset())
                .load(conn)?;
            with_zone_names(conn, records)
        })
        .await?;
    Ok(Json(views))
}

pub async fn get_usage(State(state): State<AppState>, _actor: Actor, Path(id): Path<i64>) -> Result<Json<UsageView>> {
    let view = state
        .with_conn(move |conn| {
            let record = find_usage(conn, id)?;
            let mut views = with_zone_names(conn, vec![record])?;
            views.pop().ok_or_else(|| Error::NotFound(format!("usage record {}", id)))
        })
        .await?;
    Ok(Json(view))
}

pub async fn create_usage(
    State(state): State<AppState>,
    _actor: Actor,
    JsonBody(request): JsonBody<NewUsageRecord>,
) -> Result<(StatusCode, Json<UsageView>)> {
    request.validate()?;
    if !request.usage_liters.is_finite() {
        return Err(Error::Validation("usage_liters: must be a finite number".to_string()));
    }

    let view = state
        .with_conn(move |conn| {
            let inserted = insert_usage_records(conn, std::slice::from_ref(&request))?;
            let mut views = with_zone_names(conn, inserted)?;
            views
                .pop()
                .ok_or_else(|| Error::Internal("insert returned no usage record".to_string()))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn delete_usage(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<StatusCode> {
    state
        .with_conn(move |conn| {
            use schema::usage_records::dsl as U;

            let record = find_usage(conn, id)?;
            diesel::delete(U::usage_records.find(id)).execute(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::USAGE_DELETED,
                format!(
                    "Deleted {} L reading for zone {} at {}",
                    record.usage_liters, record.zone_id, record.measured_at
                ),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Daily totals for the last `days` UTC days, oldest first.
pub async fn usage_trend(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<TrendParams>,
) -> Result<Json<Vec<DailyUsage>>> {
    let days = params.days.unwrap_or(DEFAULT_TREND_DAYS);
    let trend = state
        .with_conn(move |conn| aggregation::daily_trend(conn, params.zone, days, Utc::now()))
        .await?;
    Ok(Json(trend))
}

fn find_usage(conn: &mut PgConnection, id: i64) -> Result<UsageRecord> {
    use schema::usage_records::dsl as U;

    U::usage_records
        .find(id)
        .select(UsageRecord::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("usage record {}", id)))
}

fn with_zone_names(conn: &mut PgConnection, records: Vec<UsageRecord>) -> Result<Vec<UsageView>> {
    let names = zone_names(conn, records.iter().map(|r| r.zone_id))?;
    Ok(records
        .into_iter()
        .map(|record| UsageView {
            zone_name: names.get(&record.zone_id).cloned(),
            record,
        })
        .collect())
}
