use crate::api::auth::Actor;
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::models::{NewZone, Zone, ZoneChanges};
use crate::error::{Error, Result};
use crate::schema;
use crate::services::activity::{self, actions};
use crate::services::aggregation::{self, ZoneUsageStats};
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use validator::Validate;

/// Active zones by name.
pub async fn list_zones(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Zone>>> {
    let zones = state
        .with_conn(move |conn| {
            use schema::zones::dsl as Z;

            let mut query = Z::zones
                .filter(Z::is_active.eq(true))
                .select(Zone::as_select())
                .into_boxed();
            if let Some(pattern) = params.pattern() {
                query = query.filter(Z::name.ilike(pattern.clone()).or(Z::description.ilike(pattern)));
            }
            Ok(query
                .order((Z::name.asc(), Z::id.asc()))
                .limit(params.limit())
                .offset(params.offset())
                .load(conn)?)
        })
        .await?;
    Ok(Json(zones))
}

pub async fn get_zone(State(state): State<AppState>, _actor: Actor, Path(id): Path<i64>) -> Result<Json<Zone>> {
    let zone = state.with_conn(move |conn| find_zone(conn, id)).await?;
    Ok(Json(zone))
}

pub async fn create_zone(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(request): JsonBody<NewZone>,
) -> Result<(StatusCode, Json<Zone>)> {
    request.validate()?;

    let zone = state
        .with_conn(move |conn| {
            use schema::zones::dsl as Z;

            let zone = diesel::insert_into(Z::zones)
                .values(&request)
                .returning(Zone::as_returning())
                .get_result(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::ZONE_CREATED,
                format!("Created zone '{}'", zone.name),
            );
            Ok(zone)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn update_zone(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(changes): JsonBody<ZoneChanges>,
) -> Result<Json<Zone>> {
    changes.validate()?;

    let zone = state
        .with_conn(move |conn| {
            use schema::zones::dsl as Z;

            let zone: Zone = diesel::update(Z::zones.find(id))
                .set((&changes, Z::updated_at.eq(Utc::now())))
                .returning(Zone::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| Error::NotFound(format!("zone {}", id)))?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::ZONE_UPDATED,
                format!("Updated zone '{}'", zone.name),
            );
            Ok(zone)
        })
        .await?;
    Ok(Json(zone))
}

/// Removes the zone along with its readings and alerts.
pub async fn delete_zone(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<StatusCode> {
    state
        .with_conn(move |conn| {
            use schema::zones::dsl as Z;

            let zone = find_zone(conn, id)?;
            diesel::delete(Z::zones.find(id)).execute(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::ZONE_DELETED,
                format!("Deleted zone '{}'", zone.name),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Trailing 24h totals for one active zone.
pub async fn zone_usage_stats(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<ZoneUsageStats>> {
    let stats = state
        .with_conn(move |conn| aggregation::zone_usage_stats(conn, id, Utc::now()))
        .await?;
    Ok(Json(stats))
}

fn find_zone(conn: &mut PgConnection, id: i64) -> Result<Zone> {
    use schema::zones::dsl as Z;

    Z::zones
        .find(id)
        .select(Zone::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("zone {}", id)))
}
