use crate::api::auth::Actor;
use crate::api::handlers::{user_names, zone_names};
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::enums::AlertStatus;
use crate::db::models::{Alert, AlertChanges, NewAlert};
use crate::error::{Error, Result};
use crate::schema;
use crate::services::activity::{self, actions};
use crate::services::aggregation;
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: Alert,
    pub zone_name: Option<String>,
    pub alert_type_display: &'static str,
    pub status_display: &'static str,
    pub resolved_by_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AlertCounts {
    pub active: i64,
    pub resolved: i64,
    pub total: i64,
}

/// Newest first, optionally filtered by status.
pub async fn list_alerts(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filter): Query<AlertFilter>,
) -> Result<Json<Vec<AlertView>>> {
    let views = state
        .with_conn(move |conn| load_alerts(conn, &params, filter.status))
        .await?;
    Ok(Json(views))
}

pub async fn active_alerts(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AlertView>>> {
    let views = state
        .with_conn(move |conn| load_alerts(conn, &params, Some(AlertStatus::Active)))
        .await?;
    Ok(Json(views))
}

pub async fn alert_counts(State(state): State<AppState>, _actor: Actor) -> Result<Json<AlertCounts>> {
    let counts = state
        .with_conn(|conn| {
            use schema::alerts::dsl as A;

            let rows: Vec<(AlertStatus, i64)> = A::alerts
                .group_by(A::status)
                .select((A::status, diesel::dsl::count_star()))
                .load(conn)?;
            let mut counts = AlertCounts::default();
            for (status, n) in rows {
                match status {
                    AlertStatus::Active => counts.active += n,
                    AlertStatus::Resolved => counts.resolved += n,
                }
                counts.total += n;
            }
            Ok(counts)
        })
        .await?;
    Ok(Json(counts))
}

pub async fn get_alert(State(state): State<AppState>, _actor: Actor, Path(id): Path<i64>) -> Result<Json<AlertView>> {
    let view = state
        .with_conn(move |conn| {
            let alert = find_alert(conn, id)?;
            single_view(conn, alert)
        })
        .await?;
    Ok(Json(view))
}

pub async fn create_alert(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(request): JsonBody<NewAlert>,
) -> Result<(StatusCode, Json<AlertView>)> {
    request.validate()?;

    let view = state
        .with_conn(move |conn| {
            use schema::alerts::dsl as A;

            let alert = diesel::insert_into(A::alerts)
                .values(&request)
                .returning(Alert::as_returning())
                .get_result(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::ALERT_CREATED,
                format!("Raised {} alert '{}'", alert.alert_type, alert.title),
            );
            single_view(conn, alert)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Edits descriptive fields. Status only changes through resolution.
pub async fn update_alert(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(changes): JsonBody<AlertChanges>,
) -> Result<Json<AlertView>> {
    changes.validate()?;

    let view = state
        .with_conn(move |conn| {
            use schema::alerts::dsl as A;

            let alert = if changes.is_empty() {
                find_alert(conn, id)?
            } else {
                let alert: Alert = diesel::update(A::alerts.find(id))
                    .set(&changes)
                    .returning(Alert::as_returning())
                    .get_result(conn)
                    .optional()?
                    .ok_or_else(|| Error::NotFound(format!("alert {}", id)))?;
                activity::record_or_warn(
                    conn,
                    &actor.origin(),
                    actions::ALERT_UPDATED,
                    format!("Updated alert '{}'", alert.title),
                );
                alert
            };
            single_view(conn, alert)
        })
        .await?;
    Ok(Json(view))
}

pub async fn delete_alert(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<StatusCode> {
    state
        .with_conn(move |conn| {
            use schema::alerts::dsl as A;

            let alert = find_alert(conn, id)?;
            diesel::delete(A::alerts.find(id)).execute(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::ALERT_DELETED,
                format!("Deleted alert '{}'", alert.title),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Marks the alert resolved by the caller, now.
pub async fn resolve_alert(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<AlertView>> {
    let view = state
        .with_conn(move |conn| {
            let alert = aggregation::resolve_alert(conn, id, actor.user.id, Utc::now())?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::ALERT_RESOLVED,
                format!("Resolved alert '{}'", alert.title),
            );
            single_view(conn, alert)
        })
        .await?;
    Ok(Json(view))
}

fn load_alerts(conn: &mut PgConnection, params: &ListParams, status: Option<AlertStatus>) -> Result<Vec<AlertView>> {
    use schema::alerts::dsl as A;

    let mut query = A::alerts.select(Alert::as_select()).into_boxed();
    if let Some(status) = status {
        query = query.filter(A::status.eq(status));
    }
    if let Some(pattern) = params.pattern() {
        query = query.filter(A::title.ilike(pattern.clone()).or(A::message.ilike(pattern)));
    }
    let alerts = query
        .order((A::created_at.desc(), A::id.desc()))
        .limit(params.limit())
        .offset(params.offset())
        .load(conn)?;
    views(conn, alerts)
}

fn find_alert(conn: &mut PgConnection, id: i64) -> Result<Alert> {
    use schema::alerts::dsl as A;

    A::alerts
        .find(id)
        .select(Alert::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("alert {}", id)))
}

fn single_view(conn: &mut PgConnection, alert: Alert) -> Result<AlertView> {
    let id = alert.id;
    views(conn, vec![alert])?
        .pop()
        .ok_or_else(|| Error::NotFound(format!("alert {}", id)))
}

fn views(conn: &mut PgConnection, alerts: Vec<Alert>) -> Result<Vec<AlertView>> {
    let zones = zone_names(conn, alerts.iter().filter_map(|a| a.zone_id))?;
    let resolvers = user_names(conn, alerts.iter().filter_map(|a| a.resolved_by))?;
    Ok(alerts
        .into_iter()
        .map(|alert| AlertView {
            zone_name: alert.zone_id.and_then(|id| zones.get(&id).cloned()),
            alert_type_display: alert.alert_type.label(),
            status_display: alert.status.label(),
            resolved_by_name: alert.resolved_by.and_then(|id| resolvers.get(&id).cloned()),
            alert,
        })
        .collect())
}
