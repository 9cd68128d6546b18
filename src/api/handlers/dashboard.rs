use crate::api::auth::Actor;
use crate::api::handlers::activity::ActivityView;
use crate::api::handlers::user_names;
use crate::api::AppState;
use crate::error::Result;
use crate::services::activity;
use crate::services::aggregation::{self, DEFAULT_TOP_ZONE_DAYS, DEFAULT_TOP_ZONES, DashboardSnapshot, ZoneUsage};
use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde::Deserialize;

pub const RECENT_ACTIVITY_LIMIT: i64 = 20;
const MAX_TOP_ZONES: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopZonesParams {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

pub async fn stats(State(state): State<AppState>, _actor: Actor) -> Result<Json<DashboardSnapshot>> {
    let snapshot = state
        .with_conn(|conn| aggregation::dashboard_snapshot(conn, Utc::now()))
        .await?;
    Ok(Json(snapshot))
}

/// Highest-consuming active zones, last 7 days and top 4 unless overridden.
pub async fn top_zones(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<TopZonesParams>,
) -> Result<Json<Vec<ZoneUsage>>> {
    let days = params.days.unwrap_or(DEFAULT_TOP_ZONE_DAYS);
    let limit = params.limit.unwrap_or(DEFAULT_TOP_ZONES).min(MAX_TOP_ZONES);
    let ranked = state
        .with_conn(move |conn| aggregation::top_zones(conn, days, limit, Utc::now()))
        .await?;
    Ok(Json(ranked))
}

pub async fn recent_activity(State(state): State<AppState>, _actor: Actor) -> Result<Json<Vec<ActivityView>>> {
    let views = state
        .with_conn(|conn| {
            let entries = activity::recent(conn, RECENT_ACTIVITY_LIMIT)?;
            let names = user_names(conn, entries.iter().filter_map(|e| e.user_id))?;
            Ok(entries
                .into_iter()
                .map(|entry| ActivityView {
                    user_name: entry.user_id.and_then(|id| names.get(&id).cloned()),
                    entry,
                })
                .collect::<Vec<_>>())
        })
        .await?;
    Ok(Json(views))
}
