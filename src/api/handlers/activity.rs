use crate::api::auth::Actor;
use crate::api::{AppState, ListParams};
use crate::db::models::{ActivityLogEntry, User};
use crate::error::{Error, Result};
use crate::schema;
use axum::Json;
use axum::extract::{Path, Query, State};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub entry: ActivityLogEntry,
    pub user_name: Option<String>,
}

impl From<(ActivityLogEntry, Option<User>)> for ActivityView {
    fn from((entry, user): (ActivityLogEntry, Option<User>)) -> Self {
        ActivityView {
            entry,
            user_name: user.map(|u| u.full_name()),
        }
    }
}

/// Newest first. `search` matches the username, action or description.
pub async fn list_activity(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ActivityView>>> {
    let views = state
        .with_conn(move |conn| {
            use schema::activity_logs::dsl as L;
            use schema::users::dsl as U;

            let mut query = L::activity_logs
                .left_join(U::users)
                .select((ActivityLogEntry::as_select(), Option::<User>::as_select()))
                .into_boxed();
            if let Some(pattern) = params.pattern() {
                query = query.filter(
                    U::username
                        .nullable()
                        .ilike(pattern.clone())
                        .or(L::action.ilike(pattern.clone()))
                        .or(L::description.ilike(pattern)),
                );
            }
            let rows: Vec<(ActivityLogEntry, Option<User>)> = query
                .order((L::timestamp.desc(), L::id.desc()))
                .limit(params.limit())
                .offset(params.offset())
                .load(conn)?;
            Ok(rows.into_iter().map(ActivityView::from).collect::<Vec<_>>())
        })
        .await?;
    Ok(Json(views))
}

pub async fn get_activity(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<ActivityView>> {
    let view = state
        .with_conn(move |conn| {
            use schema::activity_logs::dsl as L;
            use schema::users::dsl as U;

            let row: (ActivityLogEntry, Option<User>) = L::activity_logs
                .left_join(U::users)
                .filter(L::id.eq(id))
                .select((ActivityLogEntry::as_select(), Option::<User>::as_select()))
                .first(conn)
                .optional()?
                .ok_or_else(|| Error::NotFound(format!("activity entry {}", id)))?;
            Ok(ActivityView::from(row))
        })
        .await?;
    Ok(Json(view))
}
