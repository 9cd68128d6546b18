use crate::api::auth::Actor;
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::models::{ProfileChanges, User, UserProfile};
use crate::error::{Error, Result};
use crate::schema;
use crate::services::activity::{self, actions};
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub user: User,
    pub role_display: &'static str,
}

impl From<(UserProfile, User)> for ProfileView {
    fn from((profile, user): (UserProfile, User)) -> Self {
        ProfileView {
            role_display: profile.role.label(),
            profile,
            user,
        }
    }
}

pub async fn list_profiles(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProfileView>>> {
    let views = state
        .with_conn(move |conn| {
            use schema::user_profiles::dsl as P;
            use schema::users::dsl as U;

            let rows: Vec<(UserProfile, User)> = P::user_profiles
                .inner_join(U::users)
                .select((UserProfile::as_select(), User::as_select()))
                .order((U::username.asc(), P::id.asc()))
                .limit(params.limit())
                .offset(params.offset())
                .load(conn)?;
            Ok(rows.into_iter().map(ProfileView::from).collect::<Vec<_>>())
        })
        .await?;
    Ok(Json(views))
}

pub async fn get_profile(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<ProfileView>> {
    let view = state.with_conn(move |conn| find_profile(conn, id)).await?;
    Ok(Json(view))
}

pub async fn my_profile(actor: Actor) -> Result<Json<ProfileView>> {
    Ok(Json(ProfileView::from((actor.profile, actor.user))))
}

/// Preferences only; roles are assigned by administrators.
pub async fn update_my_profile(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(changes): JsonBody<ProfileChanges>,
) -> Result<Json<ProfileView>> {
    if changes.role.is_some_and(|role| role != actor.role()) {
        return Err(Error::Forbidden("cannot change your own role".to_string()));
    }
    changes.validate()?;

    let profile_id = actor.profile.id;
    let changes = ProfileChanges { role: None, ..changes };
    let view = state
        .with_conn(move |conn| apply_changes(conn, &actor, profile_id, &changes))
        .await?;
    Ok(Json(view))
}

pub async fn update_profile(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(changes): JsonBody<ProfileChanges>,
) -> Result<Json<ProfileView>> {
    actor.require_admin()?;
    changes.validate()?;

    let view = state
        .with_conn(move |conn| apply_changes(conn, &actor, id, &changes))
        .await?;
    Ok(Json(view))
}

fn apply_changes(conn: &mut PgConnection, actor: &Actor, id: i64, changes: &ProfileChanges) -> Result<ProfileView> {
    use schema::user_profiles::dsl as P;

    let updated = diesel::update(P::user_profiles.find(id))
        .set((changes, P::updated_at.eq(Utc::now())))
        .execute(conn)?;
    if updated == 0 {
        return Err(Error::NotFound(format!("profile {}", id)));
    }

    let view = find_profile(conn, id)?;
    let description = match changes.role {
        Some(role) => format!("Updated profile of '{}' (role {})", view.user.username, role),
        None => format!("Updated profile of '{}'", view.user.username),
    };
    activity::record_or_warn(conn, &actor.origin(), actions::PROFILE_UPDATED, description);
    Ok(view)
}

fn find_profile(conn: &mut PgConnection, id: i64) -> Result<ProfileView> {
    use schema::user_profiles::dsl as P;
    use schema::users::dsl as U;

    let row: (UserProfile, User) = P::user_profiles
        .inner_join(U::users)
        .filter(P::id.eq(id))
        .select((UserProfile::as_select(), User::as_select()))
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("profile {}", id)))?;
    Ok(row.into())
}
