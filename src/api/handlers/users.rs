use crate::api::auth::Actor;
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::models::{User, UserChanges};
use crate::error::{Error, Result};
use crate::schema;
use crate::services::accounts::{self, NewAccount, Registration};
use crate::services::activity::{self, actions};
use axum::Json;
use axum::extract::{Path, Query, State};
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use validator::Validate;

pub async fn list_users(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<User>>> {
    let users = state
        .with_conn(move |conn| {
            use schema::users::dsl as U;

            let mut query = U::users.select(User::as_select()).into_boxed();
            if let Some(pattern) = params.pattern() {
                query = query.filter(
                    U::username
                        .ilike(pattern.clone())
                        .or(U::email.ilike(pattern.clone()))
                        .or(U::first_name.ilike(pattern.clone()))
                        .or(U::last_name.ilike(pattern)),
                );
            }
            Ok(query
                .order((U::username.asc(), U::id.asc()))
                .limit(params.limit())
                .offset(params.offset())
                .load(conn)?)
        })
        .await?;
    Ok(Json(users))
}

pub async fn get_user(State(state): State<AppState>, _actor: Actor, Path(id): Path<i64>) -> Result<Json<User>> {
    let user = state.with_conn(move |conn| find_user(conn, id)).await?;
    Ok(Json(user))
}

/// Creates the account and its profile. The token is only ever returned here.
pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(request): JsonBody<NewAccount>,
) -> Result<(StatusCode, Json<Registration>)> {
    actor.require_admin()?;
    request.validate()?;

    let registration = state
        .with_conn(move |conn| {
            let registration = accounts::register_user(conn, &request, None)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::USER_CREATED,
                format!(
                    "Created {} account '{}'",
                    registration.profile.role, registration.user.username
                ),
            );
            Ok(registration)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(changes): JsonBody<UserChanges>,
) -> Result<Json<User>> {
    actor.require_admin()?;
    changes.validate()?;

    let user = state
        .with_conn(move |conn| {
            use schema::users::dsl as U;

            if changes.is_empty() {
                return find_user(conn, id);
            }
            let user: User = diesel::update(U::users.find(id))
                .set(&changes)
                .returning(User::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| Error::NotFound(format!("user {}", id)))?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::USER_UPDATED,
                format!("Updated account '{}'", user.username),
            );
            Ok(user)
        })
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<StatusCode> {
    actor.require_admin()?;
    if actor.user.id == id {
        return Err(Error::Conflict("cannot delete your own account".to_string()));
    }

    state
        .with_conn(move |conn| {
            use schema::users::dsl as U;

            let user = find_user(conn, id)?;
            diesel::delete(U::users.find(id)).execute(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::USER_DELETED,
                format!("Deleted account '{}'", user.username),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn find_user(conn: &mut PgConnection, id: i64) -> Result<User> {
    use schema::users::dsl as U;

    U::users
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("user {}", id)))
}
