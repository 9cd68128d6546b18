use crate::api::auth::Actor;
use crate::api::{AppState, JsonBody};
use crate::db::models::{Settings, SettingsChanges};
use crate::error::Result;
use crate::services::activity::{self, actions};
use crate::services::settings;
use axum::Json;
use axum::extract::State;
use validator::Validate;

/// The settings singleton, created with defaults on first access.
pub async fn current_settings(State(state): State<AppState>, _actor: Actor) -> Result<Json<Settings>> {
    let defaults = state.config.settings_defaults();
    let current = state
        .with_conn(move |conn| settings::get_or_create_default(conn, &defaults))
        .await?;
    Ok(Json(current))
}

pub async fn update_settings(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(changes): JsonBody<SettingsChanges>,
) -> Result<Json<Settings>> {
    actor.require_settings_access()?;
    changes.validate()?;

    let defaults = state.config.settings_defaults();
    let updated = state
        .with_conn(move |conn| {
            let updated = settings::update(conn, &defaults, &changes)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::SETTINGS_UPDATED,
                format!("Updated settings for '{}'", updated.organization_name),
            );
            Ok(updated)
        })
        .await?;
    Ok(Json(updated))
}
