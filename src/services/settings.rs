//! The organization-wide settings singleton.
//!
//! There is exactly one row, id 1. It is created with defaults on first access;
//! the insert is `ON CONFLICT DO NOTHING`, so concurrent first reads agree.

use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;

use crate::db::models::{NewSettings, Settings, SettingsChanges};
use crate::error::Result;
use crate::schema;

pub const SETTINGS_ID: i32 = 1;
pub const DEFAULT_ORGANIZATION_NAME: &str = "Water Management Corp";

/// Values used when the singleton has to be created.
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub organization_name: String,
    pub organization_email: String,
    pub api_endpoint: String,
}

impl SettingsDefaults {
    fn to_row(&self) -> NewSettings {
        NewSettings {
            id: SETTINGS_ID,
            organization_name: self.organization_name.clone(),
            organization_email: self.organization_email.clone(),
            system_version: env!("CARGO_PKG_VERSION").to_string(),
            api_endpoint: self.api_endpoint.clone(),
        }
    }
}

pub fn get_or_create_default(conn: &mut PgConnection, defaults: &SettingsDefaults) -> Result<Settings> {
    use schema::system_settings::dsl as S;

    diesel::insert_into(S::system_settings)
        .values(&defaults.to_row())
        .on_conflict(S::id)
        .do_nothing()
        .execute(conn)?;

    Ok(S::system_settings
        .find(SETTINGS_ID)
        .select(Settings::as_select())
        .first(conn)?)
}

pub fn update(conn: &mut PgConnection, defaults: &SettingsDefaults, changes: &SettingsChanges) -> Result<Settings> {
    use schema::system_settings::dsl as S;

    get_or_create_default(conn, defaults)?;
    Ok(diesel::update(S::system_settings.find(SETTINGS_ID))
        .set((changes, S::updated_at.eq(Utc::now())))
        .returning(Settings::as_returning())
        .get_result(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_row_is_the_singleton() {
        let defaults = SettingsDefaults {
            organization_name: DEFAULT_ORGANIZATION_NAME.to_string(),
            organization_email: "admin@watermanagement.com".to_string(),
            api_endpoint: "http://localhost:8000/api/".to_string(),
        };
        let row = defaults.to_row();
        assert_eq!(row.id, SETTINGS_ID);
        assert_eq!(row.system_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(row.organization_email, "admin@watermanagement.com");
    }
}
