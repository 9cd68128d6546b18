//! Diesel model structs for the monitored entities.
//!
//! Queryable rows serialize straight into API responses. `New*` structs are
//! insert payloads and `*Changes` structs are partial updates; the ones that
//! arrive from clients carry their `validator` rules alongside.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::enums::{AlertStatus, AlertType, ComplianceStatus, ReportType, Role, Theme, ZoneType};
use crate::schema;

fn default_true() -> bool {
    true
}

fn default_quality() -> i32 {
    100
}

fn default_severity() -> i32 {
    1
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::users)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let trimmed = full.trim();
        if trimmed.is_empty() {
            self.username.clone()
        } else {
            trimmed.to_string()
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub token_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = schema::users)]
pub struct UserChanges {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.first_name.is_none() && self.last_name.is_none() && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize)]
#[diesel(table_name = schema::user_profiles)]
#[diesel(belongs_to(User))]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub organization: String,
    pub phone: String,
    pub timezone: String,
    pub language: String,
    pub theme: Theme,
    pub notifications_enabled: bool,
    pub email_alerts: bool,
    pub daily_reports: bool,
    pub auto_backup: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The profile every new user starts with; remaining columns use their defaults.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::user_profiles)]
pub struct NewUserProfile {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = schema::user_profiles)]
pub struct ProfileChanges {
    pub role: Option<Role>,
    #[validate(length(max = 255))]
    pub organization: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub timezone: Option<String>,
    #[validate(length(min = 2, max = 10))]
    pub language: Option<String>,
    pub theme: Option<Theme>,
    pub notifications_enabled: Option<bool>,
    pub email_alerts: Option<bool>,
    pub daily_reports: Option<bool>,
    pub auto_backup: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::zones)]
pub struct Zone {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub zone_type: ZoneType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = schema::zones)]
pub struct NewZone {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub zone_type: ZoneType,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = schema::zones)]
pub struct ZoneChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub zone_type: Option<ZoneType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize)]
#[diesel(table_name = schema::usage_records)]
#[diesel(belongs_to(Zone))]
pub struct UsageRecord {
    pub id: i64,
    pub zone_id: i64,
    pub usage_liters: f64,
    pub measured_at: DateTime<Utc>,
    pub is_peak: bool,
    pub quality_pct: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = schema::usage_records)]
pub struct NewUsageRecord {
    pub zone_id: i64,
    #[validate(range(min = 0.0))]
    pub usage_liters: f64,
    pub measured_at: DateTime<Utc>,
    #[serde(default)]
    pub is_peak: bool,
    #[serde(default = "default_quality")]
    #[validate(range(min = 0, max = 100))]
    pub quality_pct: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::alerts)]
pub struct Alert {
    pub id: i64,
    pub zone_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub alert_type: AlertType,
    pub status: AlertStatus,
    pub severity: i32,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
}

/// New alerts always start out active; status is not settable on insert.
#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = schema::alerts)]
pub struct NewAlert {
    pub zone_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub alert_type: AlertType,
    #[serde(default = "default_severity")]
    #[validate(range(min = 1, max = 5))]
    pub severity: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = schema::alerts)]
pub struct AlertChanges {
    pub zone_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub message: Option<String>,
    pub alert_type: Option<AlertType>,
    #[validate(range(min = 1, max = 5))]
    pub severity: Option<i32>,
}

impl AlertChanges {
    pub fn is_empty(&self) -> bool {
        self.zone_id.is_none()
            && self.title.is_none()
            && self.message.is_none()
            && self.alert_type.is_none()
            && self.severity.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::reports)]
pub struct Report {
    pub id: i64,
    pub title: String,
    pub report_type: ReportType,
    pub description: String,
    pub generated_by: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_usage: f64,
    pub efficiency_rate: f64,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::reports)]
pub struct NewReport {
    pub title: String,
    pub report_type: ReportType,
    pub description: String,
    pub generated_by: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_usage: f64,
    pub efficiency_rate: f64,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::system_settings)]
pub struct Settings {
    pub id: i32,
    pub organization_name: String,
    pub organization_email: String,
    pub organization_phone: String,
    pub system_version: String,
    pub database_size: String,
    pub api_endpoint: String,
    pub maintenance_mode: bool,
    pub last_backup: Option<DateTime<Utc>>,
    pub auto_backup_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::system_settings)]
pub struct NewSettings {
    pub id: i32,
    pub organization_name: String,
    pub organization_email: String,
    pub system_version: String,
    pub api_endpoint: String,
}

/// `system_version` and `database_size` are read-only from the API.
#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = schema::system_settings)]
pub struct SettingsChanges {
    #[validate(length(min = 1, max = 255))]
    pub organization_name: Option<String>,
    #[validate(email)]
    pub organization_email: Option<String>,
    #[validate(length(max = 20))]
    pub organization_phone: Option<String>,
    #[validate(url)]
    pub api_endpoint: Option<String>,
    pub maintenance_mode: Option<bool>,
    pub last_backup: Option<DateTime<Utc>>,
    pub auto_backup_enabled: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::activity_logs)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::activity_logs)]
pub struct NewActivityLogEntry {
    pub user_id: Option<i64>,
    pub action: String,
    pub description: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::compliance_records)]
pub struct ComplianceRecord {
    pub id: i64,
    pub category: String,
    pub description: String,
    pub status: ComplianceStatus,
    pub percentage: i32,
    pub last_checked: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize, Validate, Insertable)]
#[diesel(table_name = schema::compliance_records)]
pub struct NewComplianceRecord {
    #[validate(length(min = 1, max = 255))]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub status: ComplianceStatus,
    #[serde(default = "default_quality")]
    #[validate(range(min = 0, max = 100))]
    pub percentage: i32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = schema::compliance_records)]
pub struct ComplianceChanges {
    #[validate(length(min = 1, max = 255))]
    pub category: Option<String>,
    pub description: Option<String>,
    pub status: Option<ComplianceStatus>,
    #[validate(range(min = 0, max = 100))]
    pub percentage: Option<i32>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_usage_record_defaults_and_validation() {
        let rec: NewUsageRecord =
            serde_json::from_str(r#"{"zone_id": 3, "usage_liters": 12.5, "measured_at": "2026-03-01T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(rec.quality_pct, 100);
        assert!(!rec.is_peak);
        assert!(rec.validate().is_ok());

        let bad = NewUsageRecord {
            usage_liters: -1.0,
            quality_pct: 101,
            ..rec
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("usage_liters"));
        assert!(fields.contains_key("quality_pct"));
    }

    #[test]
    fn new_alert_rejects_out_of_range_severity() {
        let alert: NewAlert =
            serde_json::from_str(r#"{"title": "Leak", "alert_type": "error", "severity": 9}"#).unwrap();
        assert!(alert.validate().is_err());

        let ok: NewAlert = serde_json::from_str(r#"{"title": "Leak", "alert_type": "warning"}"#).unwrap();
        assert_eq!(ok.severity, 1);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn new_zone_requires_name() {
        let zone: NewZone = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(zone.validate().is_err());
        let zone: NewZone = serde_json::from_str(r#"{"name": "Building A"}"#).unwrap();
        assert!(zone.is_active);
        assert_eq!(zone.zone_type, ZoneType::Building);
    }

    #[test]
    fn full_name_falls_back_to_username() {
        let user = User {
            id: 1,
            username: "monitor".into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            token_hash: String::new(),
            is_active: true,
            date_joined: Utc::now(),
        };
        assert_eq!(user.full_name(), "monitor");
    }
}
