use crate::db::enums::{AlertType, ComplianceStatus, ReportType, Role, ZoneType};
use crate::db::models::{NewAlert, NewComplianceRecord, NewUsageRecord, NewZone, Zone};
use crate::db::store::UsageStore;
use crate::schema;
use crate::services::accounts::{self, NewAccount};
use crate::services::ingest::insert_usage_records;
use crate::services::reports::{self, GenerateReport};
use crate::services::settings::{self, SettingsDefaults};
use chrono::{DateTime, Duration, DurationRound, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const SAMPLE_DAYS: i64 = 7;
const STEP_HOURS: i64 = 4;
const PEAK_HOURS: std::ops::RangeInclusive<i64> = 8..=18;

const USERS: [(&str, &str, &str, Role); 4] = [
    ("admin", "Admin", "User", Role::Admin),
    ("manager", "Maria", "Manager", Role::Manager),
    ("technician", "Tom", "Technician", Role::Technician),
    ("monitor", "Mona", "Monitor", Role::Monitor),
];

const ZONES: [(&str, &str, ZoneType); 5] = [
    ("Building A", "Main office building", ZoneType::Building),
    ("Building B", "Production facility", ZoneType::Building),
    ("Building C", "Warehouse and storage", ZoneType::Building),
    ("Outdoor Area", "Landscaping and outdoor facilities", ZoneType::Outdoor),
    ("Irrigation System", "Automated irrigation network", ZoneType::Irrigation),
];

/// Populate an empty database with a week of demo data. No-op once any zone exists.
pub fn run(conn: &mut PgConnection, defaults: &SettingsDefaults) -> Result<(), String> {
    use schema::zones::dsl as Z;

    let existing: i64 = Z::zones
        .count()
        .get_result(conn)
        .map_err(|e| format!("count zones failed: {}", e))?;
    if existing > 0 {
        info!("Sample data: {} zone(s) already present; skipping", existing);
        return Ok(());
    }

    let now = Utc::now();
    let admin_id = ensure_users(conn)?;
    let zones = insert_zones(conn)?;
    let readings = insert_usage(conn, &zones, now)?;
    let alerts = insert_alerts(conn, &zones, admin_id, now)?;
    let reports = insert_reports(conn, admin_id, now)?;
    settings::get_or_create_default(conn, defaults).map_err(|e| format!("settings init failed: {}", e))?;
    let compliance = insert_compliance(conn)?;

    info!(
        "Sample data: complete (zones={}, readings={}, alerts={}, reports={}, compliance={})",
        zones.len(),
        readings,
        alerts,
        reports,
        compliance
    );
    Ok(())
}

/// Create one account per role, skipping usernames that already exist. Returns the admin id.
fn ensure_users(conn: &mut PgConnection) -> Result<Option<i64>, String> {
    use schema::users::dsl as U;

    let mut admin_id = None;
    for (username, first_name, last_name, role) in USERS {
        let existing: Option<i64> = U::users
            .filter(U::username.eq(username))
            .select(U::id)
            .first(conn)
            .optional()
            .map_err(|e| format!("lookup user {} failed: {}", username, e))?;

        let id = match existing {
            Some(id) => id,
            None => {
                let account = NewAccount {
                    username: username.to_string(),
                    email: Some(format!("{}@watermanagement.com", username)),
                    first_name: Some(first_name.to_string()),
                    last_name: Some(last_name.to_string()),
                    role,
                };
                let registration = accounts::register_user(conn, &account, None)
                    .map_err(|e| format!("create user {} failed: {}", username, e))?;
                info!(
                    "Sample data: created {} '{}' with token {}",
                    role.label(),
                    username,
                    registration.token
                );
                registration.user.id
            }
        };
        if role == Role::Admin {
            admin_id = Some(id);
        }
    }
    Ok(admin_id)
}

fn insert_zones(conn: &mut PgConnection) -> Result<Vec<Zone>, String> {
    use schema::zones::dsl as Z;

    let rows: Vec<NewZone> = ZONES
        .iter()
        .map(|(name, description, zone_type)| NewZone {
            name: name.to_string(),
            description: description.to_string(),
            zone_type: *zone_type,
            is_active: true,
        })
        .collect();

    diesel::insert_into(Z::zones)
        .values(&rows)
        .returning(Zone::as_returning())
        .get_results(conn)
        .map_err(|e| format!("insert zones failed: {}", e))
}

fn insert_usage(conn: &mut PgConnection, zones: &[Zone], now: DateTime<Utc>) -> Result<usize, String> {
    let mut rng = SmallRng::seed_from_u64(0x5741_5445_5221_u64);
    let start = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    let mut inserted = 0;

    for day in 0..SAMPLE_DAYS {
        let mut batch = Vec::with_capacity(zones.len() * (24 / STEP_HOURS) as usize);
        for zone in zones {
            for hour in (0..24).step_by(STEP_HOURS as usize) {
                batch.push(sample_reading(zone.id, day, hour, start, &mut rng));
            }
        }
        inserted += insert_usage_records(conn, &batch)
            .map_err(|e| format!("insert usage for day {} failed: {}", day, e))?
            .len();
    }
    Ok(inserted)
}

/// Volume grows with age and hour of day, with a few percent of jitter.
fn sample_reading(zone_id: i64, day: i64, hour: i64, start: DateTime<Utc>, rng: &mut SmallRng) -> NewUsageRecord {
    let base = 50.0 + day as f64 * 10.0 + hour as f64 * 2.0;
    let jitter: f64 = rng.random_range(0.95..=1.05);
    NewUsageRecord {
        zone_id,
        usage_liters: (base * jitter * 100.0).round() / 100.0,
        measured_at: start - Duration::days(day) - Duration::hours(hour),
        is_peak: PEAK_HOURS.contains(&hour),
        quality_pct: 90 + (day % 3) as i32,
    }
}

fn insert_alerts(
    conn: &mut PgConnection,
    zones: &[Zone],
    admin_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<usize, String> {
    use schema::alerts::dsl as A;

    let specs = [
        (
            "High Water Usage",
            "Usage in Building A exceeded the daily threshold",
            AlertType::Warning,
            3,
            0,
        ),
        (
            "System Malfunction",
            "Irrigation controller is not responding",
            AlertType::Error,
            5,
            4,
        ),
        (
            "Maintenance Required",
            "Scheduled filter replacement in Building C",
            AlertType::Warning,
            2,
            2,
        ),
        (
            "Routine Maintenance",
            "Quarterly meter calibration completed in Building B",
            AlertType::Info,
            1,
            1,
        ),
    ];

    let rows: Vec<NewAlert> = specs
        .iter()
        .map(|(title, message, alert_type, severity, zone_index)| NewAlert {
            zone_id: zones.get(*zone_index).map(|z| z.id),
            title: title.to_string(),
            message: message.to_string(),
            alert_type: *alert_type,
            severity: *severity,
        })
        .collect();

    let ids: Vec<i64> = diesel::insert_into(A::alerts)
        .values(&rows)
        .returning(A::id)
        .get_results(conn)
        .map_err(|e| format!("insert alerts failed: {}", e))?;

    // the informational one has already been dealt with
    if let (Some(admin_id), Some(last)) = (admin_id, ids.last()) {
        conn.resolve_alert(*last, admin_id, now - Duration::hours(2))
            .map_err(|e| format!("resolve alert {} failed: {}", last, e))?;
    }
    Ok(ids.len())
}

fn insert_reports(conn: &mut PgConnection, admin_id: Option<i64>, now: DateTime<Utc>) -> Result<usize, String> {
    let end_date = now.date_naive();
    let start_date = end_date - Duration::days(30);
    let specs = [
        ("June Monthly Report", ReportType::Monthly, "Monthly water usage summary"),
        ("Q2 Quarterly Report", ReportType::Quarterly, "Quarterly consumption and efficiency review"),
        ("Leak Detection Report", ReportType::LeakDetection, "Leak detection sweep across all zones"),
    ];

    for (title, report_type, description) in specs {
        let request = GenerateReport {
            title: title.to_string(),
            report_type,
            description: description.to_string(),
            start_date,
            end_date,
            efficiency_rate: 92.5,
            data: None,
        };
        reports::generate(conn, admin_id, &request).map_err(|e| format!("generate report '{}' failed: {}", title, e))?;
    }
    Ok(specs.len())
}

fn insert_compliance(conn: &mut PgConnection) -> Result<usize, String> {
    use schema::compliance_records::dsl as C;

    let specs = [
        (
            "Usage Limits",
            "Daily consumption within permitted limits",
            ComplianceStatus::Pass,
            85,
        ),
        (
            "Quality Standards",
            "Water quality meets regulatory thresholds",
            ComplianceStatus::Pass,
            95,
        ),
        (
            "Maintenance Schedule",
            "All scheduled maintenance completed",
            ComplianceStatus::Pass,
            100,
        ),
        (
            "Peak Usage Monitoring",
            "Peak hour consumption above target",
            ComplianceStatus::Warning,
            75,
        ),
    ];

    let rows: Vec<NewComplianceRecord> = specs
        .iter()
        .map(|(category, description, status, percentage)| NewComplianceRecord {
            category: category.to_string(),
            description: description.to_string(),
            status: *status,
            percentage: *percentage,
            notes: String::new(),
        })
        .collect();

    diesel::insert_into(C::compliance_records)
        .values(&rows)
        .execute(conn)
        .map_err(|e| format!("insert compliance records failed: {}", e))
}
