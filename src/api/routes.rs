use crate::api::AppState;
use crate::api::handlers::{
    self, activity, alerts, compliance, dashboard, profiles, reports, settings, usage, users, zones,
};
use crate::error::Error;
use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use log::{info, warn};
use std::time::Instant;
use tower_http::cors::CorsLayer;

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Users and profiles
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/profiles", get(profiles::list_profiles))
        .route("/profiles/me", get(profiles::my_profile).put(profiles::update_my_profile))
        .route("/profiles/:id", get(profiles::get_profile).put(profiles::update_profile))
        // Zones
        .route("/zones", get(zones::list_zones).post(zones::create_zone))
        .route(
            "/zones/:id",
            get(zones::get_zone).put(zones::update_zone).delete(zones::delete_zone),
        )
        .route("/zones/:id/usage-stats", get(zones::zone_usage_stats))
        // Usage readings
        .route("/usage", get(usage::list_usage).post(usage::create_usage))
        .route("/usage/trend", get(usage::usage_trend))
        .route("/usage/:id", get(usage::get_usage).delete(usage::delete_usage))
        // Alerts
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/active", get(alerts::active_alerts))
        .route("/alerts/count", get(alerts::alert_counts))
        .route(
            "/alerts/:id",
            get(alerts::get_alert).put(alerts::update_alert).delete(alerts::delete_alert),
        )
        .route("/alerts/:id/resolve", post(alerts::resolve_alert))
        // Reports
        .route("/reports", get(reports::list_reports).post(reports::generate_report))
        .route("/reports/by-type", get(reports::reports_by_type))
        .route("/reports/monthly", get(reports::monthly_report))
        .route("/reports/:id", get(reports::get_report).delete(reports::delete_report))
        // Settings, activity and compliance
        .route(
            "/settings/current",
            get(settings::current_settings).put(settings::update_settings),
        )
        .route("/activity", get(activity::list_activity))
        .route("/activity/:id", get(activity::get_activity))
        .route(
            "/compliance",
            get(compliance::list_compliance).post(compliance::create_compliance),
        )
        .route(
            "/compliance/:id",
            get(compliance::get_compliance)
                .put(compliance::update_compliance)
                .delete(compliance::delete_compliance),
        )
        // Dashboard
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/dashboard/top-zones", get(dashboard::top_zones))
        .route("/dashboard/activity", get(dashboard::recent_activity));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
}

async fn not_found(request: Request) -> Error {
    Error::NotFound(format!("route {} {}", request.method(), request.uri().path()))
}

/// One log line per request with status and latency.
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();
    if status.is_server_error() {
        warn!("{} {} -> {} ({:.1} ms)", method, path, status.as_u16(), elapsed_ms);
    } else {
        info!("{} {} -> {} ({:.1} ms)", method, path, status.as_u16(), elapsed_ms);
    }
    response
}
