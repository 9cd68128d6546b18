use crate::api::auth::Actor;
use crate::api::handlers::user_names;
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::enums::ReportType;
use crate::db::models::Report;
use crate::error::{Error, Result};
use crate::schema;
use crate::services::activity::{self, actions};
use crate::services::aggregation::{self, MonthlyReport};
use crate::services::reports::{self, GenerateReport};
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub report_type_display: &'static str,
    pub generated_by_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    #[serde(rename = "type")]
    pub report_type: Option<ReportType>,
}

/// Newest first, optionally filtered by `type`.
pub async fn list_reports(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<ReportView>>> {
    let views = state
        .with_conn(move |conn| load_reports(conn, &params, filter.report_type))
        .await?;
    Ok(Json(views))
}

/// Same as the list, but `type` is mandatory.
pub async fn reports_by_type(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<ReportView>>> {
    let report_type = filter
        .report_type
        .ok_or_else(|| Error::Validation("type parameter required".to_string()))?;
    let views = state
        .with_conn(move |conn| load_reports(conn, &params, Some(report_type)))
        .await?;
    Ok(Json(views))
}

pub async fn get_report(State(state): State<AppState>, _actor: Actor, Path(id): Path<i64>) -> Result<Json<ReportView>> {
    let view = state
        .with_conn(move |conn| {
            let report = find_report(conn, id)?;
            single_view(conn, report)
        })
        .await?;
    Ok(Json(view))
}

/// Computes the usage snapshot for the requested range and stores it.
pub async fn generate_report(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(request): JsonBody<GenerateReport>,
) -> Result<(StatusCode, Json<ReportView>)> {
    request.validate()?;

    let view = state
        .with_conn(move |conn| {
            let report = reports::generate(conn, Some(actor.user.id), &request)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::REPORT_GENERATED,
                format!(
                    "Generated {} report '{}' for {} to {}",
                    report.report_type, report.title, report.start_date, report.end_date
                ),
            );
            single_view(conn, report)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn delete_report(State(state): State<AppState>, actor: Actor, Path(id): Path<i64>) -> Result<StatusCode> {
    state
        .with_conn(move |conn| {
            use schema::reports::dsl as R;

            let report = find_report(conn, id)?;
            diesel::delete(R::reports.find(id)).execute(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::REPORT_DELETED,
                format!("Deleted report '{}'", report.title),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Month-to-date summary, computed on the fly and not stored.
pub async fn monthly_report(State(state): State<AppState>, _actor: Actor) -> Result<Json<MonthlyReport>> {
    let report = state
        .with_conn(|conn| aggregation::monthly_report(conn, Utc::now()))
        .await?;
    Ok(Json(report))
}

fn load_reports(
    conn: &mut PgConnection,
    params: &ListParams,
    report_type: Option<ReportType>,
) -> Result<Vec<ReportView>> {
    use schema::reports::dsl as R;

    let mut query = R::reports.select(Report::as_select()).into_boxed();
    if let Some(report_type) = report_type {
        query = query.filter(R::report_type.eq(report_type));
    }
    if let Some(pattern) = params.pattern() {
        query = query.filter(R::title.ilike(pattern.clone()).or(R::description.ilike(pattern)));
    }
    let reports = query
        .order((R::created_at.desc(), R::id.desc()))
        .limit(params.limit())
        .offset(params.offset())
        .load(conn)?;
    views(conn, reports)
}

fn find_report(conn: &mut PgConnection, id: i64) -> Result<Report> {
    use schema::reports::dsl as R;

    R::reports
        .find(id)
        .select(Report::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("report {}", id)))
}

fn single_view(conn: &mut PgConnection, report: Report) -> Result<ReportView> {
    let id = report.id;
    views(conn, vec![report])?
        .pop()
        .ok_or_else(|| Error::NotFound(format!("report {}", id)))
}

fn views(conn: &mut PgConnection, reports: Vec<Report>) -> Result<Vec<ReportView>> {
    let authors = user_names(conn, reports.iter().filter_map(|r| r.generated_by))?;
    Ok(reports
        .into_iter()
        .map(|report| ReportView {
            report_type_display: report.report_type.label(),
            generated_by_name: report.generated_by.and_then(|id| authors.get(&id).cloned()),
            report,
        })
        .collect())
}
