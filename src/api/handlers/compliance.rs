use crate::api::auth::Actor;
use crate::api::{AppState, JsonBody, ListParams};
use crate::db::models::{ComplianceChanges, ComplianceRecord, NewComplianceRecord};
use crate::error::{Error, Result};
use crate::schema;
use crate::services::activity::{self, actions};
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use validator::Validate;

/// Ordered by category.
pub async fn list_compliance(
    State(state): State<AppState>,
    _actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ComplianceRecord>>> {
    let records = state
        .with_conn(move |conn| {
            use schema::compliance_records::dsl as C;

            let mut query = C::compliance_records
                .select(ComplianceRecord::as_select())
                .into_boxed();
            if let Some(pattern) = params.pattern() {
                query = query.filter(C::category.ilike(pattern.clone()).or(C::description.ilike(pattern)));
            }
            Ok(query
                .order((C::category.asc(), C::id.asc()))
                .limit(params.limit())
                .offset(params.offset())
                .load(conn)?)
        })
        .await?;
    Ok(Json(records))
}

pub async fn get_compliance(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<ComplianceRecord>> {
    let record = state.with_conn(move |conn| find_record(conn, id)).await?;
    Ok(Json(record))
}

pub async fn create_compliance(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(request): JsonBody<NewComplianceRecord>,
) -> Result<(StatusCode, Json<ComplianceRecord>)> {
    request.validate()?;

    let record = state
        .with_conn(move |conn| {
            use schema::compliance_records::dsl as C;

            let record = diesel::insert_into(C::compliance_records)
                .values(&request)
                .returning(ComplianceRecord::as_returning())
                .get_result(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::COMPLIANCE_CREATED,
                format!("Added compliance check '{}' ({})", record.category, record.status),
            );
            Ok(record)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Every update counts as a fresh check and bumps `last_checked`.
pub async fn update_compliance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    JsonBody(changes): JsonBody<ComplianceChanges>,
) -> Result<Json<ComplianceRecord>> {
    changes.validate()?;

    let record = state
        .with_conn(move |conn| {
            use schema::compliance_records::dsl as C;

            let record: ComplianceRecord = diesel::update(C::compliance_records.find(id))
                .set((&changes, C::last_checked.eq(Utc::now())))
                .returning(ComplianceRecord::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| Error::NotFound(format!("compliance record {}", id)))?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::COMPLIANCE_UPDATED,
                format!(
                    "Updated compliance check '{}' ({}, {}%)",
                    record.category, record.status, record.percentage
                ),
            );
            Ok(record)
        })
        .await?;
    Ok(Json(record))
}

pub async fn delete_compliance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state
        .with_conn(move |conn| {
            use schema::compliance_records::dsl as C;

            let record = find_record(conn, id)?;
            diesel::delete(C::compliance_records.find(id)).execute(conn)?;
            activity::record_or_warn(
                conn,
                &actor.origin(),
                actions::COMPLIANCE_DELETED,
                format!("Removed compliance check '{}'", record.category),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn find_record(conn: &mut PgConnection, id: i64) -> Result<ComplianceRecord> {
    use schema::compliance_records::dsl as C;

    C::compliance_records
        .find(id)
        .select(ComplianceRecord::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("compliance record {}", id)))
}
