use crate::auth::auth::AuthUser;
use crate::model::absence::{AbsenceStatus, AbsenceUpdate, NewAbsence, StaffAbsence};
use crate::tracking::absence;
use crate::utils::time::local_now;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AbsenceFilter {
    /// Another staff member's absences; supervisors and admins only
    pub staff_id: Option<i64>,
    /// Only absences ending on or after this day
    #[param(example = "2026-03-01")]
    pub from: Option<NaiveDate>,
    /// Only absences starting on or before this day
    #[param(example = "2026-03-31")]
    pub to: Option<NaiveDate>,
}

/* =========================
List absences
========================= */
#[utoipa::path(
    get,
    path = "/api/absences",
    params(AbsenceFilter),
    responses(
        (status = 200, description = "Absences, latest start first", body = [StaffAbsence]),
        (status = 400, description = "from is after to"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Listing other staff requires Supervisor/Admin")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn list_absences(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<AbsenceFilter>,
) -> actix_web::Result<impl Responder> {
    let staff_id = match query.staff_id {
        Some(id) if id != auth.staff_id => {
            auth.require_supervisor_or_admin()?;
            id
        }
        _ => auth.staff_id,
    };

    let rows = absence::list(&pool, staff_id, query.from, query.to).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/* =========================
Report absence
========================= */
#[utoipa::path(
    post,
    path = "/api/absences",
    request_body(content = NewAbsence, content_type = "application/json"),
    responses(
        (status = 201, description = "Absence reported", body = StaffAbsence),
        (status = 400, description = "date_start is after date_end"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps another absence")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn create_absence(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<NewAbsence>,
) -> actix_web::Result<impl Responder> {
    let created = absence::create(&pool, auth.staff_id, payload.into_inner(), local_now()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/api/absences/{id}",
    params(
        ("id" = i64, Path, description = "Absence id")
    ),
    request_body(content = AbsenceUpdate, content_type = "application/json"),
    responses(
        (status = 200, description = "Absence updated", body = StaffAbsence),
        (status = 400, description = "Invalid update"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Absence not found"),
        (status = 409, description = "Overlaps another absence")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn update_absence(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<AbsenceUpdate>,
) -> actix_web::Result<impl Responder> {
    let updated = absence::update(
        &pool,
        auth.staff_id,
        path.into_inner(),
        payload.into_inner(),
        local_now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/absences/{id}",
    params(
        ("id" = i64, Path, description = "Absence id")
    ),
    responses(
        (status = 204, description = "Absence withdrawn"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Absence not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn delete_absence(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    absence::delete(&pool, auth.staff_id, path.into_inner(), local_now()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/* =========================
Approve / reject (Supervisor/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/absences/{id}/approve",
    params(
        ("id" = i64, Path, description = "Absence id")
    ),
    responses(
        (status = 200, description = "Absence approved", body = StaffAbsence),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Supervisor/Admin only"),
        (status = 404, description = "Absence not found"),
        (status = 409, description = "Absence already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn approve_absence(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor_or_admin()?;

    let decided = absence::decide(&pool, path.into_inner(), AbsenceStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(decided))
}

#[utoipa::path(
    put,
    path = "/api/absences/{id}/reject",
    params(
        ("id" = i64, Path, description = "Absence id")
    ),
    responses(
        (status = 200, description = "Absence rejected", body = StaffAbsence),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Supervisor/Admin only"),
        (status = 404, description = "Absence not found"),
        (status = 409, description = "Absence already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn reject_absence(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor_or_admin()?;

    let decided = absence::decide(&pool, path.into_inner(), AbsenceStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(decided))
}
