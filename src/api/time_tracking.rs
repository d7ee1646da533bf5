use crate::auth::auth::AuthUser;
use crate::model::work_session::{
    SessionEdit, SessionResponse, SessionStatus, SessionUpdate, WorkSession, WorkSessionBreak,
};
use crate::tracking::work_session;
use crate::utils::time::local_now;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// History window when the caller gives no `from`.
const DEFAULT_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[serde(default = "default_status")]
    pub status: SessionStatus,
}

fn default_status() -> SessionStatus {
    SessionStatus::Present
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// First day, inclusive. Defaults to 30 days before `to`
    #[param(example = "2026-02-01")]
    pub from: Option<NaiveDate>,
    /// Last day, inclusive. Defaults to today
    #[param(example = "2026-02-28")]
    pub to: Option<NaiveDate>,
}

/// Start today's work session
#[utoipa::path(
    post,
    path = "/api/time-tracking/check-in",
    request_body(content = CheckInRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Checked in", body = WorkSession),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    let session = work_session::check_in(&pool, auth.staff_id, payload.status, local_now()).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// Close the open work session
#[utoipa::path(
    post,
    path = "/api/time-tracking/check-out",
    responses(
        (status = 200, description = "Checked out", body = SessionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No open session")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let response = work_session::check_out(&pool, auth.staff_id, local_now()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    post,
    path = "/api/time-tracking/break/start",
    responses(
        (status = 200, description = "Break started", body = WorkSessionBreak),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No open session"),
        (status = 409, description = "Break already active")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn start_break(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let started = work_session::start_break(&pool, auth.staff_id, local_now()).await?;
    Ok(HttpResponse::Ok().json(started))
}

#[utoipa::path(
    post,
    path = "/api/time-tracking/break/end",
    responses(
        (status = 200, description = "Break ended", body = SessionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No active break found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn end_break(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let response = work_session::end_break(&pool, auth.staff_id, local_now()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Edit status, notes, planned duration or closed break durations
#[utoipa::path(
    put,
    path = "/api/time-tracking/{session_id}",
    params(
        ("session_id" = i64, Path, description = "Work session id")
    ),
    request_body(content = SessionUpdate, content_type = "application/json"),
    responses(
        (status = 200, description = "Session updated", body = SessionResponse),
        (status = 400, description = "Invalid update"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Session not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn update_session(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<SessionUpdate>,
) -> actix_web::Result<impl Responder> {
    let response = work_session::update_session(
        &pool,
        auth.staff_id,
        path.into_inner(),
        payload.into_inner(),
        local_now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/time-tracking/{session_id}/edits",
    params(
        ("session_id" = i64, Path, description = "Work session id")
    ),
    responses(
        (status = 200, description = "Edit log, oldest first", body = [SessionEdit]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Session not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn edit_log(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let edits = work_session::get_edit_log(&pool, auth.staff_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(edits))
}

#[utoipa::path(
    get,
    path = "/api/time-tracking/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Sessions, newest first", body = [SessionResponse]),
        (status = 400, description = "from is after to"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let to = query.to.unwrap_or_else(|| local_now().date());
    let from = query
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_HISTORY_DAYS));

    let sessions = work_session::get_history(&pool, auth.staff_id, from, to).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

/// Today's open session, or `null`
#[utoipa::path(
    get,
    path = "/api/time-tracking/current",
    responses(
        (status = 200, description = "Open session of today", body = SessionResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn current(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let session =
        work_session::get_current_session(&pool, auth.staff_id, local_now().date()).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// Staff id to status for everyone checked in today
#[utoipa::path(
    get,
    path = "/api/time-tracking/presence-map",
    responses(
        (status = 200, description = "Presence of today", body = Object,
         example = json!({ "5": "present", "9": "home_office" })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Time tracking"
)]
pub async fn presence_map(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    let map: BTreeMap<i64, SessionStatus> =
        work_session::get_today_presence_map(&pool, local_now().date()).await?;
    Ok(HttpResponse::Ok().json(map))
}
