use crate::auth::auth::AuthUser;
use crate::auth::device::DeviceUser;
use crate::error::AppError;
use crate::identity;
use crate::model::attendance::{AttendanceRecord, ToggleAction};
use crate::model::role::Role;
use crate::model::student::Student;
use crate::tracking::attendance::{self, AttendanceStatusView};
use crate::utils::time::local_now;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

/// Second step of the terminal's two-step scan flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanDecision {
    #[default]
    Confirm,
    Cancel,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleRequest {
    #[schema(example = "04A2B91C")]
    pub rfid: String,
    #[serde(default)]
    pub action: ScanDecision,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub action: ToggleAction,
    pub student: Option<Student>,
    pub attendance: Option<AttendanceRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentStatusResponse {
    pub student: Student,
    pub attendance: AttendanceStatusView,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Day to list, defaults to today
    #[param(example = "2026-02-02")]
    pub date: Option<NaiveDate>,
    /// Restrict to one group
    pub group_id: Option<i64>,
}

/// Admins may act on any group; everyone else needs supervision or a
/// substitution covering `today`.
async fn ensure_group_access(
    pool: &SqlitePool,
    device: &DeviceUser,
    group_id: i64,
    today: NaiveDate,
) -> Result<(), AppError> {
    if device.staff.role() == Some(Role::Admin) {
        return Ok(());
    }
    if identity::staff_can_access_group(pool, device.staff.id, group_id, today).await? {
        Ok(())
    } else {
        tracing::info!(staff_id = device.staff.id, group_id, "Group access denied");
        Err(AppError::forbidden("No access to this student's group"))
    }
}

/// Current attendance status of the student behind an RFID tag
#[utoipa::path(
    get,
    path = "/api/attendance/status/{rfid}",
    params(
        ("rfid" = String, Path, description = "RFID tag of the student")
    ),
    responses(
        (status = 200, description = "Status of today", body = StudentStatusResponse),
        (status = 401, description = "Invalid device or staff credentials"),
        (status = 403, description = "No access to the student's group"),
        (status = 404, description = "RFID tag not registered")
    ),
    security(
        ("device_key" = [])
    ),
    tag = "Attendance"
)]
pub async fn status(
    device: DeviceUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let today = local_now().date();
    let student = identity::find_student_by_rfid(&pool, &path).await?;
    ensure_group_access(&pool, &device, student.group_id, today).await?;

    let attendance = attendance::get_status(&pool, student.id, today).await?;

    Ok(HttpResponse::Ok().json(StudentStatusResponse {
        student,
        attendance,
    }))
}

/// Check a student in or out
#[utoipa::path(
    post,
    path = "/api/attendance/toggle",
    request_body(
        content = ToggleRequest,
        description = "Scanned tag and the operator's decision",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Toggled, or cancelled without change", body = ToggleResponse),
        (status = 400, description = "Empty RFID tag"),
        (status = 401, description = "Invalid device or staff credentials"),
        (status = 403, description = "No access to the student's group"),
        (status = 404, description = "RFID tag not registered"),
        (status = 409, description = "Concurrent toggle for the same student")
    ),
    security(
        ("device_key" = [])
    ),
    tag = "Attendance"
)]
pub async fn toggle(
    device: DeviceUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<ToggleRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    if payload.action == ScanDecision::Cancel {
        tracing::debug!(device_id = device.device_id, "Scan cancelled on device");
        return Ok(HttpResponse::Ok().json(ToggleResponse {
            action: ToggleAction::Cancelled,
            student: None,
            attendance: None,
        }));
    }

    let now = local_now();
    let student = identity::find_student_by_rfid(&pool, &payload.rfid).await?;
    ensure_group_access(&pool, &device, student.group_id, now.date()).await?;

    let outcome = attendance::toggle(
        &pool,
        student.id,
        device.staff.id,
        Some(device.device_id),
        now,
    )
    .await?;

    Ok(HttpResponse::Ok().json(ToggleResponse {
        action: outcome.action,
        student: Some(student),
        attendance: Some(outcome.record),
    }))
}

/// Attendance records of one day
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Records of the day", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Supervisor/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn daily(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<DailyQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor_or_admin()?;

    let date = query.date.unwrap_or_else(|| local_now().date());
    let records = attendance::list_for_day(&pool, date, query.group_id).await?;

    Ok(HttpResponse::Ok().json(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::device::{DEVICE_KEY_HEADER, STAFF_ID_HEADER, STAFF_PIN_HEADER};
    use crate::auth::password::hash_secret;
    use crate::db::{fixtures, test_pool};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    const DEVICE_KEY: &str = "terminal-key-entrance";
    const PIN: &str = "4711";

    async fn provision(pool: &SqlitePool, staff_id: i64) {
        sqlx::query("INSERT INTO devices (device_code, api_key_hash) VALUES ('entrance', ?)")
            .bind(hash_secret(DEVICE_KEY).unwrap())
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("UPDATE staff SET pin_hash = ? WHERE id = ?")
            .bind(hash_secret(PIN).unwrap())
            .bind(staff_id)
            .execute(pool)
            .await
            .unwrap();
    }

    fn scan(staff_id: i64, pin: &str, body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/attendance/toggle")
            .peer_addr("127.0.0.1:4000".parse().unwrap())
            .insert_header((DEVICE_KEY_HEADER, DEVICE_KEY))
            .insert_header((STAFF_ID_HEADER, staff_id.to_string()))
            .insert_header((STAFF_PIN_HEADER, pin))
            .set_json(body)
    }

    #[actix_web::test]
    async fn supervisor_toggles_student_through_device() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Foxes").await;
        let staff = fixtures::staff(&pool, "Sara").await;
        fixtures::student(&pool, group, "04A2B91C").await;
        fixtures::supervise(&pool, group, staff).await;
        provision(&pool, staff).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .route("/attendance/toggle", web::post().to(toggle)),
        )
        .await;

        let body = serde_json::json!({ "rfid": "04A2B91C", "action": "confirm" });
        let resp = test::call_service(&app, scan(staff, PIN, body.clone()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["action"], "checked_in");
        assert_eq!(json["attendance"]["checked_in_by"], staff);

        let resp = test::call_service(&app, scan(staff, PIN, body).to_request()).await;
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["action"], "checked_out");
    }

    #[actix_web::test]
    async fn cancel_changes_nothing() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Bees").await;
        let staff = fixtures::staff(&pool, "Ole").await;
        fixtures::student(&pool, group, "TAG-9").await;
        fixtures::supervise(&pool, group, staff).await;
        provision(&pool, staff).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .route("/attendance/toggle", web::post().to(toggle)),
        )
        .await;

        let body = serde_json::json!({ "rfid": "TAG-9", "action": "cancel" });
        let resp = test::call_service(&app, scan(staff, PIN, body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["action"], "cancelled");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[actix_web::test]
    async fn staff_without_group_access_is_forbidden() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Moles").await;
        let staff = fixtures::staff(&pool, "Per").await;
        fixtures::student(&pool, group, "TAG-3").await;
        provision(&pool, staff).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .route("/attendance/toggle", web::post().to(toggle)),
        )
        .await;

        let body = serde_json::json!({ "rfid": "TAG-3", "action": "confirm" });
        let resp = test::call_service(&app, scan(staff, PIN, body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[actix_web::test]
    async fn wrong_pin_and_unknown_tag_map_to_their_statuses() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Frogs").await;
        let staff = fixtures::staff(&pool, "Ina").await;
        fixtures::supervise(&pool, group, staff).await;
        provision(&pool, staff).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .route("/attendance/toggle", web::post().to(toggle)),
        )
        .await;

        let body = serde_json::json!({ "rfid": "NOPE", "action": "confirm" });
        let resp = test::call_service(&app, scan(staff, "0000", body.clone()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(&app, scan(staff, PIN, body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
