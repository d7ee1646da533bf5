use crate::auth::auth::AuthUser;
use crate::tracking::reconciler::{self, ReconcileReport};
use crate::utils::time::local_now;
use actix_web::{HttpResponse, Responder, web};
use sqlx::SqlitePool;

/// Close every attendance record and work session left open before today
#[utoipa::path(
    post,
    path = "/api/admin/reconcile",
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn reconcile(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    tracing::info!(staff_id = auth.staff_id, "Manual reconciliation requested");
    let report = reconciler::reconcile(&pool, local_now()).await?;
    Ok(HttpResponse::Ok().json(report))
}
