use crate::auth::auth::AuthUser;
use crate::model::substitution::{
    GroupSubstitution, NewSubstitution, SubstitutionFilter, SubstitutionUpdate,
};
use crate::tracking::substitution;
use crate::utils::time::local_now;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActiveQuery {
    /// Defaults to today
    #[param(example = "2026-02-06")]
    pub date: Option<NaiveDate>,
}

#[utoipa::path(
    get,
    path = "/api/substitutions",
    params(SubstitutionFilter),
    responses(
        (status = 200, description = "Substitutions, latest start first", body = [GroupSubstitution]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Substitutions"
)]
pub async fn list_substitutions(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<SubstitutionFilter>,
) -> actix_web::Result<impl Responder> {
    let rows = substitution::list(&pool, &query).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/substitutions",
    request_body(content = NewSubstitution, content_type = "application/json"),
    responses(
        (status = 201, description = "Substitution created", body = GroupSubstitution),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Supervisor/Admin only"),
        (status = 404, description = "Unknown group or staff member"),
        (status = 409, description = "Overlaps an existing substitution")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Substitutions"
)]
pub async fn create_substitution(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<NewSubstitution>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor_or_admin()?;

    let created = substitution::create(&pool, payload.into_inner(), local_now()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/api/substitutions/active",
    params(ActiveQuery),
    responses(
        (status = 200, description = "Substitutions covering the day", body = [GroupSubstitution]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Substitutions"
)]
pub async fn active_substitutions(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<ActiveQuery>,
) -> actix_web::Result<impl Responder> {
    let date = query.date.unwrap_or_else(|| local_now().date());
    let rows = substitution::active_on(&pool, date).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/substitutions/{id}",
    params(
        ("id" = i64, Path, description = "Substitution id")
    ),
    responses(
        (status = 200, description = "Substitution", body = GroupSubstitution),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Substitution not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Substitutions"
)]
pub async fn get_substitution(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let found = substitution::get(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    put,
    path = "/api/substitutions/{id}",
    params(
        ("id" = i64, Path, description = "Substitution id")
    ),
    request_body(content = SubstitutionUpdate, content_type = "application/json"),
    responses(
        (status = 200, description = "Substitution updated", body = GroupSubstitution),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Supervisor/Admin only"),
        (status = 404, description = "Substitution not found"),
        (status = 409, description = "Overlaps an existing substitution")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Substitutions"
)]
pub async fn update_substitution(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<SubstitutionUpdate>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor_or_admin()?;

    let updated =
        substitution::update(&pool, path.into_inner(), payload.into_inner(), local_now()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/substitutions/{id}",
    params(
        ("id" = i64, Path, description = "Substitution id")
    ),
    responses(
        (status = 204, description = "Substitution deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Supervisor/Admin only"),
        (status = 404, description = "Substitution not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Substitutions"
)]
pub async fn delete_substitution(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor_or_admin()?;

    substitution::delete(&pool, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
