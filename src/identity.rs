//! Identity seam: who is scanning, who is acting, and what they may touch.
//!
//! Read-only lookups against the directory tables. Provisioning of students,
//! staff and devices happens elsewhere.

use crate::auth::password::verify_secret;
use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::model::student::Student;
use crate::utils::device_cache;
use chrono::NaiveDate;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

#[derive(Debug, Clone, FromRow)]
pub struct StaffIdentity {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub role: i64,
    pub pin_hash: Option<String>,
    pub is_active: bool,
}

impl StaffIdentity {
    pub fn role(&self) -> Option<Role> {
        u8::try_from(self.role).ok().and_then(Role::from_id)
    }
}

pub async fn find_student_by_rfid(pool: &SqlitePool, rfid: &str) -> AppResult<Student> {
    let rfid = rfid.trim();
    if rfid.is_empty() {
        return Err(AppError::invalid("RFID tag must not be empty"));
    }

    sqlx::query_as::<_, Student>(
        r#"
        SELECT id, first_name, last_name, group_id
        FROM students
        WHERE rfid_tag = ?
        "#,
    )
    .bind(rfid)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("RFID tag not registered"))
}

/// True when the staff member supervises the group or substitutes for it on `today`.
pub async fn staff_can_access_group(
    pool: &SqlitePool,
    staff_id: i64,
    group_id: i64,
    today: NaiveDate,
) -> AppResult<bool> {
    let allowed = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM group_supervisors WHERE group_id = ? AND staff_id = ?
        ) OR EXISTS(
            SELECT 1 FROM group_substitutions
            WHERE group_id = ? AND substitute_staff_id = ?
              AND start_date <= ? AND end_date >= ?
        )
        "#,
    )
    .bind(group_id)
    .bind(staff_id)
    .bind(group_id)
    .bind(staff_id)
    .bind(today)
    .bind(today)
    .fetch_one(pool)
    .await?;

    Ok(allowed)
}

pub async fn find_staff(conn: &mut SqliteConnection, staff_id: i64) -> AppResult<Option<StaffIdentity>> {
    let staff = sqlx::query_as::<_, StaffIdentity>(
        r#"
        SELECT id, first_name, last_name, role, pin_hash, is_active
        FROM staff
        WHERE id = ?
        "#,
    )
    .bind(staff_id)
    .fetch_optional(conn)
    .await?;

    Ok(staff)
}

pub async fn group_exists(conn: &mut SqliteConnection, group_id: i64) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?)")
        .bind(group_id)
        .fetch_one(conn)
        .await?;
    Ok(exists)
}

/// Resolve a device API key to its device id.
pub async fn authenticate_device(pool: &SqlitePool, api_key: &str) -> AppResult<i64> {
    if let Some(device_id) = device_cache::cached_device(api_key).await {
        // A cached key stays valid only while its device is active.
        let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM devices WHERE id = ?")
            .bind(device_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or(false);
        if active {
            return Ok(device_id);
        }
        device_cache::forget(api_key).await;
        info!(device_id, "Rejected key of a deactivated device");
        return Err(AppError::Unauthorized("Invalid device API key".to_string()));
    }

    // Keys are salted hashes, so the candidate has to be checked against
    // every active device. A centre runs a handful of them.
    let devices = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, api_key_hash FROM devices WHERE is_active = 1",
    )
    .fetch_all(pool)
    .await?;

    for (device_id, hash) in devices {
        if verify_secret(api_key, &hash).is_ok() {
            debug!(device_id, "Device key verified");
            device_cache::remember(api_key, device_id).await;
            return Ok(device_id);
        }
    }

    info!("Rejected unknown device key");
    Err(AppError::Unauthorized("Invalid device API key".to_string()))
}

/// Check a staff member's PIN as entered on a device.
pub async fn authenticate_staff_pin(
    pool: &SqlitePool,
    staff_id: i64,
    pin: &str,
) -> AppResult<StaffIdentity> {
    let mut conn = pool.acquire().await?;
    let staff = find_staff(&mut conn, staff_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::Unauthorized("Invalid staff credentials".to_string()))?;

    let hash = staff
        .pin_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Staff member has no PIN".to_string()))?;

    if verify_secret(pin, hash).is_err() {
        info!(staff_id, "Rejected staff PIN");
        return Err(AppError::Unauthorized("Invalid staff credentials".to_string()));
    }

    Ok(staff)
}
