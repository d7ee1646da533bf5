//! Staff absence windows.
//!
//! A staff member's non-rejected absences never share a day. Only the staff
//! member may change or withdraw their own absence; supervisors decide on it.

use crate::db::{Actor, lock_actor};
use crate::error::{AppError, AppResult};
use crate::model::absence::{AbsenceStatus, AbsenceUpdate, NewAbsence, StaffAbsence};
use crate::utils::db_utils::{SqlUpdate, SqlValue};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

const ABSENCE_COLUMNS: &str =
    "id, staff_id, absence_type, date_start, date_end, status, note, created_at";

async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<StaffAbsence>, sqlx::Error> {
    sqlx::query_as::<_, StaffAbsence>(&format!(
        "SELECT {ABSENCE_COLUMNS} FROM staff_absences WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Absences of `staff_id` sharing a day with `[start, end]`. Rejected ones
/// never happened and do not count.
pub async fn overlapping(
    conn: &mut SqliteConnection,
    staff_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<i64>,
) -> Result<Vec<StaffAbsence>, sqlx::Error> {
    sqlx::query_as::<_, StaffAbsence>(&format!(
        r#"
        SELECT {ABSENCE_COLUMNS}
        FROM staff_absences
        WHERE staff_id = ?
          AND status != 'rejected'
          AND date_start <= ? AND date_end >= ?
          AND (? IS NULL OR id != ?)
        ORDER BY date_start
        "#
    ))
    .bind(staff_id)
    .bind(end)
    .bind(start)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_all(conn)
    .await
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::invalid("date_start cannot be after date_end"));
    }
    Ok(())
}

async fn ensure_no_overlap(
    conn: &mut SqliteConnection,
    staff_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<i64>,
) -> AppResult<()> {
    let clashes = overlapping(conn, staff_id, start, end, exclude_id).await?;
    if let Some(first) = clashes.first() {
        return Err(AppError::conflict(format!(
            "Absence overlaps existing absence {} ({} to {})",
            first.id, first.date_start, first.date_end
        )));
    }
    Ok(())
}

/// Load an absence and make sure `staff_id` owns it.
async fn owned(conn: &mut SqliteConnection, staff_id: i64, id: i64) -> AppResult<StaffAbsence> {
    let absence = find(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Absence not found"))?;

    if absence.staff_id != staff_id {
        return Err(AppError::forbidden("Only the owner may modify this absence"));
    }
    Ok(absence)
}

pub async fn create(
    pool: &SqlitePool,
    staff_id: i64,
    input: NewAbsence,
    now: NaiveDateTime,
) -> AppResult<StaffAbsence> {
    validate_range(input.date_start, input.date_end)?;

    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    ensure_no_overlap(&mut tx, staff_id, input.date_start, input.date_end, None).await?;

    let absence = sqlx::query_as::<_, StaffAbsence>(&format!(
        r#"
        INSERT INTO staff_absences (staff_id, absence_type, date_start, date_end, note, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {ABSENCE_COLUMNS}
        "#
    ))
    .bind(staff_id)
    .bind(input.absence_type)
    .bind(input.date_start)
    .bind(input.date_end)
    .bind(&input.note)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(staff_id, absence_id = absence.id, absence_type = %absence.absence_type, "Absence recorded");
    Ok(absence)
}

pub async fn update(
    pool: &SqlitePool,
    staff_id: i64,
    id: i64,
    patch: AbsenceUpdate,
    now: NaiveDateTime,
) -> AppResult<StaffAbsence> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    let existing = owned(&mut tx, staff_id, id).await?;

    let date_start = patch.date_start.unwrap_or(existing.date_start);
    let date_end = patch.date_end.unwrap_or(existing.date_end);
    validate_range(date_start, date_end)?;

    let mut update = SqlUpdate::new("staff_absences", "id");
    if let Some(absence_type) = patch.absence_type {
        update.set("absence_type", SqlValue::String(absence_type.to_string()));
    }
    if let Some(start) = patch.date_start {
        update.set("date_start", SqlValue::Date(start));
    }
    if let Some(end) = patch.date_end {
        update.set("date_end", SqlValue::Date(end));
    }
    if let Some(note) = patch.note {
        update.set("note", SqlValue::String(note));
    }

    if update.is_empty() {
        return Err(AppError::invalid("No fields provided for update"));
    }

    ensure_no_overlap(&mut tx, staff_id, date_start, date_end, Some(id)).await?;
    update.execute(&mut tx, id).await?;

    let updated = find(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Absence not found"))?;
    tx.commit().await?;

    info!(staff_id, absence_id = id, "Absence updated");
    Ok(updated)
}

pub async fn delete(pool: &SqlitePool, staff_id: i64, id: i64, now: NaiveDateTime) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    owned(&mut tx, staff_id, id).await?;

    sqlx::query("DELETE FROM staff_absences WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(staff_id, absence_id = id, "Absence deleted");
    Ok(())
}

/// Supervisor decision on a reported absence.
pub async fn decide(
    pool: &SqlitePool,
    id: i64,
    decision: AbsenceStatus,
) -> AppResult<StaffAbsence> {
    if decision == AbsenceStatus::Reported {
        return Err(AppError::invalid("Decision must be approved or rejected"));
    }

    let absence = sqlx::query_as::<_, StaffAbsence>(&format!(
        r#"
        UPDATE staff_absences
        SET status = ?
        WHERE id = ? AND status = 'reported'
        RETURNING {ABSENCE_COLUMNS}
        "#
    ))
    .bind(decision)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match absence {
        Some(absence) => {
            info!(absence_id = id, status = %decision, "Absence decided");
            Ok(absence)
        }
        None => {
            let mut conn = pool.acquire().await?;
            if find(&mut conn, id).await?.is_some() {
                Err(AppError::conflict("Absence already processed"))
            } else {
                Err(AppError::not_found("Absence not found"))
            }
        }
    }
}

/// Absences of one staff member, optionally limited to those touching `[from, to]`.
pub async fn list(
    pool: &SqlitePool,
    staff_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AppResult<Vec<StaffAbsence>> {
    if let (Some(from), Some(to)) = (from, to) {
        validate_range(from, to)?;
    }

    let rows = sqlx::query_as::<_, StaffAbsence>(&format!(
        r#"
        SELECT {ABSENCE_COLUMNS}
        FROM staff_absences
        WHERE staff_id = ?
          AND (? IS NULL OR date_end >= ?)
          AND (? IS NULL OR date_start <= ?)
        ORDER BY date_start DESC
        "#
    ))
    .bind(staff_id)
    .bind(from)
    .bind(from)
    .bind(to)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
