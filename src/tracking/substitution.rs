//! Group substitutions and the double-booking rule.
//!
//! A substitute holds one substitution at a time: any existing substitution
//! whose dates share a day with the new one is a conflict. The same rule
//! applies from the group's side.

use crate::db::{Actor, lock_actor};
use crate::error::{AppError, AppResult};
use crate::identity;
use crate::model::substitution::{
    GroupSubstitution, NewSubstitution, SubstitutionFilter, SubstitutionUpdate,
};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

const SUBSTITUTION_COLUMNS: &str = "id, group_id, regular_staff_id, substitute_staff_id, \
                                    start_date, end_date, reason, created_at";

/// Substitutions held by `staff_id` that share a day with `[start, end]`.
pub async fn check_conflicts(
    conn: &mut SqliteConnection,
    staff_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<i64>,
) -> Result<Vec<GroupSubstitution>, sqlx::Error> {
    sqlx::query_as::<_, GroupSubstitution>(&format!(
        r#"
        SELECT {SUBSTITUTION_COLUMNS}
        FROM group_substitutions
        WHERE substitute_staff_id = ?
          AND start_date <= ? AND end_date >= ?
          AND (? IS NULL OR id != ?)
        ORDER BY start_date, id
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

/// Substitutions of `group_id` that share a day with `[start, end]`.
pub async fn check_group_conflicts(
    conn: &mut SqliteConnection,
    group_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<i64>,
) -> Result<Vec<GroupSubstitution>, sqlx::Error> {
    sqlx::query_as::<_, GroupSubstitution>(&format!(
        r#"
        SELECT {SUBSTITUTION_COLUMNS}
        FROM group_substitutions
        WHERE group_id = ?
          AND start_date <= ? AND end_date >= ?
          AND (? IS NULL OR id != ?)
        ORDER BY start_date, id
        "#
    ))
    .bind(group_id)
    .bind(end)
    .bind(start)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_all(conn)
    .await
}

fn validate_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::invalid("start_date cannot be after end_date"));
    }
    if start < today {
        return Err(AppError::invalid("start_date cannot be in the past"));
    }
    Ok(())
}

fn conflict_error(kind: &str, conflicts: &[GroupSubstitution]) -> AppError {
    let ids = conflicts
        .iter()
        .map(|c| format!("{} ({} to {})", c.id, c.start_date, c.end_date))
        .collect::<Vec<_>>()
        .join(", ");
    AppError::conflict(format!("{kind} overlaps existing substitution(s): {ids}"))
}

/// Both sides of the double-booking rule, inside the caller's transaction.
async fn ensure_no_conflicts(
    conn: &mut SqliteConnection,
    staff_id: i64,
    group_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<i64>,
) -> AppResult<()> {
    let staff_conflicts = check_conflicts(conn, staff_id, start, end, exclude_id).await?;
    if !staff_conflicts.is_empty() {
        return Err(conflict_error("Substitute", &staff_conflicts));
    }

    let group_conflicts = check_group_conflicts(conn, group_id, start, end, exclude_id).await?;
    if !group_conflicts.is_empty() {
        return Err(conflict_error("Group", &group_conflicts));
    }

    Ok(())
}

async fn ensure_references(
    conn: &mut SqliteConnection,
    group_id: i64,
    staff_ids: &[i64],
) -> AppResult<()> {
    if !identity::group_exists(&mut *conn, group_id).await? {
        return Err(AppError::not_found(format!("Group {group_id} not found")));
    }
    for &staff_id in staff_ids {
        if identity::find_staff(&mut *conn, staff_id).await?.is_none() {
            return Err(AppError::not_found(format!("Staff member {staff_id} not found")));
        }
    }
    Ok(())
}

pub async fn create(
    pool: &SqlitePool,
    input: NewSubstitution,
    now: NaiveDateTime,
) -> AppResult<GroupSubstitution> {
    validate_range(input.start_date, input.end_date, now.date())?;
    if input.regular_staff_id == Some(input.substitute_staff_id) {
        return Err(AppError::invalid("A staff member cannot substitute for themselves"));
    }

    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(input.substitute_staff_id), now).await?;
    lock_actor(&mut tx, Actor::Group(input.group_id), now).await?;

    let mut staff_ids = vec![input.substitute_staff_id];
    staff_ids.extend(input.regular_staff_id);
    ensure_references(&mut tx, input.group_id, &staff_ids).await?;

    ensure_no_conflicts(
        &mut tx,
        input.substitute_staff_id,
        input.group_id,
        input.start_date,
        input.end_date,
        None,
    )
    .await?;

    let created = sqlx::query_as::<_, GroupSubstitution>(&format!(
        r#"
        INSERT INTO group_substitutions
            (group_id, regular_staff_id, substitute_staff_id, start_date, end_date, reason, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {SUBSTITUTION_COLUMNS}
        "#
    ))
    .bind(input.group_id)
    .bind(input.regular_staff_id)
    .bind(input.substitute_staff_id)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(&input.reason)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        substitution_id = created.id,
        group_id = created.group_id,
        substitute_staff_id = created.substitute_staff_id,
        "Substitution created"
    );
    Ok(created)
}

async fn fetch(conn: &mut SqliteConnection, id: i64) -> AppResult<GroupSubstitution> {
    sqlx::query_as::<_, GroupSubstitution>(&format!(
        "SELECT {SUBSTITUTION_COLUMNS} FROM group_substitutions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::not_found("Substitution not found"))
}

pub async fn get(pool: &SqlitePool, id: i64) -> AppResult<GroupSubstitution> {
    let mut conn = pool.acquire().await?;
    fetch(&mut conn, id).await
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    patch: SubstitutionUpdate,
    now: NaiveDateTime,
) -> AppResult<GroupSubstitution> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Substitution(id), now).await?;

    let existing = fetch(&mut tx, id).await?;

    let group_id = patch.group_id.unwrap_or(existing.group_id);
    let substitute_staff_id = patch.substitute_staff_id.unwrap_or(existing.substitute_staff_id);
    let regular_staff_id = patch.regular_staff_id.unwrap_or(existing.regular_staff_id);
    let start_date = patch.start_date.unwrap_or(existing.start_date);
    let end_date = patch.end_date.unwrap_or(existing.end_date);
    let reason = patch.reason.unwrap_or(existing.reason);

    validate_range(start_date, end_date, now.date())?;
    if regular_staff_id == Some(substitute_staff_id) {
        return Err(AppError::invalid("A staff member cannot substitute for themselves"));
    }

    // The previous holder's and group's schedules change as well.
    for actor in [
        Actor::Staff(existing.substitute_staff_id),
        Actor::Staff(substitute_staff_id),
        Actor::Group(existing.group_id),
        Actor::Group(group_id),
    ] {
        lock_actor(&mut tx, actor, now).await?;
    }

    let mut staff_ids = vec![substitute_staff_id];
    staff_ids.extend(regular_staff_id);
    ensure_references(&mut tx, group_id, &staff_ids).await?;

    ensure_no_conflicts(&mut tx, substitute_staff_id, group_id, start_date, end_date, Some(id)).await?;

    let updated = sqlx::query_as::<_, GroupSubstitution>(&format!(
        r#"
        UPDATE group_substitutions
        SET group_id = ?, regular_staff_id = ?, substitute_staff_id = ?,
            start_date = ?, end_date = ?, reason = ?
        WHERE id = ?
        RETURNING {SUBSTITUTION_COLUMNS}
        "#
    ))
    .bind(group_id)
    .bind(regular_staff_id)
    .bind(substitute_staff_id)
    .bind(start_date)
    .bind(end_date)
    .bind(&reason)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Substitution not found"))?;

    tx.commit().await?;

    info!(substitution_id = id, "Substitution updated");
    Ok(updated)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM group_substitutions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Substitution not found"));
    }

    info!(substitution_id = id, "Substitution deleted");
    Ok(())
}

pub async fn list(pool: &SqlitePool, filter: &SubstitutionFilter) -> AppResult<Vec<GroupSubstitution>> {
    let rows = sqlx::query_as::<_, GroupSubstitution>(&format!(
        r#"
        SELECT {SUBSTITUTION_COLUMNS}
        FROM group_substitutions
        WHERE (? IS NULL OR group_id = ?)
          AND (? IS NULL OR substitute_staff_id = ?)
        ORDER BY start_date DESC, id DESC
        "#
    ))
    .bind(filter.group_id)
    .bind(filter.group_id)
    .bind(filter.staff_id)
    .bind(filter.staff_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Substitutions covering `date`.
pub async fn active_on(pool: &SqlitePool, date: NaiveDate) -> AppResult<Vec<GroupSubstitution>> {
    let rows = sqlx::query_as::<_, GroupSubstitution>(&format!(
        r#"
        SELECT {SUBSTITUTION_COLUMNS}
        FROM group_substitutions
        WHERE start_date <= ? AND end_date >= ?
        ORDER BY group_id, start_date
        "#
    ))
    .bind(date)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
