//! Staff work sessions and their breaks.
//!
//! Per staff member: `no session -> open -> on break -> open -> closed`.
//! Every mutation runs in one transaction that starts by taking the staff
//! member's actor lock; the partial unique indexes on open sessions and open
//! breaks back that up in the store.

use crate::db::{Actor, lock_actor};
use crate::error::{AppError, AppResult};
use crate::model::work_session::{
    SessionEdit, SessionResponse, SessionStatus, SessionUpdate, WorkSession, WorkSessionBreak,
};
use crate::tracking::reconciler::stale_close_time;
use crate::utils::db_utils::{SqlUpdate, SqlValue};
use crate::utils::time::{start_of_day, start_of_next_day};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const SESSION_COLUMNS: &str = "id, staff_id, status, check_in, check_out, planned_duration_minutes, \
                               notes, auto_closed, created_at, updated_at";
const BREAK_COLUMNS: &str = "id, session_id, start_time, end_time, duration_minutes";

async fn find_session(
    conn: &mut SqliteConnection,
    session_id: i64,
) -> Result<Option<WorkSession>, sqlx::Error> {
    sqlx::query_as::<_, WorkSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM work_sessions WHERE id = ?"
    ))
    .bind(session_id)
    .fetch_optional(conn)
    .await
}

pub(crate) async fn open_session(
    conn: &mut SqliteConnection,
    staff_id: i64,
) -> Result<Option<WorkSession>, sqlx::Error> {
    sqlx::query_as::<_, WorkSession>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM work_sessions
        WHERE staff_id = ? AND check_out IS NULL
        ORDER BY check_in DESC
        LIMIT 1
        "#
    ))
    .bind(staff_id)
    .fetch_optional(conn)
    .await
}

async fn open_break(
    conn: &mut SqliteConnection,
    session_id: i64,
) -> Result<Option<WorkSessionBreak>, sqlx::Error> {
    sqlx::query_as::<_, WorkSessionBreak>(&format!(
        "SELECT {BREAK_COLUMNS} FROM work_session_breaks WHERE session_id = ? AND end_time IS NULL"
    ))
    .bind(session_id)
    .fetch_optional(conn)
    .await
}

async fn breaks_for(
    conn: &mut SqliteConnection,
    session_id: i64,
) -> Result<Vec<WorkSessionBreak>, sqlx::Error> {
    sqlx::query_as::<_, WorkSessionBreak>(&format!(
        "SELECT {BREAK_COLUMNS} FROM work_session_breaks WHERE session_id = ? ORDER BY start_time, id"
    ))
    .bind(session_id)
    .fetch_all(conn)
    .await
}

async fn load_response(
    conn: &mut SqliteConnection,
    session: WorkSession,
) -> Result<SessionResponse, sqlx::Error> {
    let breaks = breaks_for(conn, session.id).await?;
    Ok(SessionResponse::new(session, breaks))
}

async fn close_break(
    conn: &mut SqliteConnection,
    brk: &WorkSessionBreak,
    end: NaiveDateTime,
) -> Result<WorkSessionBreak, sqlx::Error> {
    let end = end.max(brk.start_time);
    let minutes = (end - brk.start_time).num_minutes();

    sqlx::query_as::<_, WorkSessionBreak>(&format!(
        r#"
        UPDATE work_session_breaks
        SET end_time = ?, duration_minutes = ?
        WHERE id = ? AND end_time IS NULL
        RETURNING {BREAK_COLUMNS}
        "#
    ))
    .bind(end)
    .bind(minutes)
    .bind(brk.id)
    .fetch_one(conn)
    .await
}

/// A session closed by [`close_session`] and whether an open break went with it.
pub(crate) struct ClosedSession {
    pub session: WorkSession,
    pub closed_break: bool,
}

/// Close a session at `close_at`, ending an open break first so no break
/// outlives its session. A break that started after `close_at` (bad clock
/// data) pushes the close time to the break's start.
pub(crate) async fn close_session(
    conn: &mut SqliteConnection,
    session: &WorkSession,
    close_at: NaiveDateTime,
    auto_closed: bool,
    now: NaiveDateTime,
) -> Result<ClosedSession, sqlx::Error> {
    let mut close_at = close_at.max(session.check_in);
    let mut closed_break = false;

    if let Some(brk) = open_break(conn, session.id).await? {
        close_at = close_at.max(brk.start_time);
        close_break(conn, &brk, close_at).await?;
        closed_break = true;
    }

    let session = sqlx::query_as::<_, WorkSession>(&format!(
        r#"
        UPDATE work_sessions
        SET check_out = ?, auto_closed = ?, updated_at = ?
        WHERE id = ? AND check_out IS NULL
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(close_at)
    .bind(auto_closed)
    .bind(now)
    .bind(session.id)
    .fetch_one(conn)
    .await?;

    Ok(ClosedSession {
        session,
        closed_break,
    })
}

/// The staff member's open session if it was started today.
///
/// A session still open from an earlier day is a missed check-out: it is
/// closed with the end-of-day policy inside the caller's transaction and
/// does not count as open.
async fn open_session_today(
    conn: &mut SqliteConnection,
    staff_id: i64,
    now: NaiveDateTime,
) -> Result<Option<WorkSession>, sqlx::Error> {
    let Some(open) = open_session(conn, staff_id).await? else {
        return Ok(None);
    };
    if open.check_in >= start_of_day(now.date()) {
        return Ok(Some(open));
    }

    let close_at = stale_close_time(open.check_in.date(), open.check_in);
    close_session(conn, &open, close_at, true, now).await?;
    warn!(
        staff_id,
        session_id = open.id,
        %close_at,
        "Closed session left open on an earlier day"
    );
    Ok(None)
}

/// Commits whatever stale cleanup happened, then reports the missing session.
async fn no_open_session<T>(tx: Transaction<'_, Sqlite>) -> AppResult<T> {
    tx.commit().await?;
    Err(AppError::not_found("No open session found"))
}

pub async fn check_in(
    pool: &SqlitePool,
    staff_id: i64,
    status: SessionStatus,
    now: NaiveDateTime,
) -> AppResult<WorkSession> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    if open_session_today(&mut tx, staff_id, now).await?.is_some() {
        return Err(AppError::conflict("Already checked in today"));
    }

    let session = sqlx::query_as::<_, WorkSession>(&format!(
        r#"
        INSERT INTO work_sessions (staff_id, status, check_in, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(staff_id)
    .bind(status)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(staff_id, session_id = session.id, %status, "Staff checked in");
    Ok(session)
}

pub async fn check_out(
    pool: &SqlitePool,
    staff_id: i64,
    now: NaiveDateTime,
) -> AppResult<SessionResponse> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    let open = match open_session_today(&mut tx, staff_id, now).await? {
        Some(open) => open,
        None => return no_open_session(tx).await,
    };

    if now < open.check_in {
        return Err(AppError::invalid("Check-out cannot precede check-in"));
    }

    let closed = close_session(&mut tx, &open, now, false, now).await?;
    let response = load_response(&mut tx, closed.session).await?;
    tx.commit().await?;

    info!(
        staff_id,
        session_id = open.id,
        closed_break = closed.closed_break,
        "Staff checked out"
    );
    Ok(response)
}

pub async fn start_break(
    pool: &SqlitePool,
    staff_id: i64,
    now: NaiveDateTime,
) -> AppResult<WorkSessionBreak> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    let session = match open_session_today(&mut tx, staff_id, now).await? {
        Some(session) => session,
        None => return no_open_session(tx).await,
    };

    if open_break(&mut tx, session.id).await?.is_some() {
        return Err(AppError::conflict("Break already active"));
    }

    let brk = sqlx::query_as::<_, WorkSessionBreak>(&format!(
        r#"
        INSERT INTO work_session_breaks (session_id, start_time)
        VALUES (?, ?)
        RETURNING {BREAK_COLUMNS}
        "#
    ))
    .bind(session.id)
    .bind(now.max(session.check_in))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(staff_id, session_id = session.id, break_id = brk.id, "Break started");
    Ok(brk)
}

pub async fn end_break(
    pool: &SqlitePool,
    staff_id: i64,
    now: NaiveDateTime,
) -> AppResult<SessionResponse> {
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    let session = match open_session_today(&mut tx, staff_id, now).await? {
        Some(session) => session,
        None => return no_open_session(tx).await,
    };

    let brk = open_break(&mut tx, session.id)
        .await?
        .ok_or_else(|| AppError::not_found("No active break found"))?;

    let closed = close_break(&mut tx, &brk, now).await?;
    let response = load_response(&mut tx, session).await?;
    tx.commit().await?;

    debug!(
        staff_id,
        break_id = closed.id,
        duration_minutes = ?closed.duration_minutes,
        "Break ended"
    );
    Ok(response)
}

/// Owner-only partial update. Each changed field lands in the edit log.
pub async fn update_session(
    pool: &SqlitePool,
    staff_id: i64,
    session_id: i64,
    updates: SessionUpdate,
    now: NaiveDateTime,
) -> AppResult<SessionResponse> {
    if updates.status.is_none()
        && updates.notes.is_none()
        && updates.planned_duration_minutes.is_none()
        && updates.breaks.as_ref().is_none_or(|b| b.is_empty())
    {
        return Err(AppError::invalid("No fields provided for update"));
    }

    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(staff_id), now).await?;

    let session = find_session(&mut tx, session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))?;

    if session.staff_id != staff_id {
        return Err(AppError::forbidden("Only the owner may edit this session"));
    }

    let mut update = SqlUpdate::new("work_sessions", "id");
    let mut edits: Vec<(String, Option<String>, Option<String>)> = Vec::new();

    if let Some(status) = updates.status {
        if status != session.status {
            update.set("status", SqlValue::String(status.to_string()));
            edits.push((
                "status".into(),
                Some(session.status.to_string()),
                Some(status.to_string()),
            ));
        }
    }

    if let Some(notes) = updates.notes {
        if Some(&notes) != session.notes.as_ref() {
            edits.push(("notes".into(), session.notes.clone(), Some(notes.clone())));
            update.set("notes", SqlValue::String(notes));
        }
    }

    if let Some(planned) = updates.planned_duration_minutes {
        if planned < 0 {
            return Err(AppError::invalid("Planned duration cannot be negative"));
        }
        if Some(planned) != session.planned_duration_minutes {
            update.set("planned_duration_minutes", SqlValue::I64(planned));
            edits.push((
                "planned_duration_minutes".into(),
                session.planned_duration_minutes.map(|m| m.to_string()),
                Some(planned.to_string()),
            ));
        }
    }

    for change in updates.breaks.unwrap_or_default() {
        let brk = sqlx::query_as::<_, WorkSessionBreak>(&format!(
            "SELECT {BREAK_COLUMNS} FROM work_session_breaks WHERE id = ? AND session_id = ?"
        ))
        .bind(change.id)
        .bind(session.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Break {} not found in this session", change.id)))?;

        if brk.is_open() {
            return Err(AppError::invalid("Cannot edit the duration of an active break"));
        }
        if change.duration_minutes < 0 {
            return Err(AppError::invalid("Break duration cannot be negative"));
        }

        let new_end = Duration::try_minutes(change.duration_minutes)
            .and_then(|d| brk.start_time.checked_add_signed(d))
            .ok_or_else(|| AppError::invalid("Break duration is out of range"))?;

        // An open session has not ended yet; its breaks cannot end in the future.
        match session.check_out {
            Some(check_out) if new_end > check_out => {
                return Err(AppError::invalid("Break cannot extend past the session check-out"));
            }
            None if new_end > now => {
                return Err(AppError::invalid("Break cannot end in the future"));
            }
            _ => {}
        }

        let next_start = sqlx::query_scalar::<_, NaiveDateTime>(
            r#"
            SELECT start_time
            FROM work_session_breaks
            WHERE session_id = ? AND id != ? AND start_time >= ?
            ORDER BY start_time, id
            LIMIT 1
            "#,
        )
        .bind(session.id)
        .bind(brk.id)
        .bind(brk.start_time)
        .fetch_optional(&mut *tx)
        .await?;
        if next_start.is_some_and(|next| new_end > next) {
            return Err(AppError::invalid("Break cannot overlap the following break"));
        }

        if brk.duration_minutes == Some(change.duration_minutes) {
            continue;
        }

        sqlx::query("UPDATE work_session_breaks SET end_time = ?, duration_minutes = ? WHERE id = ?")
            .bind(new_end)
            .bind(change.duration_minutes)
            .bind(brk.id)
            .execute(&mut *tx)
            .await?;

        edits.push((
            format!("break.{}.duration_minutes", brk.id),
            brk.duration_minutes.map(|m| m.to_string()),
            Some(change.duration_minutes.to_string()),
        ));
    }

    if !edits.is_empty() {
        update.set("updated_at", SqlValue::DateTime(now));
        update.execute(&mut tx, session.id).await?;
    }

    for (field_name, old_value, new_value) in &edits {
        sqlx::query(
            r#"
            INSERT INTO work_session_edits
                (session_id, staff_id, field_name, old_value, new_value, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id)
        .bind(staff_id)
        .bind(field_name)
        .bind(old_value)
        .bind(new_value)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let session = find_session(&mut tx, session.id)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))?;
    let response = load_response(&mut tx, session).await?;
    tx.commit().await?;

    info!(staff_id, session_id, changes = edits.len(), "Session updated");
    Ok(response)
}

/// Sessions whose check-in falls on a day in `[from, to]`, newest first.
pub async fn get_history(
    pool: &SqlitePool,
    staff_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<SessionResponse>> {
    if from > to {
        return Err(AppError::invalid("from cannot be after to"));
    }

    let mut conn = pool.acquire().await?;
    let sessions = sqlx::query_as::<_, WorkSession>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM work_sessions
        WHERE staff_id = ? AND check_in >= ? AND check_in < ?
        ORDER BY check_in DESC
        "#
    ))
    .bind(staff_id)
    .bind(start_of_day(from))
    .bind(start_of_next_day(to))
    .fetch_all(&mut *conn)
    .await?;

    let mut history = Vec::with_capacity(sessions.len());
    for session in sessions {
        history.push(load_response(&mut conn, session).await?);
    }
    Ok(history)
}

/// Today's open session, if any. Not having one is not an error.
pub async fn get_current_session(
    pool: &SqlitePool,
    staff_id: i64,
    today: NaiveDate,
) -> AppResult<Option<SessionResponse>> {
    let mut conn = pool.acquire().await?;

    match open_session(&mut conn, staff_id).await? {
        Some(session) if session.check_in >= start_of_day(today) => {
            Ok(Some(load_response(&mut conn, session).await?))
        }
        _ => Ok(None),
    }
}

/// Snapshot of who is in today and how.
pub async fn get_today_presence_map(
    pool: &SqlitePool,
    today: NaiveDate,
) -> AppResult<BTreeMap<i64, SessionStatus>> {
    let rows = sqlx::query_as::<_, (i64, SessionStatus)>(
        r#"
        SELECT staff_id, status
        FROM work_sessions
        WHERE check_out IS NULL AND check_in >= ? AND check_in < ?
        "#,
    )
    .bind(start_of_day(today))
    .bind(start_of_next_day(today))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

pub async fn get_edit_log(
    pool: &SqlitePool,
    staff_id: i64,
    session_id: i64,
) -> AppResult<Vec<SessionEdit>> {
    let mut conn = pool.acquire().await?;
    let session = find_session(&mut conn, session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))?;

    if session.staff_id != staff_id {
        return Err(AppError::forbidden("Only the owner may view this edit log"));
    }

    let edits = sqlx::query_as::<_, SessionEdit>(
        r#"
        SELECT id, session_id, staff_id, field_name, old_value, new_value, created_at
        FROM work_session_edits
        WHERE session_id = ?
        ORDER BY id
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};
    use crate::error::ErrorKind;
    use crate::model::work_session::BreakDurationUpdate;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn setup() -> (SqlitePool, i64) {
        let pool = test_pool().await;
        let staff = fixtures::staff(&pool, "Nora").await;
        (pool, staff)
    }

    async fn open_sessions(pool: &SqlitePool, staff: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM work_sessions WHERE staff_id = ? AND check_out IS NULL")
            .bind(staff)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn full_day_with_a_break() {
        let (pool, staff) = setup().await;

        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        assert!(session.is_open());

        start_break(&pool, staff, at("2026-02-02 12:00:00")).await.unwrap();

        let err = start_break(&pool, staff, at("2026-02-02 12:05:00")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after_break = end_break(&pool, staff, at("2026-02-02 12:30:00")).await.unwrap();
        assert_eq!(after_break.breaks.len(), 1);
        assert_eq!(after_break.breaks[0].duration_minutes, Some(30));

        let closed = check_out(&pool, staff, at("2026-02-02 17:00:00")).await.unwrap();
        assert_eq!(closed.session.check_out, Some(at("2026-02-02 17:00:00")));
        assert_eq!(closed.break_minutes, 30);
        assert_eq!(closed.net_minutes, Some(8 * 60 - 30));
        assert_eq!(open_sessions(&pool, staff).await, 0);
    }

    #[actix_web::test]
    async fn double_check_in_is_a_conflict() {
        let (pool, staff) = setup().await;
        check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();

        let err = check_in(&pool, staff, SessionStatus::HomeOffice, at("2026-02-02 09:01:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(open_sessions(&pool, staff).await, 1);
    }

    #[actix_web::test]
    async fn check_in_after_missed_check_out_closes_the_stale_session() {
        let (pool, staff) = setup().await;
        let stale = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        start_break(&pool, staff, at("2026-02-02 15:00:00")).await.unwrap();

        let fresh = check_in(&pool, staff, SessionStatus::HomeOffice, at("2026-02-03 08:30:00"))
            .await
            .unwrap();
        assert_ne!(fresh.id, stale.id);
        assert_eq!(open_sessions(&pool, staff).await, 1);

        let history = get_history(&pool, staff, day("2026-02-02"), day("2026-02-02")).await.unwrap();
        let old = &history[0];
        assert_eq!(old.session.check_out, Some(at("2026-02-02 23:59:59")));
        assert!(old.session.auto_closed);
        assert_eq!(old.breaks[0].end_time, Some(at("2026-02-02 23:59:59")));
    }

    #[actix_web::test]
    async fn check_out_closes_a_dangling_break() {
        let (pool, staff) = setup().await;
        check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        start_break(&pool, staff, at("2026-02-02 16:45:00")).await.unwrap();

        let closed = check_out(&pool, staff, at("2026-02-02 17:00:00")).await.unwrap();
        assert_eq!(closed.breaks[0].end_time, Some(at("2026-02-02 17:00:00")));
        assert_eq!(closed.breaks[0].duration_minutes, Some(15));
    }

    #[actix_web::test]
    async fn missing_session_or_break_is_not_found() {
        let (pool, staff) = setup().await;
        let now = at("2026-02-02 10:00:00");

        assert_eq!(check_out(&pool, staff, now).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(start_break(&pool, staff, now).await.unwrap_err().kind(), ErrorKind::NotFound);

        check_in(&pool, staff, SessionStatus::Present, now).await.unwrap();
        let err = end_break(&pool, staff, at("2026-02-02 10:30:00")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("No active break found"));
    }

    #[actix_web::test]
    async fn only_the_owner_may_update() {
        let (pool, staff) = setup().await;
        let colleague = fixtures::staff(&pool, "Olaf").await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();

        let updates = SessionUpdate {
            notes: Some("covering for Olaf".into()),
            ..Default::default()
        };
        let err = update_session(&pool, colleague, session.id, updates, at("2026-02-02 10:00:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[actix_web::test]
    async fn open_break_duration_cannot_be_edited() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let brk = start_break(&pool, staff, at("2026-02-02 12:00:00")).await.unwrap();

        let updates = SessionUpdate {
            breaks: Some(vec![BreakDurationUpdate {
                id: brk.id,
                duration_minutes: 20,
            }]),
            ..Default::default()
        };
        let err = update_session(&pool, staff, session.id, updates, at("2026-02-02 12:10:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[actix_web::test]
    async fn updates_are_written_to_the_edit_log() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let brk = start_break(&pool, staff, at("2026-02-02 12:00:00")).await.unwrap();
        end_break(&pool, staff, at("2026-02-02 12:45:00")).await.unwrap();
        check_out(&pool, staff, at("2026-02-02 17:00:00")).await.unwrap();

        let updates = SessionUpdate {
            status: Some(SessionStatus::HomeOffice),
            notes: Some("afternoon from home".into()),
            planned_duration_minutes: Some(480),
            breaks: Some(vec![BreakDurationUpdate {
                id: brk.id,
                duration_minutes: 30,
            }]),
        };
        let updated = update_session(&pool, staff, session.id, updates, at("2026-02-03 08:00:00"))
            .await
            .unwrap();

        assert_eq!(updated.session.status, SessionStatus::HomeOffice);
        assert_eq!(updated.session.notes.as_deref(), Some("afternoon from home"));
        assert_eq!(updated.session.planned_duration_minutes, Some(480));
        assert_eq!(updated.breaks[0].duration_minutes, Some(30));
        assert_eq!(updated.breaks[0].end_time, Some(at("2026-02-02 12:30:00")));

        let log = get_edit_log(&pool, staff, session.id).await.unwrap();
        let break_field = format!("break.{}.duration_minutes", brk.id);
        let fields: Vec<&str> = log.iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(
            fields,
            vec!["status", "notes", "planned_duration_minutes", break_field.as_str()]
        );
        assert_eq!(log[0].old_value.as_deref(), Some("present"));
        assert_eq!(log[0].new_value.as_deref(), Some("home_office"));
    }

    #[actix_web::test]
    async fn break_edit_cannot_outlive_the_session() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let brk = start_break(&pool, staff, at("2026-02-02 16:00:00")).await.unwrap();
        end_break(&pool, staff, at("2026-02-02 16:30:00")).await.unwrap();
        check_out(&pool, staff, at("2026-02-02 17:00:00")).await.unwrap();

        let updates = SessionUpdate {
            breaks: Some(vec![BreakDurationUpdate {
                id: brk.id,
                duration_minutes: 90,
            }]),
            ..Default::default()
        };
        let err = update_session(&pool, staff, session.id, updates, at("2026-02-02 18:00:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[actix_web::test]
    async fn empty_update_is_rejected() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let err = update_session(&pool, staff, session.id, SessionUpdate::default(), at("2026-02-02 09:10:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[actix_web::test]
    async fn current_session_and_presence_map_only_see_today() {
        let (pool, staff) = setup().await;
        let colleague = fixtures::staff(&pool, "Paul").await;
        let gone = fixtures::staff(&pool, "Quinn").await;

        check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00")).await.unwrap();
        check_in(&pool, colleague, SessionStatus::HomeOffice, at("2026-02-03 08:00:00")).await.unwrap();
        check_in(&pool, gone, SessionStatus::Present, at("2026-02-03 07:00:00")).await.unwrap();
        check_out(&pool, gone, at("2026-02-03 11:00:00")).await.unwrap();

        let today = day("2026-02-03");
        assert!(get_current_session(&pool, staff, today).await.unwrap().is_none());
        let current = get_current_session(&pool, colleague, today).await.unwrap().unwrap();
        assert_eq!(current.session.status, SessionStatus::HomeOffice);

        let map = get_today_presence_map(&pool, today).await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&colleague), Some(&SessionStatus::HomeOffice));
    }

    #[actix_web::test]
    async fn history_is_bounded_and_validated() {
        let (pool, staff) = setup().await;
        for d in ["2026-02-02", "2026-02-03", "2026-02-04"] {
            check_in(&pool, staff, SessionStatus::Present, at(&format!("{d} 09:00:00"))).await.unwrap();
            check_out(&pool, staff, at(&format!("{d} 16:00:00"))).await.unwrap();
        }

        let history = get_history(&pool, staff, day("2026-02-03"), day("2026-02-04")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].session.check_in, at("2026-02-04 09:00:00"));

        let err = get_history(&pool, staff, day("2026-02-04"), day("2026-02-03")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[actix_web::test]
    async fn oversized_break_duration_is_rejected_not_overflowed() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let brk = start_break(&pool, staff, at("2026-02-02 12:00:00")).await.unwrap();
        end_break(&pool, staff, at("2026-02-02 12:30:00")).await.unwrap();

        for minutes in [1_000_000_000_000, i64::MAX] {
            let updates = SessionUpdate {
                breaks: Some(vec![BreakDurationUpdate {
                    id: brk.id,
                    duration_minutes: minutes,
                }]),
                ..Default::default()
            };
            let err = update_session(&pool, staff, session.id, updates, at("2026-02-02 13:00:00"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        }
    }

    #[actix_web::test]
    async fn break_on_open_session_cannot_be_stretched_past_now() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let brk = start_break(&pool, staff, at("2026-02-02 12:00:00")).await.unwrap();
        end_break(&pool, staff, at("2026-02-02 12:30:00")).await.unwrap();

        let stretch = |minutes| SessionUpdate {
            breaks: Some(vec![BreakDurationUpdate {
                id: brk.id,
                duration_minutes: minutes,
            }]),
            ..Default::default()
        };

        let err = update_session(&pool, staff, session.id, stretch(600), at("2026-02-02 13:00:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let ok = update_session(&pool, staff, session.id, stretch(45), at("2026-02-02 13:00:00"))
            .await
            .unwrap();
        assert_eq!(ok.breaks[0].end_time, Some(at("2026-02-02 12:45:00")));

        let closed = check_out(&pool, staff, at("2026-02-02 17:00:00")).await.unwrap();
        assert!(closed.breaks.iter().all(|b| b.end_time <= closed.session.check_out));
        assert_eq!(closed.net_minutes, Some(8 * 60 - 45));
    }

    #[actix_web::test]
    async fn break_edit_cannot_run_into_the_next_break() {
        let (pool, staff) = setup().await;
        let session = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();
        let first = start_break(&pool, staff, at("2026-02-02 10:00:00")).await.unwrap();
        end_break(&pool, staff, at("2026-02-02 10:15:00")).await.unwrap();
        start_break(&pool, staff, at("2026-02-02 12:00:00")).await.unwrap();
        end_break(&pool, staff, at("2026-02-02 12:30:00")).await.unwrap();
        check_out(&pool, staff, at("2026-02-02 17:00:00")).await.unwrap();

        let updates = SessionUpdate {
            breaks: Some(vec![BreakDurationUpdate {
                id: first.id,
                duration_minutes: 150,
            }]),
            ..Default::default()
        };
        let err = update_session(&pool, staff, session.id, updates, at("2026-02-02 18:00:00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("following break"));
    }

    #[actix_web::test]
    async fn calls_the_day_after_a_missed_check_out_do_not_reuse_the_old_session() {
        let (pool, staff) = setup().await;
        let stale = check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 09:00:00"))
            .await
            .unwrap();

        let next_day = at("2026-02-03 10:00:00");
        assert!(get_current_session(&pool, staff, next_day.date()).await.unwrap().is_none());

        let err = start_break(&pool, staff, next_day).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = check_out(&pool, staff, at("2026-02-03 17:00:00")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = end_break(&pool, staff, next_day).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // The old session was closed at the end of its own day, not today.
        let history = get_history(&pool, staff, day("2026-02-02"), day("2026-02-03")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session.id, stale.id);
        assert_eq!(history[0].session.check_out, Some(at("2026-02-02 23:59:59")));
        assert!(history[0].session.auto_closed);
        assert!(history[0].breaks.is_empty());
        assert_eq!(open_sessions(&pool, staff).await, 0);
    }

    #[actix_web::test]
    async fn racing_check_ins_open_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::file_pool(&dir, 4).await;
        let staff = fixtures::staff(&pool, "Nora").await;
        let now = at("2026-02-02 09:00:00");

        let results = futures::future::join_all(
            (0..6).map(|_| check_in(&pool, staff, SessionStatus::Present, now)),
        )
        .await;

        let (opened, refused): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
        assert_eq!(opened.len(), 1);
        for err in refused {
            assert_eq!(err.unwrap_err().kind(), ErrorKind::Conflict);
        }
        assert_eq!(open_sessions(&pool, staff).await, 1);
    }
}
