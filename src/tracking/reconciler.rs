//! Closes attendance records and work sessions left open past their day.
//!
//! Only rows dated before today are touched, so the reconciler never races
//! with the live toggles of the current day. Each row is closed in its own
//! transaction; a failing row is logged and the run carries on.

use crate::db::{Actor, lock_actor};
use crate::error::AppResult;
use crate::model::work_session::WorkSession;
use crate::tracking::work_session::close_session;
use crate::utils::time::{end_of_day, start_of_day};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub attendance_closed: u64,
    pub sessions_closed: u64,
    pub breaks_closed: u64,
    pub failures: u64,
}

/// Check-out time for a row left open on `date`.
///
/// Normally 23:59:59 of that day. When the check-in itself lies after that
/// (clock or timezone bugs in historical rows) the row closes one second
/// after check-in, so check-out never precedes check-in.
pub fn stale_close_time(date: NaiveDate, check_in: NaiveDateTime) -> NaiveDateTime {
    let end = end_of_day(date);
    if check_in > end {
        check_in + Duration::seconds(1)
    } else {
        end
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StaleAttendance {
    id: i64,
    student_id: i64,
    date: NaiveDate,
    check_in_time: NaiveDateTime,
}

async fn close_attendance(
    pool: &SqlitePool,
    row: &StaleAttendance,
    now: NaiveDateTime,
) -> AppResult<bool> {
    let close_at = stale_close_time(row.date, row.check_in_time);

    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Student(row.student_id), now).await?;

    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET check_out_time = ?
        WHERE id = ? AND check_out_time IS NULL
        "#,
    )
    .bind(close_at)
    .bind(row.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if close_at != end_of_day(row.date) {
        warn!(
            record_id = row.id,
            check_in = %row.check_in_time,
            %close_at,
            "Attendance check-in lies after its day; closed one second after check-in"
        );
    }

    Ok(result.rows_affected() == 1)
}

/// `Some(closed_break)` when the session was closed by this call.
async fn close_work_session(
    pool: &SqlitePool,
    session: &WorkSession,
    now: NaiveDateTime,
) -> AppResult<Option<bool>> {
    let close_at = stale_close_time(session.check_in.date(), session.check_in);

    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Staff(session.staff_id), now).await?;

    // Re-read under the lock: a check-in may have closed it meanwhile.
    let still_open = sqlx::query_scalar::<_, bool>(
        "SELECT check_out IS NULL FROM work_sessions WHERE id = ?",
    )
    .bind(session.id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(false);

    if !still_open {
        return Ok(None);
    }

    let closed = close_session(&mut tx, session, close_at, true, now).await?;
    tx.commit().await?;

    Ok(Some(closed.closed_break))
}

/// Close every stale attendance record and work session as of `now`.
pub async fn reconcile(pool: &SqlitePool, now: NaiveDateTime) -> AppResult<ReconcileReport> {
    let today = now.date();
    let mut report = ReconcileReport::default();

    let stale_attendance = sqlx::query_as::<_, StaleAttendance>(
        r#"
        SELECT id, student_id, date, check_in_time
        FROM attendance_records
        WHERE check_out_time IS NULL AND date < ?
        ORDER BY id
        "#,
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    for row in &stale_attendance {
        match close_attendance(pool, row, now).await {
            Ok(true) => report.attendance_closed += 1,
            Ok(false) => {}
            Err(e) => {
                report.failures += 1;
                error!(error = %e, record_id = row.id, "Failed to close stale attendance record");
            }
        }
    }

    let stale_sessions = sqlx::query_as::<_, WorkSession>(
        r#"
        SELECT id, staff_id, status, check_in, check_out, planned_duration_minutes,
               notes, auto_closed, created_at, updated_at
        FROM work_sessions
        WHERE check_out IS NULL AND check_in < ?
        ORDER BY id
        "#,
    )
    .bind(start_of_day(today))
    .fetch_all(pool)
    .await?;

    for session in &stale_sessions {
        match close_work_session(pool, session, now).await {
            Ok(Some(closed_break)) => {
                report.sessions_closed += 1;
                if closed_break {
                    report.breaks_closed += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                report.failures += 1;
                error!(error = %e, session_id = session.id, "Failed to close stale work session");
            }
        }
    }

    info!(
        attendance_closed = report.attendance_closed,
        sessions_closed = report.sessions_closed,
        breaks_closed = report.breaks_closed,
        failures = report.failures,
        "Stale session reconciliation finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};
    use crate::model::work_session::SessionStatus;
    use crate::tracking::{attendance, work_session};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn check_out_of(pool: &SqlitePool, record_id: i64) -> Option<NaiveDateTime> {
        sqlx::query_scalar("SELECT check_out_time FROM attendance_records WHERE id = ?")
            .bind(record_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn close_time_defaults_to_end_of_day() {
        assert_eq!(
            stale_close_time(day("2026-02-02"), at("2026-02-02 07:45:00")),
            at("2026-02-02 23:59:59")
        );
    }

    #[test]
    fn corrupted_check_in_closes_one_second_later() {
        let close = stale_close_time(day("2026-02-02"), at("2026-02-03 01:30:00"));
        assert_eq!(close, at("2026-02-03 01:30:01"));
    }

    #[actix_web::test]
    async fn closes_stale_rows_and_leaves_today_alone() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Robins").await;
        let staff = fixtures::staff(&pool, "Lena").await;
        let kid_a = fixtures::student(&pool, group, "A").await;
        let kid_b = fixtures::student(&pool, group, "B").await;

        let stale = attendance::toggle(&pool, kid_a, staff, None, at("2026-02-02 07:45:00"))
            .await
            .unwrap();
        let live = attendance::toggle(&pool, kid_b, staff, None, at("2026-02-03 07:50:00"))
            .await
            .unwrap();

        let report = reconcile(&pool, at("2026-02-03 09:00:00")).await.unwrap();
        assert_eq!(report.attendance_closed, 1);
        assert_eq!(report.failures, 0);

        assert_eq!(check_out_of(&pool, stale.record.id).await, Some(at("2026-02-02 23:59:59")));
        assert_eq!(check_out_of(&pool, live.record.id).await, None);
    }

    #[actix_web::test]
    async fn second_run_changes_nothing() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Wrens").await;
        let staff = fixtures::staff(&pool, "Mia").await;
        let kid = fixtures::student(&pool, group, "C").await;

        attendance::toggle(&pool, kid, staff, None, at("2026-02-02 07:45:00")).await.unwrap();
        work_session::check_in(&pool, staff, SessionStatus::Present, at("2026-02-02 08:00:00"))
            .await
            .unwrap();

        let now = at("2026-02-04 06:00:00");
        let first = reconcile(&pool, now).await.unwrap();
        assert_eq!(first.attendance_closed + first.sessions_closed, 2);

        let second = reconcile(&pool, now).await.unwrap();
        assert_eq!(second, ReconcileReport::default());
    }

    #[actix_web::test]
    async fn corrupted_attendance_row_never_closes_before_check_in() {
        let pool = test_pool().await;
        let group = fixtures::group(&pool, "Larks").await;
        let staff = fixtures::staff(&pool, "Jan").await;
        let kid = fixtures::student(&pool, group, "D").await;

        let id = sqlx::query(
            r#"
            INSERT INTO attendance_records (student_id, date, check_in_time, checked_in_by)
            VALUES (?, '2026-02-02', '2026-02-03 01:30:00', ?)
            "#,
        )
        .bind(kid)
        .bind(staff)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let report = reconcile(&pool, at("2026-02-05 06:00:00")).await.unwrap();
        assert_eq!(report.attendance_closed, 1);
        assert_eq!(check_out_of(&pool, id).await, Some(at("2026-02-03 01:30:01")));
    }

    #[actix_web::test]
    async fn stale_session_break_is_closed_with_its_session() {
        let pool = test_pool().await;
        let staff = fixtures::staff(&pool, "Ida").await;

        work_session::check_in(&pool, staff, SessionStatus::HomeOffice, at("2026-02-02 08:00:00"))
            .await
            .unwrap();
        work_session::start_break(&pool, staff, at("2026-02-02 13:00:00")).await.unwrap();

        let report = reconcile(&pool, at("2026-02-03 06:00:00")).await.unwrap();
        assert_eq!(report.sessions_closed, 1);
        assert_eq!(report.breaks_closed, 1);

        let history = work_session::get_history(&pool, staff, day("2026-02-02"), day("2026-02-02"))
            .await
            .unwrap();
        let session = &history[0];
        assert!(session.session.auto_closed);
        assert_eq!(session.session.check_out, Some(at("2026-02-02 23:59:59")));
        assert_eq!(session.breaks[0].end_time, Some(at("2026-02-02 23:59:59")));
        assert!(session.breaks.iter().all(|b| b.end_time <= session.session.check_out));
    }
}
