//! Student attendance toggling driven by RFID scans.
//!
//! A student has at most one open record per day. A scan either opens a new
//! record or closes the open one; leaving and coming back the same day yields
//! several records.

use crate::db::{Actor, lock_actor};
use crate::error::AppResult;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, ToggleAction};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use utoipa::ToSchema;

const RECORD_COLUMNS: &str = "id, student_id, date, check_in_time, check_out_time, \
                              checked_in_by, checked_out_by, device_id";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceStatusView {
    pub status: AttendanceStatus,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
    pub checked_in_by: Option<i64>,
    pub checked_out_by: Option<i64>,
}

impl AttendanceStatusView {
    fn from_latest(date: NaiveDate, latest: Option<&AttendanceRecord>) -> Self {
        Self {
            status: AttendanceStatus::from_latest(latest),
            date,
            check_in_time: latest.map(|r| r.check_in_time),
            check_out_time: latest.and_then(|r| r.check_out_time),
            checked_in_by: latest.map(|r| r.checked_in_by),
            checked_out_by: latest.and_then(|r| r.checked_out_by),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub record: AttendanceRecord,
}

async fn latest_for_day(
    conn: &mut SqliteConnection,
    student_id: i64,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM attendance_records
        WHERE student_id = ? AND date = ?
        ORDER BY check_in_time DESC, id DESC
        LIMIT 1
        "#
    ))
    .bind(student_id)
    .bind(date)
    .fetch_optional(conn)
    .await
}

/// Current day status of a student.
pub async fn get_status(
    pool: &SqlitePool,
    student_id: i64,
    today: NaiveDate,
) -> AppResult<AttendanceStatusView> {
    let mut conn = pool.acquire().await?;
    let latest = latest_for_day(&mut conn, student_id, today).await?;
    Ok(AttendanceStatusView::from_latest(today, latest.as_ref()))
}

/// Check the student in, or out if already checked in today.
pub async fn toggle(
    pool: &SqlitePool,
    student_id: i64,
    staff_id: i64,
    device_id: Option<i64>,
    now: NaiveDateTime,
) -> AppResult<ToggleOutcome> {
    let today = now.date();
    let mut tx = pool.begin().await?;
    lock_actor(&mut tx, Actor::Student(student_id), now).await?;

    let latest = latest_for_day(&mut tx, student_id, today).await?;

    let outcome = match latest {
        Some(open) if open.is_open() => {
            let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
                r#"
                UPDATE attendance_records
                SET check_out_time = ?, checked_out_by = ?
                WHERE id = ? AND check_out_time IS NULL
                RETURNING {RECORD_COLUMNS}
                "#
            ))
            .bind(now)
            .bind(staff_id)
            .bind(open.id)
            .fetch_one(&mut *tx)
            .await?;

            ToggleOutcome {
                action: ToggleAction::CheckedOut,
                record,
            }
        }
        _ => {
            // The partial unique index rejects a second open row for the day.
            let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
                r#"
                INSERT INTO attendance_records
                    (student_id, date, check_in_time, checked_in_by, device_id)
                VALUES (?, ?, ?, ?, ?)
                RETURNING {RECORD_COLUMNS}
                "#
            ))
            .bind(student_id)
            .bind(today)
            .bind(now)
            .bind(staff_id)
            .bind(device_id)
            .fetch_one(&mut *tx)
            .await?;

            ToggleOutcome {
                action: ToggleAction::CheckedIn,
                record,
            }
        }
    };

    tx.commit().await?;

    info!(
        student_id,
        staff_id,
        record_id = outcome.record.id,
        action = ?outcome.action,
        "Attendance toggled"
    );

    Ok(outcome)
}

/// All records of one day, optionally restricted to a group.
pub async fn list_for_day(
    pool: &SqlitePool,
    date: NaiveDate,
    group_id: Option<i64>,
) -> AppResult<Vec<AttendanceRecord>> {
    let records = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT a.id, a.student_id, a.date, a.check_in_time, a.check_out_time,
               a.checked_in_by, a.checked_out_by, a.device_id
        FROM attendance_records a
        JOIN students s ON s.id = a.student_id
        WHERE a.date = ? AND (? IS NULL OR s.group_id = ?)
        ORDER BY a.check_in_time, a.id
        "#,
    )
    .bind(date)
    .bind(group_id)
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}
