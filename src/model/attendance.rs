use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One student check-in event. Closed at most once.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "student_id": 42,
    "date": "2026-02-02",
    "check_in_time": "2026-02-02T07:45:12",
    "check_out_time": null,
    "checked_in_by": 7,
    "checked_out_by": null,
    "device_id": 3
}))]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub check_in_time: NaiveDateTime,
    pub check_out_time: Option<NaiveDateTime>,
    pub checked_in_by: i64,
    pub checked_out_by: Option<i64>,
    pub device_id: Option<i64>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl AttendanceStatus {
    /// Status of the day given its most recent record.
    pub fn from_latest(latest: Option<&AttendanceRecord>) -> Self {
        match latest {
            None => AttendanceStatus::NotCheckedIn,
            Some(r) if r.is_open() => AttendanceStatus::CheckedIn,
            Some(_) => AttendanceStatus::CheckedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    CheckedIn,
    CheckedOut,
    Cancelled,
}
