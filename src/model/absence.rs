use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbsenceType {
    Sick,
    Vacation,
    Training,
    ChildSick,
    SpecialLeave,
    Other,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbsenceStatus {
    Reported,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 4,
    "staff_id": 7,
    "absence_type": "vacation",
    "date_start": "2026-03-02",
    "date_end": "2026-03-06",
    "status": "reported",
    "note": "Easter break",
    "created_at": "2026-02-10T08:15:00"
}))]
pub struct StaffAbsence {
    pub id: i64,
    pub staff_id: i64,
    pub absence_type: AbsenceType,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub status: AbsenceStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAbsence {
    pub absence_type: AbsenceType,
    #[schema(example = "2026-03-02")]
    pub date_start: NaiveDate,
    #[schema(example = "2026-03-06")]
    pub date_end: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AbsenceUpdate {
    pub absence_type: Option<AbsenceType>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub note: Option<String>,
}
