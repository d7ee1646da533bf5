use chrono::NaiveDateTime;
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
pub enum SessionStatus {
    Present,
    HomeOffice,
}

/// A staff attendance session. At most one per staff member is open.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkSession {
    pub id: i64,
    pub staff_id: i64,
    pub status: SessionStatus,
    pub check_in: NaiveDateTime,
    pub check_out: Option<NaiveDateTime>,
    pub planned_duration_minutes: Option<i64>,
    pub notes: Option<String>,
    /// Closed by the reconciler rather than by the staff member
    pub auto_closed: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl WorkSession {
    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkSessionBreak {
    pub id: i64,
    pub session_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
}

impl WorkSessionBreak {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Session with its breaks and the totals derived from them.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session: WorkSession,
    pub breaks: Vec<WorkSessionBreak>,
    /// Sum of closed break durations
    pub break_minutes: i64,
    /// Session length minus breaks; absent while the session is open
    pub net_minutes: Option<i64>,
}

impl SessionResponse {
    pub fn new(session: WorkSession, breaks: Vec<WorkSessionBreak>) -> Self {
        let break_minutes = breaks.iter().filter_map(|b| b.duration_minutes).sum();
        let net_minutes = session
            .check_out
            .map(|out| (out - session.check_in).num_minutes() - break_minutes);

        Self {
            session,
            breaks,
            break_minutes,
            net_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BreakDurationUpdate {
    pub id: i64,
    #[schema(example = 30)]
    pub duration_minutes: i64,
}

/// Partial update of a session. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    #[schema(example = "Parents evening")]
    pub notes: Option<String>,
    #[schema(example = 480)]
    pub planned_duration_minutes: Option<i64>,
    pub breaks: Option<Vec<BreakDurationUpdate>>,
}

/// Audit row written for every field changed through an update.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct SessionEdit {
    pub id: i64,
    pub session_id: i64,
    pub staff_id: i64,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: NaiveDateTime,
}
