use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Temporary reassignment of a group's supervision to a substitute.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "group_id": 2,
    "regular_staff_id": 5,
    "substitute_staff_id": 9,
    "start_date": "2026-02-05",
    "end_date": "2026-02-10",
    "reason": "Training week",
    "created_at": "2026-01-28T10:00:00"
}))]
pub struct GroupSubstitution {
    pub id: i64,
    pub group_id: i64,
    pub regular_staff_id: Option<i64>,
    pub substitute_staff_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewSubstitution {
    pub group_id: i64,
    pub regular_staff_id: Option<i64>,
    pub substitute_staff_id: i64,
    #[schema(example = "2026-02-05")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-10")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

/// Partial update. For the nullable fields an absent key keeps the stored
/// value and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SubstitutionUpdate {
    pub group_id: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i64>)]
    pub regular_staff_id: Option<Option<i64>>,
    pub substitute_staff_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub reason: Option<Option<String>>,
}

/// Only runs when the key is present, so `null` becomes `Some(None)`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SubstitutionFilter {
    /// Only substitutions for this group
    pub group_id: Option<i64>,
    /// Only substitutions held by this staff member
    pub staff_id: Option<i64>,
}
