use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub group_id: i64,
}
