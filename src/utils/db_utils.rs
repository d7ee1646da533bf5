use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqliteConnection;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// ===============================
/// SQL update container
/// ===============================
/// Collects `column = ?` assignments for one row of one table. Column names
/// are always `&'static str` chosen by the caller, never user input.
#[derive(Debug)]
pub struct SqlUpdate {
    table: &'static str,
    id_column: &'static str,
    assignments: Vec<(&'static str, SqlValue)>,
}

impl SqlUpdate {
    pub fn new(table: &'static str, id_column: &'static str) -> Self {
        Self {
            table,
            id_column,
            assignments: Vec::new(),
        }
    }

    pub fn set(&mut self, column: &'static str, value: SqlValue) -> &mut Self {
        self.assignments.push((column, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// ===============================
    /// Build dynamic UPDATE SQL
    /// ===============================
    pub fn to_sql(&self) -> String {
        let set_clause = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, set_clause, self.id_column
        )
    }

    /// ===============================
    /// Execute the update
    /// ===============================
    pub async fn execute(self, conn: &mut SqliteConnection, id_value: i64) -> Result<u64, sqlx::Error> {
        if self.assignments.is_empty() {
            return Ok(0);
        }

        let sql = self.to_sql();
        let mut query = sqlx::query(&sql);

        for (_, value) in self.assignments {
            query = match value {
                SqlValue::String(v) => query.bind(v),
                SqlValue::I64(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
                SqlValue::DateTime(v) => query.bind(v),
            };
        }

        let result = query.bind(id_value).execute(conn).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_set_clause_in_insertion_order() {
        let mut update = SqlUpdate::new("work_sessions", "id");
        update
            .set("notes", SqlValue::String("late start".into()))
            .set("planned_duration_minutes", SqlValue::I64(300));

        assert_eq!(
            update.to_sql(),
            "UPDATE work_sessions SET notes = ?, planned_duration_minutes = ? WHERE id = ?"
        );
    }
}
