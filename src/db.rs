use crate::config::Config;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;

pub async fn init_db(config: &Config) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context("Failed to parse DATABASE_URL")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.db_busy_timeout)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database pool ready"
    );

    Ok(pool)
}

/// Whose state a mutating transaction is about to read and rewrite.
#[derive(Debug, Clone, Copy)]
pub enum Actor {
    Student(i64),
    Staff(i64),
    Group(i64),
    Substitution(i64),
}

impl Actor {
    fn key(self) -> String {
        match self {
            Actor::Student(id) => format!("student:{id}"),
            Actor::Staff(id) => format!("staff:{id}"),
            Actor::Group(id) => format!("group:{id}"),
            Actor::Substitution(id) => format!("substitution:{id}"),
        }
    }
}

/// Touches the actor's lock row. Must be the first statement of the
/// transaction: the write takes SQLite's write lock up front, so a second
/// writer for any actor waits here (busy_timeout) instead of reading state
/// that is about to change.
pub async fn lock_actor(
    tx: &mut Transaction<'_, Sqlite>,
    actor: Actor,
    now: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO actor_locks (actor_key, locked_at)
        VALUES (?, ?)
        ON CONFLICT (actor_key) DO UPDATE SET locked_at = excluded.locked_at
        "#,
    )
    .bind(actor.key())
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Fresh in-memory database with the schema applied. One connection, so every
/// query in a test sees the same database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::from_str("sqlite::memory:")
                .unwrap()
                .foreign_keys(true),
        )
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

/// File-backed WAL database with several connections, for tests where
/// writers actually race each other. The file lives as long as `dir`.
#[cfg(test)]
pub async fn file_pool(dir: &tempfile::TempDir, connections: u32) -> SqlitePool {
    let config = Config {
        database_url: format!("sqlite://{}", dir.path().join("ogs.db").display()),
        db_max_connections: connections,
        ..Config::for_tests()
    };
    init_db(&config).await.unwrap()
}

#[cfg(test)]
pub mod fixtures {
    //! Directory rows the tracker tests build on.

    use sqlx::SqlitePool;

    pub async fn staff(pool: &SqlitePool, first_name: &str) -> i64 {
        sqlx::query("INSERT INTO staff (first_name, last_name) VALUES (?, 'Test')")
            .bind(first_name)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn group(pool: &SqlitePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO groups (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn student(pool: &SqlitePool, group_id: i64, rfid: &str) -> i64 {
        sqlx::query(
            "INSERT INTO students (first_name, last_name, group_id, rfid_tag) VALUES ('Kid', 'Test', ?, ?)",
        )
        .bind(group_id)
        .bind(rfid)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn supervise(pool: &SqlitePool, group_id: i64, staff_id: i64) {
        sqlx::query("INSERT INTO group_supervisors (group_id, staff_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(staff_id)
            .execute(pool)
            .await
            .unwrap();
    }
}
