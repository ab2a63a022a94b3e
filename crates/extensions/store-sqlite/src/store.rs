//! SQLite [`JobStore`] implementation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use tracing::debug;

use postforge_scheduler::{JobDefinition, JobId, JobStore, ScheduledJob, StoreError};

use crate::schema::init_schema;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

const SELECT_COLUMNS: &str = "SELECT id, name, schedule, params, is_active, created_at, updated_at,
        last_run_at, total_runs, consecutive_failures, last_error
 FROM scheduled_jobs";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Connection,
}

impl SqliteJobStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await.map_err(db_error)?;
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(db_error)?;
        Ok(Self { conn })
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to create {:?}: {}", parent, e)))?;
        }

        let conn = Connection::open(&path).await.map_err(db_error)?;
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(db_error)?;

        debug!("SqliteJobStore opened at {:?}", path);
        Ok(Self { conn })
    }

    async fn query(&self, filter: &'static str) -> Result<Vec<ScheduledJob>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("{} {} ORDER BY id", SELECT_COLUMNS, filter))?;
                let rows = stmt
                    .query_map([], JobRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(db_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, definition: &JobDefinition) -> Result<ScheduledJob, StoreError> {
        let now = Utc::now();
        let schedule = serde_json::to_string(&definition.schedule)?;
        let params_json = serde_json::to_string(&definition.params)?;
        let name = definition.name.clone();
        let is_active = definition.is_active;
        let stamp = now.to_rfc3339();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO scheduled_jobs (name, schedule, params, is_active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![name, schedule, params_json, is_active, stamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(db_error)?;

        Ok(ScheduledJob::from_definition(id, definition, now))
    }

    async fn get(&self, id: JobId) -> Result<Option<ScheduledJob>, StoreError> {
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                        [id],
                        JobRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(db_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        self.query("").await
    }

    async fn list_active(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        self.query("WHERE is_active = 1").await
    }

    async fn update(&self, job: &ScheduledJob) -> Result<(), StoreError> {
        let id = job.id;
        let name = job.name.clone();
        let schedule = serde_json::to_string(&job.schedule)?;
        let params_json = serde_json::to_string(&job.params)?;
        let is_active = job.is_active;
        let updated_at = job.updated_at.to_rfc3339();
        let last_run_at = job.last_run_at.map(|t| t.to_rfc3339());
        let total_runs = i64::try_from(job.total_runs).unwrap_or(i64::MAX);
        let consecutive_failures = job.consecutive_failures;
        let last_error = job.last_error.clone();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE scheduled_jobs
                     SET name = ?2, schedule = ?3, params = ?4, is_active = ?5, updated_at = ?6,
                         last_run_at = ?7, total_runs = ?8, consecutive_failures = ?9, last_error = ?10
                     WHERE id = ?1",
                    params![
                        id,
                        name,
                        schedule,
                        params_json,
                        is_active,
                        updated_at,
                        last_run_at,
                        total_runs,
                        consecutive_failures,
                        last_error
                    ],
                )?;
                Ok(changed)
            })
            .await
            .map_err(db_error)?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM scheduled_jobs WHERE id = ?1", [id])?))
            .await
            .map_err(db_error)?;
        Ok(changed > 0)
    }
}

/// Raw column values, decoded outside the connection thread.
struct JobRow {
    id: i64,
    name: String,
    schedule: String,
    params: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
    last_run_at: Option<String>,
    total_runs: i64,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            schedule: row.get(2)?,
            params: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            last_run_at: row.get(7)?,
            total_runs: row.get(8)?,
            consecutive_failures: row.get(9)?,
            last_error: row.get(10)?,
        })
    }

    fn into_job(self) -> Result<ScheduledJob, StoreError> {
        Ok(ScheduledJob {
            id: self.id,
            name: self.name,
            schedule: serde_json::from_str(&self.schedule)?,
            params: serde_json::from_str(&self.params)?,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            last_run_at: self.last_run_at.as_deref().map(parse_timestamp).transpose()?,
            total_runs: u64::try_from(self.total_runs).unwrap_or_default(),
            consecutive_failures: self.consecutive_failures,
            last_error: self.last_error,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

fn db_error(e: tokio_rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
