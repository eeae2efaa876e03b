use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuditError, AuditResult};
use crate::model::{SyncLogAction, SyncLogEntry, SyncLogStatus, SyncSession};

/// PostgreSQL-backed store for sync sessions and their log entries.
pub struct AuditStore {
    pool: PgPool
}

impl AuditStore {
    pub async fn new(connection_url: &str) -> AuditResult<Self> {
        let pool = PgPool::connect(connection_url).await?;
        Ok(Self { pool })
    }

    pub async fn initialize_schema(&self) -> AuditResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sync_session (
                id UUID PRIMARY KEY,
                created TIMESTAMPTZ NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL,
                custom_field_data JSONB NOT NULL DEFAULT '{}',
                dry_run BOOLEAN NOT NULL,
                diff JSONB NOT NULL DEFAULT '{}',
                job_result_id UUID
            )"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sync_log_entry (
                id UUID PRIMARY KEY,
                sync_id UUID NOT NULL REFERENCES sync_session(id) ON DELETE CASCADE,
                timestamp TIMESTAMPTZ NOT NULL,
                action TEXT NOT NULL, -- 'no-change', 'create', 'update', 'delete'
                status TEXT NOT NULL, -- 'success', 'failure', 'error'
                diff JSONB NOT NULL DEFAULT '{}',
                changed_object_type TEXT,
                changed_object_id UUID,
                object_repr VARCHAR(200) NOT NULL,
                message VARCHAR(511) NOT NULL,
                object_change_id UUID
            )"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sync_log_entry_sync_timestamp
             ON sync_log_entry(sync_id, timestamp)"
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Open a new session and persist it immediately.
    pub async fn create_sync(&self, dry_run: bool) -> AuditResult<SyncSession> {
        let session = SyncSession::new(dry_run);
        self.insert_session(&session).await?;
        info!(sync_id = %session.id, dry_run, "sync session opened");
        Ok(session)
    }

    /// Persist one already-built session together with its entries in a
    /// single transaction. Used by importers that assemble the whole run
    /// before touching the database.
    pub async fn record(
        &self,
        session: &SyncSession,
        entries: &[SyncLogEntry]
    ) -> AuditResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO sync_session
                 (id, created, last_updated, custom_field_data, dry_run, diff, job_result_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        )
        .bind(session.id)
        .bind(session.created)
        .bind(session.last_updated)
        .bind(&session.custom_field_data)
        .bind(session.dry_run)
        .bind(&session.diff)
        .bind(session.job_result_id)
        .execute(&mut *tx)
        .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO sync_log_entry
                     (id, sync_id, timestamp, action, status, diff, changed_object_type,
                      changed_object_id, object_repr, message, object_change_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            )
            .bind(entry.id)
            .bind(entry.sync_id)
            .bind(entry.timestamp)
            .bind(entry.action.as_str())
            .bind(entry.status.as_str())
            .bind(&entry.diff)
            .bind(&entry.changed_object_type)
            .bind(entry.changed_object_id)
            .bind(&entry.object_repr)
            .bind(&entry.message)
            .bind(entry.object_change_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(sync_id = %session.id, entries = entries.len(), "sync run recorded");
        Ok(())
    }

    async fn insert_session(&self, session: &SyncSession) -> AuditResult<()> {
        sqlx::query(
            "INSERT INTO sync_session
                 (id, created, last_updated, custom_field_data, dry_run, diff, job_result_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        )
        .bind(session.id)
        .bind(session.created)
        .bind(session.last_updated)
        .bind(&session.custom_field_data)
        .bind(session.dry_run)
        .bind(&session.diff)
        .bind(session.job_result_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_diff(&self, id: Uuid, diff: &serde_json::Value) -> AuditResult<()> {
        sqlx::query("UPDATE sync_session SET diff = $2, last_updated = now() WHERE id = $1")
            .bind(id)
            .bind(diff)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_custom_fields(
        &self,
        id: Uuid,
        custom_field_data: &serde_json::Value
    ) -> AuditResult<()> {
        sqlx::query(
            "UPDATE sync_session SET custom_field_data = $2, last_updated = now() WHERE id = $1"
        )
        .bind(id)
        .bind(custom_field_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_sync(&self, id: Uuid) -> AuditResult<Option<SyncSession>> {
        let row = sqlx::query(
            "SELECT id, created, last_updated, custom_field_data, dry_run, diff, job_result_id
             FROM sync_session WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| session_from_row(&r)).transpose()
    }

    /// All sessions, most recent first.
    pub async fn list_syncs(&self) -> AuditResult<Vec<SyncSession>> {
        let rows = sqlx::query(
            "SELECT id, created, last_updated, custom_field_data, dry_run, diff, job_result_id
             FROM sync_session ORDER BY created DESC"
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    /// Delete a session and, through the cascade, all of its entries.
    /// Returns whether the session existed.
    pub async fn delete_sync(&self, id: Uuid) -> AuditResult<bool> {
        let result = sqlx::query("DELETE FROM sync_session WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Append one entry. The entry keeps its own timestamp, so importers can
    /// backfill historical runs with their original times.
    pub async fn add_log_entry(&self, entry: &SyncLogEntry) -> AuditResult<()> {
        sqlx::query(
            "INSERT INTO sync_log_entry
                 (id, sync_id, timestamp, action, status, diff, changed_object_type,
                  changed_object_id, object_repr, message, object_change_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        )
        .bind(entry.id)
        .bind(entry.sync_id)
        .bind(entry.timestamp)
        .bind(entry.action.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.diff)
        .bind(&entry.changed_object_type)
        .bind(entry.changed_object_id)
        .bind(&entry.object_repr)
        .bind(&entry.message)
        .bind(entry.object_change_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// A session's entries in event order, regardless of insertion order.
    pub async fn logs_for_sync(&self, sync_id: Uuid) -> AuditResult<Vec<SyncLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, sync_id, timestamp, action, status, diff, changed_object_type,
                    changed_object_id, object_repr, message, object_change_id
             FROM sync_log_entry WHERE sync_id = $1 ORDER BY timestamp ASC"
        )
        .bind(sync_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Detach all entries from a changed-object type that no longer exists.
    /// Returns the number of entries touched.
    pub async fn clear_changed_object_type(&self, object_type: &str) -> AuditResult<u64> {
        let result = sqlx::query(
            "UPDATE sync_log_entry
             SET changed_object_type = NULL, changed_object_id = NULL
             WHERE changed_object_type = $1"
        )
        .bind(object_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Null out references to a deleted change record.
    pub async fn clear_object_change(&self, object_change_id: Uuid) -> AuditResult<u64> {
        let result = sqlx::query(
            "UPDATE sync_log_entry SET object_change_id = NULL WHERE object_change_id = $1"
        )
        .bind(object_change_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn session_from_row(row: &PgRow) -> AuditResult<SyncSession> {
    Ok(SyncSession {
        id: row.get("id"),
        created: row.get("created"),
        last_updated: row.get("last_updated"),
        custom_field_data: row.get("custom_field_data"),
        dry_run: row.get("dry_run"),
        diff: row.get("diff"),
        job_result_id: row.get("job_result_id")
    })
}

fn entry_from_row(row: &PgRow) -> AuditResult<SyncLogEntry> {
    let action_str: String = row.get("action");
    let action = SyncLogAction::parse(&action_str).ok_or_else(|| {
        AuditError::Database(sqlx::Error::Decode(
            format!("Invalid log action: {action_str}").into()
        ))
    })?;
    let status_str: String = row.get("status");
    let status = SyncLogStatus::parse(&status_str).ok_or_else(|| {
        AuditError::Database(sqlx::Error::Decode(
            format!("Invalid log status: {status_str}").into()
        ))
    })?;

    Ok(SyncLogEntry {
        id: row.get("id"),
        sync_id: row.get("sync_id"),
        timestamp: row.get("timestamp"),
        action,
        status,
        diff: row.get("diff"),
        changed_object_type: row.get("changed_object_type"),
        changed_object_id: row.get("changed_object_id"),
        object_repr: row.get("object_repr"),
        message: row.get("message"),
        object_change_id: row.get("object_change_id")
    })
}
