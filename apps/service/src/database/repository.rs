use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};

use super::models::{
    MonitoredTarget, NotificationKind, NotificationRecord, ProbeResult, ProbeResultId, TargetId,
    millis_to_timestamp, timestamp_to_millis,
};
use crate::monitoring::types::ProbeStatus;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Source of monitored targets
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Get every known target
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>>;

    /// Get a target by id
    async fn get_target(&self, id: TargetId) -> Result<Option<MonitoredTarget>>;

    /// Insert a new target (id is `None`) or update an existing one, returning its id
    async fn save_target(&self, target: &MonitoredTarget) -> Result<TargetId>;

    /// Delete a target, optionally together with its probe and notification history.
    /// Returns whether a target was removed.
    async fn delete_target(&self, id: TargetId, purge_history: bool) -> Result<bool>;
}

/// Append-only log of probe results
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a result atomically and return its id
    async fn append_result(&self, result: &ProbeResult) -> Result<ProbeResultId>;

    /// Most recent result stored for a target
    async fn latest_result(&self, target_id: TargetId) -> Result<Option<ProbeResult>>;

    /// Results checked at or after `since`, newest first
    async fn recent_results(
        &self,
        target_id: TargetId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ProbeResult>>;
}

/// Audit trail of attempted notifications
#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn record_notification(&self, record: &NotificationRecord) -> Result<i64>;

    /// Latest notifications for a target, newest first
    async fn recent_notifications(
        &self,
        target_id: TargetId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>>;
}

const TARGET_COLUMNS: &str = "id, name, host, port, check_type, interval_seconds, recipient, description, http_path, created_at, updated_at";
const RESULT_COLUMNS: &str = "id, target_id, status, latency_seconds, error_message, checked_at";
const NOTIFICATION_COLUMNS: &str =
    "id, target_id, kind, channel, recipient, subject, body, sent_at, success, error_message";

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        self.pool.get().await.map_err(|e| anyhow::anyhow!("Failed to get database connection: {e}"))
    }

    fn target_from_row(row: &Row) -> Result<MonitoredTarget> {
        let port: i64 = row.get(3)?;
        Ok(MonitoredTarget {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            host: row.get(2)?,
            port: u16::try_from(port).with_context(|| format!("stored port {port} out of range"))?,
            check_type: row.get(4)?,
            interval_seconds: row.get::<i64>(5)?.max(0) as u64,
            recipient: row.get(6)?,
            description: row.get(7)?,
            http_path: row.get(8)?,
            created_at: millis_to_timestamp(row.get(9)?),
            updated_at: millis_to_timestamp(row.get(10)?),
        })
    }

    fn result_from_row(row: &Row) -> Result<ProbeResult> {
        let status: String = row.get(2)?;
        Ok(ProbeResult {
            id: Some(row.get(0)?),
            target_id: row.get(1)?,
            status: ProbeStatus::from_stored(&status),
            latency_seconds: row.get(3)?,
            error_message: row.get(4)?,
            checked_at: millis_to_timestamp(row.get(5)?),
        })
    }

    fn notification_from_row(row: &Row) -> Result<NotificationRecord> {
        let kind: String = row.get(2)?;
        Ok(NotificationRecord {
            id: Some(row.get(0)?),
            target_id: row.get(1)?,
            kind: NotificationKind::from_stored(&kind)
                .with_context(|| format!("unknown notification kind '{kind}'"))?,
            channel: row.get(3)?,
            recipient: row.get(4)?,
            subject: row.get(5)?,
            body: row.get(6)?,
            sent_at: millis_to_timestamp(row.get(7)?),
            success: row.get::<i64>(8)? != 0,
            error_message: row.get(9)?,
        })
    }
}

#[async_trait]
impl TargetRepository for DatabaseImpl {
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>> {
        let conn = self.get_conn().await?;
        let mut rows =
            conn.query(&format!("SELECT {TARGET_COLUMNS} FROM targets ORDER BY id"), ()).await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(Self::target_from_row(&row)?);
        }
        Ok(targets)
    }

    async fn get_target(&self, id: TargetId) -> Result<Option<MonitoredTarget>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::target_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_target(&self, target: &MonitoredTarget) -> Result<TargetId> {
        let conn = self.get_conn().await?;
        let updated_at = timestamp_to_millis(Utc::now());

        if let Some(id) = target.id {
            let changed = conn
                .execute(
                    "UPDATE targets SET name = ?, host = ?, port = ?, check_type = ?, interval_seconds = ?, recipient = ?, description = ?, http_path = ?, updated_at = ? WHERE id = ?",
                    params![
                        target.name.clone(),
                        target.host.clone(),
                        target.port as i64,
                        target.check_type.clone(),
                        target.interval_seconds as i64,
                        target.recipient.clone(),
                        target.description.clone(),
                        target.http_path.clone(),
                        updated_at,
                        id
                    ],
                )
                .await?;
            if changed == 0 {
                anyhow::bail!("target {id} does not exist");
            }
            Ok(id)
        } else {
            conn.execute(
                "INSERT INTO targets (name, host, port, check_type, interval_seconds, recipient, description, http_path, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    target.name.clone(),
                    target.host.clone(),
                    target.port as i64,
                    target.check_type.clone(),
                    target.interval_seconds as i64,
                    target.recipient.clone(),
                    target.description.clone(),
                    target.http_path.clone(),
                    timestamp_to_millis(target.created_at),
                    updated_at
                ],
            )
            .await?;

            Ok(conn.last_insert_rowid())
        }
    }

    async fn delete_target(&self, id: TargetId, purge_history: bool) -> Result<bool> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        if purge_history {
            tx.execute("DELETE FROM probe_results WHERE target_id = ?", params![id]).await?;
            tx.execute("DELETE FROM notification_records WHERE target_id = ?", params![id]).await?;
        }
        let removed = tx.execute("DELETE FROM targets WHERE id = ?", params![id]).await?;

        tx.commit().await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl HistoryStore for DatabaseImpl {
    async fn append_result(&self, result: &ProbeResult) -> Result<ProbeResultId> {
        let conn = self.get_conn().await?;
        // Dropping the transaction without commit rolls the insert back
        let tx = conn.transaction().await?;

        tx.execute(
            "INSERT INTO probe_results (target_id, status, latency_seconds, error_message, checked_at) VALUES (?, ?, ?, ?, ?)",
            params![
                result.target_id,
                result.status.as_str(),
                result.latency_seconds,
                result.error_message.clone(),
                timestamp_to_millis(result.checked_at)
            ],
        )
        .await?;
        let id = tx.last_insert_rowid();

        tx.commit().await?;
        Ok(id)
    }

    async fn latest_result(&self, target_id: TargetId) -> Result<Option<ProbeResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RESULT_COLUMNS} FROM probe_results WHERE target_id = ? ORDER BY checked_at DESC, id DESC LIMIT 1"
                ),
                params![target_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::result_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn recent_results(
        &self,
        target_id: TargetId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ProbeResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RESULT_COLUMNS} FROM probe_results WHERE target_id = ? AND checked_at >= ? ORDER BY checked_at DESC, id DESC LIMIT ?"
                ),
                params![target_id, timestamp_to_millis(since), limit as i64],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::result_from_row(&row)?);
        }
        Ok(results)
    }
}

#[async_trait]
impl NotificationLog for DatabaseImpl {
    async fn record_notification(&self, record: &NotificationRecord) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO notification_records (target_id, kind, channel, recipient, subject, body, sent_at, success, error_message) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.target_id,
                record.kind.as_str(),
                record.channel.clone(),
                record.recipient.clone(),
                record.subject.clone(),
                record.body.clone(),
                timestamp_to_millis(record.sent_at),
                if record.success { 1 } else { 0 },
                record.error_message.clone()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn recent_notifications(
        &self,
        target_id: TargetId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notification_records WHERE target_id = ? ORDER BY sent_at DESC, id DESC LIMIT ?"
                ),
                params![target_id, limit as i64],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::notification_from_row(&row)?);
        }
        Ok(records)
    }
}
