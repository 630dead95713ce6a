//! In-process implementation of the storage traits.
//!
//! Handy when embedding the monitor without a database file, and used
//! throughout the test suite.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::models::{MonitoredTarget, NotificationRecord, ProbeResult, ProbeResultId, TargetId};
use super::repository::{HistoryStore, NotificationLog, TargetRepository};

#[derive(Default)]
struct MemoryState {
    targets: BTreeMap<TargetId, MonitoredTarget>,
    results: Vec<ProbeResult>,
    notifications: Vec<NotificationRecord>,
    next_target_id: TargetId,
    next_result_id: ProbeResultId,
    next_notification_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored result for a target in insertion order
    pub async fn results_for(&self, target_id: TargetId) -> Vec<ProbeResult> {
        let state = self.state.read().await;
        state.results.iter().filter(|r| r.target_id == target_id).cloned().collect()
    }

    /// Every notification record for a target in insertion order
    pub async fn notifications_for(&self, target_id: TargetId) -> Vec<NotificationRecord> {
        let state = self.state.read().await;
        state.notifications.iter().filter(|n| n.target_id == target_id).cloned().collect()
    }
}

#[async_trait]
impl TargetRepository for MemoryStore {
    async fn list_targets(&self) -> Result<Vec<MonitoredTarget>> {
        Ok(self.state.read().await.targets.values().cloned().collect())
    }

    async fn get_target(&self, id: TargetId) -> Result<Option<MonitoredTarget>> {
        Ok(self.state.read().await.targets.get(&id).cloned())
    }

    async fn save_target(&self, target: &MonitoredTarget) -> Result<TargetId> {
        let mut state = self.state.write().await;
        let mut stored = target.clone();
        stored.updated_at = Utc::now();

        let id = match target.id {
            Some(id) => {
                if !state.targets.contains_key(&id) {
                    bail!("target {id} does not exist");
                }
                id
            }
            None => {
                state.next_target_id += 1;
                state.next_target_id
            }
        };
        stored.id = Some(id);
        state.targets.insert(id, stored);
        Ok(id)
    }

    async fn delete_target(&self, id: TargetId, purge_history: bool) -> Result<bool> {
        let mut state = self.state.write().await;
        if purge_history {
            state.results.retain(|r| r.target_id != id);
            state.notifications.retain(|n| n.target_id != id);
        }
        Ok(state.targets.remove(&id).is_some())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_result(&self, result: &ProbeResult) -> Result<ProbeResultId> {
        let mut state = self.state.write().await;
        state.next_result_id += 1;
        let id = state.next_result_id;
        state.results.push(ProbeResult { id: Some(id), ..result.clone() });
        Ok(id)
    }

    async fn latest_result(&self, target_id: TargetId) -> Result<Option<ProbeResult>> {
        let state = self.state.read().await;
        Ok(state
            .results
            .iter()
            .filter(|r| r.target_id == target_id)
            .max_by_key(|r| (r.checked_at, r.id))
            .cloned())
    }

    async fn recent_results(
        &self,
        target_id: TargetId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ProbeResult>> {
        let state = self.state.read().await;
        let mut results: Vec<ProbeResult> = state
            .results
            .iter()
            .filter(|r| r.target_id == target_id && r.checked_at >= since)
            .cloned()
            .collect();
        results.sort_by(|a, b| (b.checked_at, b.id).cmp(&(a.checked_at, a.id)));
        results.truncate(limit);
        Ok(results)
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn record_notification(&self, record: &NotificationRecord) -> Result<i64> {
        let mut state = self.state.write().await;
        state.next_notification_id += 1;
        let id = state.next_notification_id;
        state.notifications.push(NotificationRecord { id: Some(id), ..record.clone() });
        Ok(id)
    }

    async fn recent_notifications(
        &self,
        target_id: TargetId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.target_id == target_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ProbeStatus;

    fn result(target_id: TargetId, status: ProbeStatus) -> ProbeResult {
        ProbeResult {
            id: None,
            target_id,
            status,
            latency_seconds: None,
            error_message: None,
            checked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_assigned_in_order() -> Result<()> {
        let store = MemoryStore::new();
        let first = store.save_target(&MonitoredTarget::new("a", "a.example", 80, "http", "x@y.z")).await?;
        let second = store.save_target(&MonitoredTarget::new("b", "b.example", 80, "http", "x@y.z")).await?;
        assert!(second > first);

        let unknown = MonitoredTarget { id: Some(99), ..MonitoredTarget::new("c", "c", 1, "tcp", "x") };
        assert!(store.save_target(&unknown).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_result_prefers_newest() -> Result<()> {
        let store = MemoryStore::new();
        assert!(store.latest_result(1).await?.is_none());

        store.append_result(&result(1, ProbeStatus::Up)).await?;
        let down = store.append_result(&result(1, ProbeStatus::Down)).await?;

        assert_eq!(store.latest_result(1).await?.unwrap().id, Some(down));
        assert!(store.latest_result(2).await?.is_none());
        Ok(())
    }
}
