use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::models::{Port, PortChanges};
use crate::database::repository::PortStore;

/// Port store kept in process memory. Used by the `memory` storage backend
/// and by tests; contents are lost on restart.
#[derive(Default)]
pub struct MemoryPortStore {
    // Insertion order, oldest first
    ports: RwLock<Vec<Port>>,
}

impl MemoryPortStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.ports.read().await.len()
    }
}

#[async_trait]
impl PortStore for MemoryPortStore {
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Port>, DatabaseError> {
        let ports = self.ports.read().await;
        // Newest insert first, so equal timestamps still list newest first
        let mut owned: Vec<Port> = ports
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Port>, DatabaseError> {
        Ok(self.ports.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, port: &Port) -> Result<Port, DatabaseError> {
        self.ports.write().await.push(port.clone());
        Ok(port.clone())
    }

    async fn update(
        &self,
        id: &str,
        changes: &PortChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Port>, DatabaseError> {
        let mut ports = self.ports.write().await;
        Ok(ports.iter_mut().find(|p| p.id == id).map(|port| {
            changes.apply(port, updated_at);
            port.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut ports = self.ports.write().await;
        let before = ports.len();
        ports.retain(|p| p.id != id);
        Ok(ports.len() < before)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
