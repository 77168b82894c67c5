//! In-memory delivery log

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{DeliveryLogEntry, DeliveryLogError, DeliveryLogPage};
use super::DeliveryLog;

#[derive(Default)]
pub struct MemoryDeliveryLog {
    entries: RwLock<Vec<DeliveryLogEntry>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, oldest first.
    pub async fn snapshot(&self) -> Vec<DeliveryLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl DeliveryLog for MemoryDeliveryLog {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), DeliveryLogError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<DeliveryLogPage, DeliveryLogError> {
        let entries = self.entries.read().await;

        Ok(DeliveryLogPage {
            entries: entries.iter().rev().skip(offset).take(limit).cloned().collect(),
            total: entries.len(),
            limit,
            offset,
        })
    }
}
