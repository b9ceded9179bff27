// crates/trustflow-pipeline/src/store.rs
//
// In-memory `ProcessStore`: the default backing map for the registry.
// Durable or distributed stores plug in through the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use trustflow_core::{ProcessId, ProcessStore, ScoringProcess, TrustflowError};

/// Process records held in a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryProcessStore {
    records: RwLock<HashMap<ProcessId, ScoringProcess>>,
}

impl InMemoryProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn get(&self, id: &ProcessId) -> Result<Option<ScoringProcess>, TrustflowError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, process: &ScoringProcess) -> Result<(), TrustflowError> {
        self.records
            .write()
            .await
            .insert(process.id.clone(), process.clone());
        Ok(())
    }

    async fn delete(&self, id: &ProcessId) -> Result<(), TrustflowError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ScoringProcess>, TrustflowError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
