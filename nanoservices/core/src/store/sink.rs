use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use etlflow_utils::EtlResult;
use crate::events::sink::LineageSink;
use crate::events::types::LineageEvent;
use crate::store::db::Store;

/// Lineage sink that persists every event to SQLite.
#[derive(Clone)]
pub struct StoreSink {
    store: Arc<Mutex<Store>>,
}

impl StoreSink {
    pub fn new(store: Store) -> Self {
        Self { store: Arc::new(Mutex::new(store)) }
    }

    /// Shared handle for querying what has been written.
    pub fn store(&self) -> Arc<Mutex<Store>> {
        self.store.clone()
    }
}

#[async_trait]
impl LineageSink for StoreSink {
    async fn emit(&self, event: &LineageEvent) -> EtlResult<()> {
        let store = self.store.lock().await;
        store.record(event)?;
        Ok(())
    }
}
