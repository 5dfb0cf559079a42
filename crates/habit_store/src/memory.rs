use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::store::{
    Document, DocumentStore, ErrorHandler, SnapshotHandler, StoreError, Subscription,
};

/// In-memory document store with push-based snapshots.
///
/// Collections keep insertion order, ids are assigned monotonically, and
/// watchers are fanned out after every mutation. Intended for tests and
/// embedding; the durable owner of record stays an external backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    watchers: Mutex<HashMap<u64, Watcher>>,
    next_doc: AtomicU64,
    next_watcher: AtomicU64,
}

struct Watcher {
    collection: String,
    on_snapshot: SnapshotHandler,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.inner
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshots are delivered outside the data lock so handlers may call
    /// back into the store.
    fn notify(&self, collection: &str) {
        let docs = self.snapshot(collection);
        let handlers: Vec<SnapshotHandler> = self
            .inner
            .watchers
            .lock()
            .values()
            .filter(|watcher| watcher.collection == collection)
            .map(|watcher| Arc::clone(&watcher.on_snapshot))
            .collect();
        for handler in handlers {
            handler(docs.clone());
        }
    }
}

impl DocumentStore for MemoryStore {
    fn get_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.snapshot(collection))
    }

    fn get_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .inner
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    fn add(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        let id = format!(
            "doc-{}",
            self.inner.next_doc.fetch_add(1, Ordering::Relaxed) + 1
        );
        {
            let mut collections = self.inner.collections.write();
            collections
                .entry(collection.to_string())
                .or_default()
                .push(Document {
                    id: id.clone(),
                    fields,
                });
        }
        tracing::debug!(%collection, %id, "document added");
        self.notify(collection);
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        {
            let mut collections = self.inner.collections.write();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
                .ok_or_else(|| anyhow!("no document `{id}` in `{collection}`"))?;
            doc.fields = fields;
        }
        tracing::debug!(%collection, %id, "document updated");
        self.notify(collection);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let removed = {
            let mut collections = self.inner.collections.write();
            match collections.get_mut(collection) {
                Some(docs) => {
                    let before = docs.len();
                    docs.retain(|doc| doc.id != id);
                    docs.len() != before
                }
                None => false,
            }
        };
        if removed {
            tracing::debug!(%collection, %id, "document deleted");
            self.notify(collection);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &str,
        on_snapshot: SnapshotHandler,
        _on_error: ErrorHandler,
    ) -> Result<Subscription, StoreError> {
        let key = self.inner.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.lock().insert(
            key,
            Watcher {
                collection: collection.to_string(),
                on_snapshot: Arc::clone(&on_snapshot),
            },
        );
        on_snapshot(self.snapshot(collection));

        let inner = Arc::clone(&self.inner);
        Ok(Subscription::new(move || {
            inner.watchers.lock().remove(&key);
        }))
    }
}
