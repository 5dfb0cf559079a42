use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// A document as the backing store hands it out: opaque id plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport, permission, or backend failure. Never retried here.
    #[error("store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("malformed document `{id}`: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type SnapshotHandler = Arc<dyn Fn(Vec<Document>) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(StoreError) + Send + Sync>;

/// Document-oriented store the habit service persists into.
///
/// Collections are addressed by slash-separated paths scoped per user
/// (`users/{userId}/habits`); ids are assigned by the store on `add`.
/// Durable backends implement this trait; [`crate::MemoryStore`] is the
/// in-process reference implementation.
pub trait DocumentStore: Send + Sync {
    fn get_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    fn get_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    fn add(&self, collection: &str, fields: Value) -> Result<String, StoreError>;

    fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError>;

    /// Removing an absent id is not an error.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Push-based snapshots: the current collection contents are delivered
    /// immediately, then again after every mutation, until the returned
    /// handle is cancelled.
    fn subscribe(
        &self,
        collection: &str,
        on_snapshot: SnapshotHandler,
        on_error: ErrorHandler,
    ) -> Result<Subscription, StoreError>;
}

/// Handle for a live snapshot feed. Cancelling (or dropping) stops delivery.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}
