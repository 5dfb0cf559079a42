pub mod memory;
pub mod service;
pub mod store;

pub use crate::memory::MemoryStore;
pub use crate::service::{HabitError, HabitService, HabitServiceBuilder};
pub use crate::store::{Document, DocumentStore, StoreError, Subscription};
