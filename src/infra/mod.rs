//! Adapters for services outside the process: object storage and the event bus

pub mod events;
pub mod storage;

pub use events::{publish_all, EventPublisher, NatsPublisher, NoOpEventPublisher};
pub use storage::{DisabledStorage, ObjectStorage, StorageError, SupabaseStorage};
