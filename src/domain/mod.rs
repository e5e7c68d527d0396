//! Domain model: tenant-scoped aggregates, value objects and events

pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::*;
pub use events::DomainEvent;
pub use value_objects::{Money, Sku};

/// A lifecycle change the state machine of an aggregate does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move {entity} from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

impl TransitionError {
    pub fn new(entity: &'static str, from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self { entity, from: from.to_string(), to: to.to_string() }
    }
}
