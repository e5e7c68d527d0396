//! Domain event publishing
//!
//! Events are published to `commerce.<tenant slug>.<event name>`, e.g.
//! `commerce.kite-shack.order.paid`. Publishing is fire-and-forget from the
//! caller's point of view: failures are logged and never fail a request.

use async_trait::async_trait;

use crate::domain::DomainEvent;

pub const SUBJECT_PREFIX: &str = "commerce";

pub fn subject_for(tenant_slug: &str, event: &DomainEvent) -> String {
    format!("{SUBJECT_PREFIX}.{tenant_slug}.{}", event.name())
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: &str, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Publishes each event, logging instead of propagating failures.
pub async fn publish_all(publisher: &dyn EventPublisher, tenant_slug: &str, events: Vec<DomainEvent>) {
    for event in events {
        let subject = subject_for(tenant_slug, &event);
        if let Err(e) = publisher.publish(&subject, &event).await {
            tracing::warn!(subject = %subject, error = %e, "failed to publish domain event");
        }
    }
}

pub struct NatsPublisher { client: async_nats::Client }

impl NatsPublisher {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        Ok(Self { client: async_nats::connect(url).await? })
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, subject: &str, event: &DomainEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(subject.to_string(), payload.into()).await?;
        Ok(())
    }
}

/// Used when no NATS URL is configured.
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, subject: &str, _event: &DomainEvent) -> anyhow::Result<()> {
        tracing::debug!(subject = %subject, "event publishing disabled");
        Ok(())
    }
}
