//! Concurrent destination fan-out.
//!
//! One update goes to every destination at once. Destinations are isolated:
//! a slow or failing channel never delays or aborts its siblings, and a
//! failure is logged and reported but not retried, since the next change
//! cycle resends everything anyway.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use inu_types::{
    ChatError, ChatTransport, ChannelId, OutboundMessage, StatusStore, StoreError,
};

use crate::dedupe::replace_alert;
use crate::destinations::Destination;
use crate::processor::StockUpdate;
use crate::render;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one destination's delivery.
#[derive(Debug)]
pub struct DeliveryReport {
    pub destination: ChannelId,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher<T, S> {
    transport: Arc<T>,
    store: Arc<S>,
}

impl<T: ChatTransport, S: StatusStore> Dispatcher<T, S> {
    pub fn new(transport: Arc<T>, store: Arc<S>) -> Self {
        Self { transport, store }
    }

    /// Deliver `update` to every destination concurrently and report each
    /// outcome.
    pub async fn dispatch(
        &self,
        update: &StockUpdate,
        destinations: &[Destination],
    ) -> Vec<DeliveryReport> {
        let status = OutboundMessage::plain(render::status_content(&update.snapshot));
        let alert_body = render::alert_content(update);

        let deliveries = destinations.iter().map(|destination| {
            let status = &status;
            let alert_body = alert_body.as_deref();
            async move {
                let result = self.deliver(*destination, status, alert_body).await;
                if let Err(err) = &result {
                    warn!(channel = %destination.channel, %err, "stock update delivery failed");
                }
                DeliveryReport {
                    destination: destination.channel,
                    result,
                }
            }
        });
        futures::future::join_all(deliveries).await
    }

    /// One destination: notable alert first (replacing the previous one),
    /// then the persistent status message.
    async fn deliver(
        &self,
        destination: Destination,
        status: &OutboundMessage,
        alert: Option<&str>,
    ) -> Result<(), DeliveryError> {
        if let Some(body) = alert {
            replace_alert(&*self.transport, &*self.store, destination, body).await?;
        }
        self.refresh_status(destination.channel, status).await
    }

    /// Edit the tracked status message in place; a stale pointer falls back
    /// to a fresh send whose id is recorded for next time.
    async fn refresh_status(
        &self,
        channel: ChannelId,
        status: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        if let Some(existing) = self.store.status_message(channel).await? {
            match self.transport.edit(channel, existing, status).await {
                Ok(()) => return Ok(()),
                Err(ChatError::NotFound) => {
                    self.store.clear_status_message(channel).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        let id = self.transport.send(channel, status).await?;
        self.store.set_status_message(channel, id).await?;
        Ok(())
    }
}
