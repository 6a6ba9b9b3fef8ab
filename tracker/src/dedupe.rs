//! Alert replacement.
//!
//! At most one supplementary alert is live per destination. Before sending a
//! new one, the previously tracked alert is deleted best-effort; a message
//! someone already removed, or one the bot may no longer touch, is not an
//! error. The new id is recorded only after the send succeeds, preserving
//! the destination's delete-before-record ordering.

use inu_types::{ChatTransport, MessageId, OutboundMessage, StatusStore};
use tracing::debug;

use crate::destinations::Destination;
use crate::fanout::DeliveryError;

pub async fn replace_alert<T: ChatTransport, S: StatusStore>(
    transport: &T,
    store: &S,
    destination: Destination,
    body: &str,
) -> Result<MessageId, DeliveryError> {
    let channel = destination.channel;
    if let Some(previous) = store.alert_message(channel).await? {
        match transport.delete(channel, previous).await {
            Ok(()) => debug!(%channel, message = %previous, "deleted previous alert"),
            Err(err) if err.is_ignorable_on_delete() => {}
            Err(err) => return Err(err.into()),
        }
    }

    let message = OutboundMessage::with_mention(body, destination.mention());
    let id = transport.send(channel, &message).await?;
    store.set_alert_message(channel, id).await?;
    Ok(id)
}
