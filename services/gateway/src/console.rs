//! Log-only chat transport for dry runs.
//!
//! Lets the whole service run without chat credentials: every delivery is a
//! structured log line and ids are handed out locally.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use inu_types::{ChatError, ChatTransport, ChannelId, MessageId, OutboundMessage};

#[derive(Default)]
pub struct ConsoleChat {
    next_id: AtomicU64,
}

impl ChatTransport for ConsoleChat {
    async fn send(
        &self,
        channel: ChannelId,
        message: &OutboundMessage,
    ) -> Result<MessageId, ChatError> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        info!(%channel, message = %id, content = %message.content, "console send");
        Ok(id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: &OutboundMessage,
    ) -> Result<(), ChatError> {
        info!(%channel, %message, content = %update.content, "console edit");
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), ChatError> {
        info!(%channel, %message, "console delete");
        Ok(())
    }
}
