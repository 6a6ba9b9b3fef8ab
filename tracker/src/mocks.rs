//! Test collaborators for the tracker.
//!
//! `MockChat` keeps the set of live messages per channel plus a full call
//! log, so tests can assert both end state (exactly one alert live) and
//! ordering (delete before the replacing send).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use inu_types::{
    ChatError, ChatTransport, ChannelId, Mention, MessageId, OutboundMessage, StatusStore,
    StoreError,
};

/// One observed transport call, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCall {
    Send {
        channel: ChannelId,
        message: MessageId,
        content: String,
        mention: Mention,
    },
    Edit {
        channel: ChannelId,
        message: MessageId,
        content: String,
    },
    Delete {
        channel: ChannelId,
        message: MessageId,
    },
}

#[derive(Default)]
pub struct MockChat {
    next_id: AtomicU64,
    calls: Mutex<Vec<ChatCall>>,
    live: Mutex<HashMap<ChannelId, Vec<(MessageId, String)>>>,
    broken: Mutex<HashSet<ChannelId>>,
}

impl MockChat {
    /// Make every operation against `channel` fail with a transport error.
    pub fn break_channel(&self, channel: ChannelId) {
        self.broken.lock().unwrap().insert(channel);
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Messages currently live in a channel, in send order.
    pub fn live_messages(&self, channel: ChannelId) -> Vec<MessageId> {
        self.live
            .lock()
            .unwrap()
            .get(&channel)
            .map(|msgs| msgs.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }

    pub fn content_of(&self, channel: ChannelId, message: MessageId) -> Option<String> {
        self.live
            .lock()
            .unwrap()
            .get(&channel)
            .and_then(|msgs| msgs.iter().find(|(id, _)| *id == message))
            .map(|(_, content)| content.clone())
    }

    fn check(&self, channel: ChannelId) -> Result<(), ChatError> {
        if self.broken.lock().unwrap().contains(&channel) {
            return Err(ChatError::Transport("injected failure".into()));
        }
        Ok(())
    }
}

impl ChatTransport for MockChat {
    async fn send(
        &self,
        channel: ChannelId,
        message: &OutboundMessage,
    ) -> Result<MessageId, ChatError> {
        self.check(channel)?;
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.live
            .lock()
            .unwrap()
            .entry(channel)
            .or_default()
            .push((id, message.content.clone()));
        self.calls.lock().unwrap().push(ChatCall::Send {
            channel,
            message: id,
            content: message.content.clone(),
            mention: message.mention,
        });
        Ok(id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: &OutboundMessage,
    ) -> Result<(), ChatError> {
        self.check(channel)?;
        let mut live = self.live.lock().unwrap();
        let entry = live
            .get_mut(&channel)
            .and_then(|msgs| msgs.iter_mut().find(|(id, _)| *id == message))
            .ok_or(ChatError::NotFound)?;
        entry.1 = update.content.clone();
        self.calls.lock().unwrap().push(ChatCall::Edit {
            channel,
            message,
            content: update.content.clone(),
        });
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), ChatError> {
        self.check(channel)?;
        let mut live = self.live.lock().unwrap();
        let messages = live.get_mut(&channel).ok_or(ChatError::NotFound)?;
        let before = messages.len();
        messages.retain(|(id, _)| *id != message);
        if messages.len() == before {
            return Err(ChatError::NotFound);
        }
        self.calls
            .lock()
            .unwrap()
            .push(ChatCall::Delete { channel, message });
        Ok(())
    }
}

/// In-memory status/alert pointer store.
#[derive(Default)]
pub struct MemoryStatusStore {
    status: Mutex<HashMap<ChannelId, MessageId>>,
    alerts: Mutex<HashMap<ChannelId, MessageId>>,
}

impl MemoryStatusStore {
    pub fn preset_status(&self, channel: ChannelId, message: MessageId) {
        self.status.lock().unwrap().insert(channel, message);
    }
}

impl StatusStore for MemoryStatusStore {
    async fn status_message(&self, channel: ChannelId) -> Result<Option<MessageId>, StoreError> {
        Ok(self.status.lock().unwrap().get(&channel).copied())
    }

    async fn set_status_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.status.lock().unwrap().insert(channel, message);
        Ok(())
    }

    async fn clear_status_message(&self, channel: ChannelId) -> Result<(), StoreError> {
        self.status.lock().unwrap().remove(&channel);
        Ok(())
    }

    async fn alert_message(&self, channel: ChannelId) -> Result<Option<MessageId>, StoreError> {
        Ok(self.alerts.lock().unwrap().get(&channel).copied())
    }

    async fn set_alert_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.alerts.lock().unwrap().insert(channel, message);
        Ok(())
    }
}
