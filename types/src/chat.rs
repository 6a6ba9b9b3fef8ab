//! Outbound chat transport interface.
//!
//! The bot never talks to the chat platform directly from the engine or the
//! tracker; both go through [`ChatTransport`]. Deletes are best-effort by
//! contract: callers are expected to tolerate [`ChatError::NotFound`] and
//! [`ChatError::Forbidden`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChannelId, MessageId, RoleId};

/// Who gets pinged when a message is delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mention {
    #[default]
    None,
    Role(RoleId),
    Everyone,
}

/// A message the bot wants delivered to a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    pub mention: Mention,
}

impl OutboundMessage {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mention: Mention::None,
        }
    }

    pub fn with_mention(content: impl Into<String>, mention: Mention) -> Self {
        Self {
            content: content.into(),
            mention,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// The target message (or channel) no longer exists.
    #[error("message or channel not found")]
    NotFound,
    /// The bot lacks permission for the operation.
    #[error("operation forbidden")]
    Forbidden,
    /// Anything transport-level: timeouts, 5xx, connection resets.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ChatError {
    /// Errors that best-effort deletes are allowed to swallow.
    pub fn is_ignorable_on_delete(&self) -> bool {
        matches!(self, ChatError::NotFound | ChatError::Forbidden)
    }
}

/// Send/edit/delete primitives against the chat platform.
///
/// `send` returns the new message id so callers can track it for later edits
/// or replacement.
pub trait ChatTransport: Send + Sync {
    fn send(
        &self,
        channel: ChannelId,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<MessageId, ChatError>> + Send;

    fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: &OutboundMessage,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;

    fn delete(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;
}
