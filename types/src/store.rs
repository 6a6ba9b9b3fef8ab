//! Per-destination message-id store.
//!
//! Each tracker destination owns two independent slots: the persistent status
//! message (edited in place) and the most recent supplementary alert
//! (replaced on every notable change). Both survive restarts so the bot keeps
//! editing the same status message instead of reposting it.

use std::future::Future;

use thiserror::Error;

use crate::{ChannelId, MessageId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store failure: {0}")]
    Backend(String),
}

pub trait StatusStore: Send + Sync {
    fn status_message(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Option<MessageId>, StoreError>> + Send;

    fn set_status_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn clear_status_message(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn alert_message(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Option<MessageId>, StoreError>> + Send;

    fn set_alert_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
