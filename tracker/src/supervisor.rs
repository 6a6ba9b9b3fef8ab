//! Feed connection supervision.
//!
//! One long-lived websocket connection to the stock feed. Any connection
//! error is logged and retried after a fixed backoff, forever; the tracker
//! never gives up. The loop holds off until the host signals readiness and
//! observes the shutdown flag inside every wait, so cancellation takes
//! effect promptly rather than at the next reconnect boundary.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{info, warn};
use url::Url;

use inu_types::{ChatTransport, StatusStore};

use crate::destinations::Destination;
use crate::fanout::Dispatcher;
use crate::processor::SnapshotProcessor;

/// Fixed delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(30);

pub struct FeedSupervisor<T, S> {
    url: Url,
    /// Shared so the host can serve the latest snapshot while the listener
    /// keeps ingesting.
    processor: Arc<Mutex<SnapshotProcessor>>,
    dispatcher: Dispatcher<T, S>,
    destinations: Vec<Destination>,
}

impl<T: ChatTransport, S: StatusStore> FeedSupervisor<T, S> {
    pub fn new(
        url: Url,
        processor: Arc<Mutex<SnapshotProcessor>>,
        dispatcher: Dispatcher<T, S>,
        destinations: Vec<Destination>,
    ) -> Self {
        Self {
            url,
            processor,
            dispatcher,
            destinations,
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(mut self, ready: watch::Receiver<bool>, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            _ = wait_for(ready, true) => {}
            _ = wait_for_shutdown(&mut shutdown) => return,
        }
        info!(url = %self.url, "starting stock feed listener");

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => return,
                outcome = self.listen() => match outcome {
                    Ok(()) => warn!("feed stream ended"),
                    Err(err) => warn!(%err, "feed connection error"),
                },
            }
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => return,
                _ = time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    async fn listen(&mut self) -> Result<(), tungstenite::Error> {
        let (mut stream, _) = connect_async(self.url.as_str()).await?;
        info!("connected to stock feed");
        while let Some(message) = stream.next().await {
            match message? {
                Message::Text(text) => self.handle(&text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    async fn handle(&mut self, raw: &str) {
        let Some(update) = self.processor.lock().await.ingest(raw) else {
            return;
        };
        if self.destinations.is_empty() {
            info!("stock changed but no destinations are configured");
            return;
        }
        let reports = self
            .dispatcher
            .dispatch(&update, &self.destinations)
            .await;
        let failed = reports.iter().filter(|r| !r.is_ok()).count();
        info!(
            delivered = reports.len() - failed,
            failed, "stock update fanned out"
        );
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // A dropped sender means the host is going away.
            return;
        }
    }
}

async fn wait_for(mut flag: watch::Receiver<bool>, value: bool) {
    while *flag.borrow_and_update() != value {
        if flag.changed().await.is_err() {
            return;
        }
    }
}
