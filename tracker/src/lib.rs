//! Live shop-stock tracker.
//!
//! A persistent websocket feed delivers shop snapshots; the processor drops
//! duplicates by fingerprint and turns real changes into updates; the
//! dispatcher fans each update out to every configured destination
//! concurrently, editing a persistent status message in place and replacing
//! the supplementary alert so at most one is ever live per destination.
//!
//! ## Failure isolation
//! - A malformed payload is logged and dropped; nothing mutates.
//! - A failing destination never delays or aborts its siblings, and is not
//!   retried: the next change cycle self-heals by resending.
//! - The feed connection reconnects forever on a fixed backoff and shuts
//!   down promptly when asked.

pub mod dedupe;
pub mod destinations;
pub mod fanout;
pub mod processor;
pub mod render;
pub mod snapshot;
pub mod supervisor;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod pipeline_tests;

pub use destinations::{Destination, LEGACY_BROADCAST_DESTINATION};
pub use fanout::{DeliveryError, DeliveryReport, Dispatcher};
pub use processor::{NotableList, SnapshotProcessor, StockUpdate};
pub use snapshot::{parse_snapshot, Category, StockItem, StockSnapshot, WeatherEvent};
pub use supervisor::{FeedSupervisor, RECONNECT_DELAY};
