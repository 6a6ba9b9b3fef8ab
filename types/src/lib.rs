//! Shared vocabulary for the Inu bot core.
//!
//! This crate holds the identifier newtypes used across the engine and the
//! tracker, plus the interfaces of the collaborators the core does not own:
//! the balance ledger, the outbound chat transport, and the per-destination
//! message-id store. The service binary binds real implementations; tests
//! bind mocks.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod chat;
pub mod ledger;
pub mod store;

pub use chat::{ChatError, ChatTransport, Mention, OutboundMessage};
pub use ledger::{Ledger, LedgerError};
pub use store::{StatusStore, StoreError};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// A chat user (player) identifier.
    UserId
);
id_type!(
    /// A chat channel identifier. Channels are the tracker's destinations.
    ChannelId
);
id_type!(
    /// A message identifier, scoped to its channel.
    MessageId
);
id_type!(
    /// A mentionable role identifier.
    RoleId
);
