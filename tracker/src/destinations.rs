//! Tracker destinations and their mention policy.

use serde::{Deserialize, Serialize};

use inu_types::{ChannelId, Mention, RoleId};

/// The one legacy destination that still receives a broadcast mention on
/// notable alerts. Every other destination must configure a ping role.
pub const LEGACY_BROADCAST_DESTINATION: ChannelId = ChannelId(1_382_226_403_889_647_746);

/// One output channel receiving tracker updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub channel: ChannelId,
    /// Role pinged on notable alerts, when configured.
    pub ping_role: Option<RoleId>,
}

impl Destination {
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            ping_role: None,
        }
    }

    pub fn with_ping_role(channel: ChannelId, role: RoleId) -> Self {
        Self {
            channel,
            ping_role: Some(role),
        }
    }

    /// Pure function of the destination config: configured role first, the
    /// legacy broadcast destination second, silence otherwise.
    pub fn mention(&self) -> Mention {
        if let Some(role) = self.ping_role {
            return Mention::Role(role);
        }
        if self.channel == LEGACY_BROADCAST_DESTINATION {
            return Mention::Everyone;
        }
        Mention::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_role_wins() {
        let destination = Destination::with_ping_role(LEGACY_BROADCAST_DESTINATION, RoleId(9));
        assert_eq!(destination.mention(), Mention::Role(RoleId(9)));
    }

    #[test]
    fn test_legacy_destination_broadcasts() {
        let destination = Destination::new(LEGACY_BROADCAST_DESTINATION);
        assert_eq!(destination.mention(), Mention::Everyone);
    }

    #[test]
    fn test_everyone_else_stays_silent() {
        let destination = Destination::new(ChannelId(42));
        assert_eq!(destination.mention(), Mention::None);
    }
}
