use serde::{Deserialize, Serialize};

/// Stable player identity used as the key of every per-player map
pub type PlayerId = uuid::Uuid;

/// Monotonic id of one client connection, assigned by the registry
pub type ConnectionId = u64;

/// Client protocol version number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u32);

impl ProtocolVersion {
    pub const MINECRAFT_1_20_2: ProtocolVersion = ProtocolVersion(764);
    /// First version with split score set/reset packets and number formats
    pub const MINECRAFT_1_20_3: ProtocolVersion = ProtocolVersion(765);
    pub const MINECRAFT_1_20_5: ProtocolVersion = ProtocolVersion(766);
    pub const MINECRAFT_1_21: ProtocolVersion = ProtocolVersion(767);

    /// Whether the client understands score set/reset packets and number formats
    pub fn has_split_scores(&self) -> bool {
        *self >= Self::MINECRAFT_1_20_3
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
