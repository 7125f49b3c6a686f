//! Transport boundary: protocol versions, decoded packets and outbound sinks

pub mod packet;
pub mod protocol;
pub mod sink;

pub use packet::ScoreboardPacket;
pub use protocol::{ConnectionId, PlayerId, ProtocolVersion};
pub use sink::{PacketSink, Viewer};
