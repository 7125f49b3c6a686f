//! Outbound packet path to a client connection
//!
//! Emission is fire-and-forget: a sink enqueues the packet for the
//! connection's writer task and never blocks on network I/O. Sinks must
//! preserve the order packets are handed to them.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::net::packet::ScoreboardPacket;
use crate::net::protocol::{ConnectionId, PlayerId, ProtocolVersion};

/// Enqueues packets for one client connection
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: ScoreboardPacket);
}

impl PacketSink for UnboundedSender<ScoreboardPacket> {
    fn send(&self, packet: ScoreboardPacket) {
        if let Err(e) = UnboundedSender::send(self, packet) {
            tracing::debug!("Dropping {} packet, connection writer closed", e.0.kind());
        }
    }
}

/// Handle to a connected player: identity plus outbound queue
#[derive(Clone)]
pub struct Viewer {
    id: PlayerId,
    connection_id: ConnectionId,
    protocol: ProtocolVersion,
    sink: Arc<dyn PacketSink>,
}

impl Viewer {
    pub fn new(
        id: PlayerId,
        connection_id: ConnectionId,
        protocol: ProtocolVersion,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        Self {
            id,
            connection_id,
            protocol,
            sink,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    #[inline]
    pub fn send(&self, packet: impl Into<ScoreboardPacket>) {
        self.sink.send(packet.into());
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("protocol", &self.protocol)
            .finish()
    }
}
