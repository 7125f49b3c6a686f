//! Scoreboard Sync Library
//!
//! Keeps a client's scoreboard consistent on a multi-backend proxy where
//! both the backend server and the proxy write to it.
//!
//! - [`downstream`] mirrors and validates what the backend sends.
//! - [`overlay`] holds proxy-owned scoreboards and projects them to viewers.
//! - [`registry`] ties both to connected players across server switches.
//!
//! Byte-level encoding is left to the host's codec; this crate works on
//! the decoded packets in [`net::packet`].

pub mod config;
pub mod downstream;
pub mod metrics;
pub mod net;
pub mod overlay;
pub mod registry;
pub mod scoreboard;

#[cfg(test)]
mod testing;

pub use config::ScoreboardConfig;
pub use downstream::{ConnectionEpoch, DownstreamTracker};
pub use overlay::{Overlay, OverlayId, SlotArbiter};
pub use registry::{PacketVerdict, SessionRegistry, SlotOwner};
