//! Semantic scoreboard events handed to the host's event bus
//!
//! The core never inspects what subscribers do with an event.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::Serialize;

use crate::net::protocol::PlayerId;
use crate::scoreboard::types::DisplaySlot;

/// Which scoreboard an event was raised by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventSource {
    /// The backend-mirrored scoreboard of the viewer
    Downstream,
    /// A proxy overlay
    Overlay(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EventKind {
    ObjectiveRegistered { objective: String },
    ObjectiveUnregistered { objective: String },
    ObjectiveDisplayed { objective: String, slot: DisplaySlot },
    TeamRegistered { team: String },
    TeamUnregistered { team: String },
    TeamEntryAdded { team: String, entry: String },
    TeamEntryRemoved { team: String, entry: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreboardEvent {
    pub viewer: PlayerId,
    pub source: EventSource,
    pub kind: EventKind,
}

impl ScoreboardEvent {
    pub fn downstream(viewer: PlayerId, kind: EventKind) -> Self {
        Self {
            viewer,
            source: EventSource::Downstream,
            kind,
        }
    }

    pub fn overlay(overlay: u64, viewer: PlayerId, kind: EventKind) -> Self {
        Self {
            viewer,
            source: EventSource::Overlay(overlay),
            kind,
        }
    }
}

/// Event bus boundary
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ScoreboardEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: ScoreboardEvent) {}
}

/// Forwards events into a crossbeam channel drained by the host
///
/// Publishing never blocks; when a bounded channel is full the event is
/// dropped with a warning.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: Sender<ScoreboardEvent>,
}

impl ChannelPublisher {
    pub fn bounded(capacity: usize) -> (Self, Receiver<ScoreboardEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }

    pub fn unbounded() -> (Self, Receiver<ScoreboardEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: ScoreboardEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Event queue full, dropping {:?}", event.kind);
            }
            // Nobody listens anymore
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
