//! Recording doubles for the transport and event-bus boundaries

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::net::packet::{ObjectiveAction, ScoreboardPacket};
use crate::net::protocol::{PlayerId, ProtocolVersion};
use crate::net::sink::{PacketSink, Viewer};
use crate::scoreboard::event::{EventKind, EventPublisher, ScoreboardEvent};
use crate::scoreboard::types::DisplaySlot;

#[derive(Default)]
pub struct RecordingSink {
    packets: Mutex<Vec<ScoreboardPacket>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<ScoreboardPacket> {
        std::mem::take(&mut *self.packets.lock())
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }
}

impl PacketSink for RecordingSink {
    fn send(&self, packet: ScoreboardPacket) {
        self.packets.lock().push(packet);
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ScoreboardEvent>>,
}

impl RecordingPublisher {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind.clone()).collect()
    }

    pub fn events(&self) -> Vec<ScoreboardEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: ScoreboardEvent) {
        self.events.lock().push(event);
    }
}

pub fn viewer(protocol: ProtocolVersion) -> (Viewer, Arc<RecordingSink>) {
    viewer_with_id(Uuid::new_v4(), protocol)
}

pub fn viewer_with_id(id: PlayerId, protocol: ProtocolVersion) -> (Viewer, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (Viewer::new(id, 1, protocol, sink.clone()), sink)
}

/// Objective a client would show in `slot` after receiving `packets`
pub fn shown_in(packets: &[ScoreboardPacket], slot: DisplaySlot) -> Option<String> {
    let mut shown = None;
    for packet in packets {
        match packet {
            ScoreboardPacket::DisplayObjective(p) if p.slot == slot => {
                shown = (!p.is_clear()).then(|| p.objective_name.clone());
            }
            ScoreboardPacket::Objective(p)
                if p.action == ObjectiveAction::Unregister
                    && shown.as_deref() == Some(p.objective_name.as_str()) =>
            {
                shown = None;
            }
            _ => {}
        }
    }
    shown
}
