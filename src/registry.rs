//! Per-player sessions: one downstream tracker plus overlay subscriptions
//!
//! The registry is constructed once and shared by the host. The host calls
//! [`SessionRegistry::connect`] when a player logs in,
//! [`SessionRegistry::handle_downstream`] for every backend scoreboard
//! packet, [`SessionRegistry::on_server_switch`] when the player joins a new
//! backend and [`SessionRegistry::on_disconnect`] when the connection closes.
//!
//! Display slots are arbitrated per player: the subscribed overlay with the
//! highest priority (then the newest) that claims a slot shows it, and the
//! backend's objective shows only in slots no overlay claims.
//!
//! Lock order: session entry, then the overlay map, then a tracker, then an
//! overlay's slot claims. Overlay state locks are taken before any of these
//! and never while a session entry is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::config::ScoreboardConfig;
use crate::downstream::tracker::{ConnectionEpoch, DownstreamTracker, TrackerSnapshot};
use crate::metrics::ScoreboardMetrics;
use crate::net::packet::{DisplayObjectivePacket, ScoreboardPacket};
use crate::net::protocol::{ConnectionId, PlayerId, ProtocolVersion};
use crate::net::sink::{PacketSink, Viewer};
use crate::overlay::{Overlay, OverlayId, SlotArbiter};
use crate::scoreboard::error::{DownstreamViolation, ScoreboardError};
use crate::scoreboard::event::EventPublisher;
use crate::scoreboard::types::DisplaySlot;

/// What the transport should do with a backend packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketVerdict {
    /// Valid; send it on to the client
    Forward,
    /// Contradicts the mirrored state; do not send
    Drop(DownstreamViolation),
    /// Valid and mirrored, but an overlay owns the slot on the client
    Suppress,
}

impl PacketVerdict {
    pub fn should_forward(&self) -> bool {
        matches!(self, PacketVerdict::Forward)
    }
}

/// Who decides what a player sees in a display slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOwner {
    Overlay(OverlayId),
    Downstream,
    Empty,
}

struct Session {
    viewer: Viewer,
    tracker: RwLock<DownstreamTracker>,
    overlays: SmallVec<[OverlayId; 4]>,
}

#[derive(Debug, Serialize)]
struct SessionDump {
    player: PlayerId,
    connection_id: ConnectionId,
    protocol: ProtocolVersion,
    overlays: Vec<OverlayId>,
    downstream: TrackerSnapshot,
}

/// Sessions and overlays, shared with every overlay as its slot arbiter
#[derive(Default)]
struct SessionTable {
    sessions: DashMap<PlayerId, Session>,
    overlays: RwLock<HashMap<OverlayId, Arc<Overlay>>>,
}

impl SessionTable {
    /// Highest-ranked overlay among `ids`, other than `except`, that shows
    /// something in the slot
    fn claimant(&self, ids: &[OverlayId], except: Option<OverlayId>, slot: DisplaySlot) -> Option<Arc<Overlay>> {
        let overlays = self.overlays.read();
        ids.iter()
            .filter(|id| Some(**id) != except)
            .filter_map(|id| overlays.get(id))
            .filter(|overlay| overlay.claims_slot(slot))
            .max_by_key(|overlay| (overlay.priority(), overlay.id()))
            .cloned()
    }
}

impl SlotArbiter for SessionTable {
    fn wins(&self, player: PlayerId, overlay: OverlayId, priority: i32, slot: DisplaySlot) -> bool {
        let Some(session) = self.sessions.get(&player) else {
            return true;
        };
        self.claimant(&session.overlays, Some(overlay), slot)
            .map_or(true, |other| (other.priority(), other.id()) < (priority, overlay))
    }

    fn successor(&self, player: PlayerId, overlay: OverlayId, slot: DisplaySlot) -> Option<String> {
        let session = self.sessions.get(&player)?;
        if let Some(next) = self.claimant(&session.overlays, Some(overlay), slot) {
            return next.display_slot(slot);
        }
        let tracker = session.tracker.read();
        tracker
            .objective_in_slot(slot)
            .map(|objective| objective.name().to_string())
    }
}

/// Registry of connected players and proxy overlays
pub struct SessionRegistry {
    config: ScoreboardConfig,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<ScoreboardMetrics>,
    table: Arc<SessionTable>,
    next_connection_id: AtomicU64,
    next_overlay_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(config: ScoreboardConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            config,
            publisher,
            metrics: Arc::new(ScoreboardMetrics::new()),
            table: Arc::new(SessionTable::default()),
            next_connection_id: AtomicU64::new(1),
            next_overlay_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ScoreboardConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ScoreboardMetrics> {
        &self.metrics
    }

    /// Start tracking a player. A previous session for the same player is
    /// replaced as if it had disconnected.
    pub fn connect(
        &self,
        player: PlayerId,
        protocol: ProtocolVersion,
        sink: Arc<dyn PacketSink>,
    ) -> Viewer {
        if self.table.sessions.contains_key(&player) {
            debug!(player = %player, "Replacing existing session");
            self.on_disconnect(player);
        }

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let viewer = Viewer::new(player, connection_id, protocol, sink);
        let tracker = DownstreamTracker::new(player, self.publisher.clone())
            .with_invalid_logging(self.config.log_invalid_packets);

        self.table.sessions.insert(
            player,
            Session {
                viewer: viewer.clone(),
                tracker: RwLock::new(tracker),
                overlays: SmallVec::new(),
            },
        );
        self.metrics.set_active_sessions(self.table.sessions.len());

        info!(player = %player, connection_id, protocol = %protocol, "Scoreboard session opened");
        viewer
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.table.sessions.contains_key(&player)
    }

    pub fn session_count(&self) -> usize {
        self.table.sessions.len()
    }

    pub fn viewer(&self, player: PlayerId) -> Option<Viewer> {
        self.table
            .sessions
            .get(&player)
            .map(|session| session.viewer.clone())
    }

    /// Read the player's downstream mirror
    pub fn with_tracker<R>(&self, player: PlayerId, f: impl FnOnce(&DownstreamTracker) -> R) -> Option<R> {
        let session = self.table.sessions.get(&player)?;
        let tracker = session.tracker.read();
        Some(f(&*tracker))
    }

    pub fn epoch(&self, player: PlayerId) -> Option<ConnectionEpoch> {
        self.with_tracker(player, DownstreamTracker::epoch)
    }

    /// Mirror a backend packet and decide whether it reaches the client.
    ///
    /// A display packet that moves an objective out of a slot no overlay
    /// claims also clears that slot on the client, which would otherwise
    /// keep showing the objective there.
    pub fn handle_downstream(
        &self,
        player: PlayerId,
        epoch: ConnectionEpoch,
        packet: &ScoreboardPacket,
    ) -> PacketVerdict {
        let Some(session) = self.table.sessions.get(&player) else {
            return PacketVerdict::Forward;
        };

        let (result, moved_from) = {
            let mut tracker = session.tracker.write();
            let moved_from = match packet {
                ScoreboardPacket::DisplayObjective(shown) if !shown.is_clear() => tracker
                    .objective(&shown.objective_name)
                    .and_then(|objective| objective.display_slot())
                    .filter(|old| *old != shown.slot),
                _ => None,
            };
            (tracker.handle_at(epoch, packet), moved_from)
        };

        let verdict = match result {
            Err(violation) => PacketVerdict::Drop(violation),
            Ok(()) => match packet {
                ScoreboardPacket::DisplayObjective(shown)
                    if self.config.suppress_shadowed_display
                        && self.table.claimant(&session.overlays, None, shown.slot).is_some() =>
                {
                    debug!(
                        player = %player,
                        slot = %shown.slot,
                        "Suppressing backend display packet for overlay-owned slot"
                    );
                    PacketVerdict::Suppress
                }
                _ => PacketVerdict::Forward,
            },
        };

        if let Some(old_slot) = moved_from.filter(|_| !matches!(verdict, PacketVerdict::Drop(_))) {
            if self.table.claimant(&session.overlays, None, old_slot).is_none() {
                session.viewer.send(DisplayObjectivePacket::clear(old_slot));
            }
        }

        self.metrics.record_downstream(
            matches!(verdict, PacketVerdict::Drop(_)),
            verdict == PacketVerdict::Suppress,
        );
        verdict
    }

    /// Which source currently owns a slot on the player's screen
    pub fn display_owner(&self, player: PlayerId, slot: DisplaySlot) -> SlotOwner {
        let Some(session) = self.table.sessions.get(&player) else {
            return SlotOwner::Empty;
        };
        if let Some(overlay) = self.table.claimant(&session.overlays, None, slot) {
            return SlotOwner::Overlay(overlay.id());
        }
        if session.tracker.read().objective_in_slot(slot).is_some() {
            SlotOwner::Downstream
        } else {
            SlotOwner::Empty
        }
    }

    /// Register a new overlay. Priority 0 belongs to backend content.
    pub fn create_overlay(
        &self,
        priority: i32,
        owner: impl Into<String>,
    ) -> Result<Arc<Overlay>, ScoreboardError> {
        if priority < 0 {
            return Err(ScoreboardError::NegativePriority(priority));
        }
        if priority == 0 {
            return Err(ScoreboardError::ReservedPriority);
        }

        let id = self.next_overlay_id.fetch_add(1, Ordering::Relaxed);
        let arbiter: Arc<dyn SlotArbiter> = self.table.clone();
        let overlay = Arc::new(Overlay::new(
            id,
            priority,
            owner,
            self.config.max_protocol_version,
            self.publisher.clone(),
            self.metrics.clone(),
            Arc::downgrade(&arbiter),
        ));

        let mut overlays = self.table.overlays.write();
        overlays.insert(id, overlay.clone());
        self.metrics.set_active_overlays(overlays.len());

        info!(overlay = id, owner = overlay.owner(), priority, "Overlay created");
        Ok(overlay)
    }

    pub fn overlay(&self, id: OverlayId) -> Option<Arc<Overlay>> {
        self.table.overlays.read().get(&id).cloned()
    }

    /// All overlays, lowest priority first
    pub fn overlays(&self) -> Vec<Arc<Overlay>> {
        let mut overlays: Vec<Arc<Overlay>> = self.table.overlays.read().values().cloned().collect();
        overlays.sort_by_key(|overlay| (overlay.priority(), overlay.id()));
        overlays
    }

    /// Unsubscribe every viewer of the overlay and forget it
    pub fn remove_overlay(&self, id: OverlayId) -> Result<(), ScoreboardError> {
        let overlay = {
            let mut overlays = self.table.overlays.write();
            let overlay = overlays
                .remove(&id)
                .ok_or(ScoreboardError::UnknownOverlay(id))?;
            self.metrics.set_active_overlays(overlays.len());
            overlay
        };

        for player in overlay.viewer_ids() {
            overlay.remove_viewer(player);
            if let Some(mut session) = self.table.sessions.get_mut(&player) {
                session.overlays.retain(|subscribed| *subscribed != id);
            }
        }

        info!(overlay = id, owner = overlay.owner(), "Overlay removed");
        Ok(())
    }

    /// Show an overlay to a player. Returns false if the player was already
    /// subscribed or their client is too new for overlays.
    pub fn subscribe(&self, player: PlayerId, overlay: OverlayId) -> Result<bool, ScoreboardError> {
        let target = self
            .overlay(overlay)
            .ok_or(ScoreboardError::UnknownOverlay(overlay))?;
        let viewer = self
            .viewer(player)
            .ok_or(ScoreboardError::UnknownPlayer(player))?;

        // The replay consults the session table, so no entry may be held here
        if !target.add_viewer(viewer) {
            return Ok(false);
        }
        match self.table.sessions.get_mut(&player) {
            Some(mut session) => {
                if !session.overlays.contains(&overlay) {
                    session.overlays.push(overlay);
                }
                Ok(true)
            }
            None => {
                // Disconnected during the replay
                target.forget_viewer(player);
                Err(ScoreboardError::UnknownPlayer(player))
            }
        }
    }

    /// Hide an overlay from a player. Returns false if they were not subscribed.
    pub fn unsubscribe(&self, player: PlayerId, overlay: OverlayId) -> Result<bool, ScoreboardError> {
        let target = self
            .overlay(overlay)
            .ok_or(ScoreboardError::UnknownOverlay(overlay))?;

        let removed = target.remove_viewer(player);
        if let Some(mut session) = self.table.sessions.get_mut(&player) {
            session.overlays.retain(|subscribed| *subscribed != overlay);
        }
        Ok(removed)
    }

    pub fn subscriptions(&self, player: PlayerId) -> Vec<OverlayId> {
        self.table
            .sessions
            .get(&player)
            .map(|session| session.overlays.to_vec())
            .unwrap_or_default()
    }

    /// Subscribed overlays that still exist, lowest priority first
    fn subscribed_overlays(&self, ids: &[OverlayId]) -> Vec<Arc<Overlay>> {
        let registered = self.table.overlays.read();
        let mut overlays: Vec<Arc<Overlay>> = ids
            .iter()
            .filter_map(|id| registered.get(id).cloned())
            .collect();
        overlays.sort_by_key(|overlay| (overlay.priority(), overlay.id()));
        overlays
    }

    /// The player joined a new backend: wipe the mirror and replay every
    /// subscribed overlay, lowest priority first.
    ///
    /// Returns the epoch the transport must tag further backend packets
    /// with, or `None` for an unknown player.
    pub fn on_server_switch(&self, player: PlayerId) -> Option<ConnectionEpoch> {
        let (epoch, overlays) = {
            let session = self.table.sessions.get(&player)?;
            let epoch = session.tracker.write().clear();
            (epoch, self.subscribed_overlays(&session.overlays))
        };

        for overlay in &overlays {
            overlay.resend(player);
        }

        info!(
            player = %player,
            epoch = %epoch,
            overlays = overlays.len(),
            "Backend switch, scoreboard reset"
        );
        Some(epoch)
    }

    /// Drop the player's session. Nothing is sent; the connection is gone.
    pub fn on_disconnect(&self, player: PlayerId) -> bool {
        let Some((_, session)) = self.table.sessions.remove(&player) else {
            return false;
        };
        for id in &session.overlays {
            if let Some(overlay) = self.overlay(*id) {
                overlay.forget_viewer(player);
            }
        }
        self.metrics.set_active_sessions(self.table.sessions.len());

        info!(
            player = %player,
            connection_id = session.viewer.connection_id(),
            "Scoreboard session closed"
        );
        true
    }

    /// Human-readable state of the player's mirror and overlays
    pub fn dump(&self, player: PlayerId) -> Option<Vec<String>> {
        let (mut lines, overlays) = {
            let session = self.table.sessions.get(&player)?;
            let lines = session.tracker.read().dump();
            (lines, self.subscribed_overlays(&session.overlays))
        };
        for overlay in overlays {
            lines.extend(overlay.dump());
        }
        Some(lines)
    }

    /// JSON rendering of the player's session, `None` for unknown players
    pub fn dump_json(&self, player: PlayerId) -> Result<Option<String>, serde_json::Error> {
        let Some(session) = self.table.sessions.get(&player) else {
            return Ok(None);
        };
        let dump = SessionDump {
            player,
            connection_id: session.viewer.connection_id(),
            protocol: session.viewer.protocol(),
            overlays: session.overlays.to_vec(),
            downstream: session.tracker.read().snapshot(),
        };
        serde_json::to_string_pretty(&dump).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packet::{DisplayObjectivePacket, ObjectiveAction, ObjectivePacket, ScoreSetPacket};
    use crate::scoreboard::event::NoopPublisher;
    use crate::scoreboard::objective::Objective;
    use crate::scoreboard::types::{HealthDisplay, TextComponent};
    use crate::testing::{shown_in, RecordingSink};
    use uuid::Uuid;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(ScoreboardConfig::default(), Arc::new(NoopPublisher))
    }

    fn connect(registry: &SessionRegistry, protocol: ProtocolVersion) -> (PlayerId, Arc<RecordingSink>) {
        let player = Uuid::new_v4();
        let sink = Arc::new(RecordingSink::default());
        registry.connect(player, protocol, sink.clone());
        (player, sink)
    }

    fn register(name: &str) -> ScoreboardPacket {
        ObjectivePacket {
            action: ObjectiveAction::Register,
            objective_name: name.to_string(),
            title: TextComponent::from(name),
            health_display: HealthDisplay::Integer,
            number_format: None,
        }
        .into()
    }

    fn score(objective: &str, holder: &str, value: i32) -> ScoreboardPacket {
        ScoreSetPacket {
            holder: holder.to_string(),
            objective_name: objective.to_string(),
            value,
            display_name: None,
            number_format: None,
        }
        .into()
    }

    fn show(slot: DisplaySlot, name: &str) -> ScoreboardPacket {
        DisplayObjectivePacket::new(slot, name).into()
    }

    /// Overlay whose objective `name` sits in the sidebar
    fn claiming(registry: &SessionRegistry, priority: i32, name: &str) -> Arc<Overlay> {
        let overlay = registry.create_overlay(priority, name).unwrap();
        overlay
            .register_objective(
                Objective::builder(name)
                    .title(name)
                    .display_slot(DisplaySlot::Sidebar),
            )
            .unwrap();
        overlay
    }

    /// The backend registers `name` and puts it in the sidebar; returns the
    /// verdict on the display packet
    fn backend_sidebar(registry: &SessionRegistry, player: PlayerId, name: &str) -> PacketVerdict {
        let epoch = registry.epoch(player).unwrap();
        assert_eq!(
            registry.handle_downstream(player, epoch, &register(name)),
            PacketVerdict::Forward
        );
        registry.handle_downstream(player, epoch, &show(DisplaySlot::Sidebar, name))
    }

    #[test]
    fn test_handle_downstream_verdicts() {
        let registry = registry();
        let (player, _) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let epoch = registry.epoch(player).unwrap();

        assert_eq!(
            registry.handle_downstream(player, epoch, &register("kills")),
            PacketVerdict::Forward
        );
        let verdict = registry.handle_downstream(player, epoch, &score("missing", "Alice", 1));
        assert!(matches!(verdict, PacketVerdict::Drop(DownstreamViolation::UnknownObjective { .. })));
        assert!(!verdict.should_forward());

        let metrics = registry.metrics().snapshot();
        assert_eq!(metrics.downstream_handled, 2);
        assert_eq!(metrics.downstream_rejected, 1);
    }

    #[test]
    fn test_unknown_player_is_forwarded() {
        let registry = registry();
        let verdict = registry.handle_downstream(Uuid::new_v4(), ConnectionEpoch::default(), &register("kills"));
        assert_eq!(verdict, PacketVerdict::Forward);
    }

    #[test]
    fn test_priority_validation() {
        let registry = registry();
        assert_eq!(
            registry.create_overlay(-1, "test").unwrap_err(),
            ScoreboardError::NegativePriority(-1)
        );
        assert_eq!(
            registry.create_overlay(0, "test").unwrap_err(),
            ScoreboardError::ReservedPriority
        );
        assert!(registry.create_overlay(1, "test").is_ok());
        assert_eq!(registry.metrics().snapshot().active_overlays, 1);
    }

    #[test]
    fn test_subscribe_replays_overlay() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = registry.create_overlay(1, "test").unwrap();
        overlay
            .register_objective(Objective::builder("sidebar").title("Title"))
            .unwrap();

        assert_eq!(registry.subscribe(player, overlay.id()), Ok(true));
        assert_eq!(registry.subscribe(player, overlay.id()), Ok(false));

        assert_eq!(sink.len(), 1);
        assert_eq!(registry.subscriptions(player), vec![overlay.id()]);
    }

    #[test]
    fn test_subscribe_errors() {
        let registry = registry();
        let overlay = registry.create_overlay(1, "test").unwrap();
        let stranger = Uuid::new_v4();

        assert_eq!(
            registry.subscribe(stranger, overlay.id()),
            Err(ScoreboardError::UnknownPlayer(stranger))
        );
        assert_eq!(
            registry.subscribe(stranger, 99),
            Err(ScoreboardError::UnknownOverlay(99))
        );
    }

    #[test]
    fn test_new_protocol_is_not_subscribed() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion(ProtocolVersion::MINECRAFT_1_21.0 + 1));
        let overlay = registry.create_overlay(1, "test").unwrap();
        overlay
            .register_objective(Objective::builder("sidebar").title("Title"))
            .unwrap();

        assert_eq!(registry.subscribe(player, overlay.id()), Ok(false));
        assert!(registry.subscriptions(player).is_empty());
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn test_server_switch_clears_and_replays_by_priority() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let high = registry.create_overlay(10, "high").unwrap();
        let low = registry.create_overlay(1, "low").unwrap();
        high.register_objective(Objective::builder("high").title("High")).unwrap();
        low.register_objective(Objective::builder("low").title("Low")).unwrap();
        registry.subscribe(player, high.id()).unwrap();
        registry.subscribe(player, low.id()).unwrap();
        let old_epoch = registry.epoch(player).unwrap();
        registry.handle_downstream(player, old_epoch, &register("kills"));
        sink.take();

        let epoch = registry.on_server_switch(player).unwrap();

        assert!(epoch > old_epoch);
        assert!(registry.with_tracker(player, |tracker| tracker.is_empty()).unwrap());
        let names: Vec<String> = sink
            .take()
            .into_iter()
            .filter_map(|packet| match packet {
                ScoreboardPacket::Objective(p) => Some(p.objective_name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["low".to_string(), "high".to_string()]);
        assert_eq!(registry.metrics().snapshot().replays, 4);
    }

    #[test]
    fn test_stale_packet_after_switch_is_dropped() {
        let registry = registry();
        let (player, _) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let old_epoch = registry.epoch(player).unwrap();

        let epoch = registry.on_server_switch(player).unwrap();

        let verdict = registry.handle_downstream(player, old_epoch, &register("kills"));
        assert!(matches!(verdict, PacketVerdict::Drop(DownstreamViolation::StaleEpoch { .. })));
        assert!(registry.with_tracker(player, |tracker| tracker.objective("kills").is_none()).unwrap());

        assert_eq!(
            registry.handle_downstream(player, epoch, &register("kills")),
            PacketVerdict::Forward
        );
    }

    #[test]
    fn test_display_owner_and_suppression() {
        let registry = registry();
        let (player, _) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let epoch = registry.epoch(player).unwrap();
        registry.handle_downstream(player, epoch, &register("kills"));

        let display: ScoreboardPacket = DisplayObjectivePacket::new(DisplaySlot::Sidebar, "kills").into();
        assert_eq!(registry.handle_downstream(player, epoch, &display), PacketVerdict::Forward);
        assert_eq!(registry.display_owner(player, DisplaySlot::Sidebar), SlotOwner::Downstream);
        assert_eq!(registry.display_owner(player, DisplaySlot::BelowName), SlotOwner::Empty);

        let low = registry.create_overlay(1, "low").unwrap();
        let high = registry.create_overlay(5, "high").unwrap();
        for overlay in [&low, &high] {
            overlay
                .register_objective(
                    Objective::builder("sidebar")
                        .title("Title")
                        .display_slot(DisplaySlot::Sidebar),
                )
                .unwrap();
            registry.subscribe(player, overlay.id()).unwrap();
        }

        assert_eq!(
            registry.display_owner(player, DisplaySlot::Sidebar),
            SlotOwner::Overlay(high.id())
        );
        assert_eq!(registry.handle_downstream(player, epoch, &display), PacketVerdict::Suppress);
        // Still mirrored
        assert!(registry
            .with_tracker(player, |tracker| tracker.objective_in_slot(DisplaySlot::Sidebar).is_some())
            .unwrap());
        assert_eq!(registry.metrics().snapshot().downstream_suppressed, 1);
    }

    #[test]
    fn test_suppression_can_be_disabled() {
        let config = ScoreboardConfig {
            suppress_shadowed_display: false,
            ..Default::default()
        };
        let registry = SessionRegistry::new(config, Arc::new(NoopPublisher));
        let (player, _) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = registry.create_overlay(1, "test").unwrap();
        overlay
            .register_objective(
                Objective::builder("sidebar")
                    .title("Title")
                    .display_slot(DisplaySlot::Sidebar),
            )
            .unwrap();
        registry.subscribe(player, overlay.id()).unwrap();
        let epoch = registry.epoch(player).unwrap();
        registry.handle_downstream(player, epoch, &register("kills"));

        let display: ScoreboardPacket = DisplayObjectivePacket::new(DisplaySlot::Sidebar, "kills").into();
        assert_eq!(registry.handle_downstream(player, epoch, &display), PacketVerdict::Forward);
    }

    #[test]
    fn test_disconnect_forgets_player() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = registry.create_overlay(1, "test").unwrap();
        overlay
            .register_objective(Objective::builder("sidebar").title("Title"))
            .unwrap();
        registry.subscribe(player, overlay.id()).unwrap();
        sink.take();

        assert!(registry.on_disconnect(player));

        assert!(!registry.is_connected(player));
        assert!(!overlay.has_viewer(player));
        assert_eq!(sink.len(), 0);
        assert!(!registry.on_disconnect(player));
        assert!(registry.on_server_switch(player).is_none());
        assert_eq!(registry.metrics().snapshot().active_sessions, 0);
    }

    #[test]
    fn test_reconnect_replaces_session() {
        let registry = registry();
        let (player, _) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let first = registry.viewer(player).unwrap().connection_id();
        let overlay = registry.create_overlay(1, "test").unwrap();
        registry.subscribe(player, overlay.id()).unwrap();

        registry.connect(player, ProtocolVersion::MINECRAFT_1_21, Arc::new(RecordingSink::default()));

        assert_ne!(registry.viewer(player).unwrap().connection_id(), first);
        assert!(registry.subscriptions(player).is_empty());
        assert!(!overlay.has_viewer(player));
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_remove_overlay_unsubscribes_viewers() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = registry.create_overlay(1, "test").unwrap();
        overlay
            .register_objective(Objective::builder("sidebar").title("Title"))
            .unwrap();
        registry.subscribe(player, overlay.id()).unwrap();
        sink.take();

        registry.remove_overlay(overlay.id()).unwrap();

        assert_eq!(sink.len(), 1);
        assert!(registry.subscriptions(player).is_empty());
        assert!(registry.overlay(overlay.id()).is_none());
        assert_eq!(
            registry.remove_overlay(overlay.id()),
            Err(ScoreboardError::UnknownOverlay(overlay.id()))
        );
    }

    #[test]
    fn test_unsubscribe() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = registry.create_overlay(1, "test").unwrap();
        overlay
            .register_objective(Objective::builder("sidebar").title("Title"))
            .unwrap();
        registry.subscribe(player, overlay.id()).unwrap();
        sink.take();

        assert_eq!(registry.unsubscribe(player, overlay.id()), Ok(true));
        assert_eq!(registry.unsubscribe(player, overlay.id()), Ok(false));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_dumps() {
        let registry = registry();
        let (player, _) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let epoch = registry.epoch(player).unwrap();
        registry.handle_downstream(player, epoch, &register("kills"));
        registry.handle_downstream(player, epoch, &score("kills", "Alice", 3));

        let lines = registry.dump(player).unwrap();
        assert!(lines.iter().any(|line| line.contains("Alice: 3")));

        let json = registry.dump_json(player).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["downstream"]["objectives"][0]["name"], "kills");
        assert!(registry.dump_json(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_higher_priority_overlay_keeps_slot() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let high = claiming(&registry, 10, "hi");
        let low = claiming(&registry, 1, "lo");

        registry.subscribe(player, high.id()).unwrap();
        registry.subscribe(player, low.id()).unwrap();

        let mut received = sink.take();
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("hi".to_string()));
        assert_eq!(
            registry.display_owner(player, DisplaySlot::Sidebar),
            SlotOwner::Overlay(high.id())
        );

        low.set_display_slot(DisplaySlot::Sidebar, "lo").unwrap();
        low.register_objective(
            Objective::builder("lo2")
                .title("lo2")
                .display_slot(DisplaySlot::Sidebar),
        )
        .unwrap();
        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("hi".to_string()));

        registry.on_server_switch(player).unwrap();
        assert_eq!(shown_in(&sink.take(), DisplaySlot::Sidebar), Some("hi".to_string()));
    }

    #[test]
    fn test_unsubscribing_winner_hands_slot_to_next_overlay() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let low = claiming(&registry, 1, "lo");
        let high = claiming(&registry, 10, "hi");
        registry.subscribe(player, low.id()).unwrap();
        registry.subscribe(player, high.id()).unwrap();
        let mut received = sink.take();
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("hi".to_string()));

        registry.unsubscribe(player, high.id()).unwrap();
        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("lo".to_string()));

        assert!(low.clear_display_slot(DisplaySlot::Sidebar));
        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), None);
        assert_eq!(registry.display_owner(player, DisplaySlot::Sidebar), SlotOwner::Empty);
    }

    #[test]
    fn test_unsubscribe_restores_backend_display() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = claiming(&registry, 1, "overlay");
        registry.subscribe(player, overlay.id()).unwrap();
        assert_eq!(backend_sidebar(&registry, player, "kills"), PacketVerdict::Suppress);
        let mut received = sink.take();
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("overlay".to_string()));

        registry.unsubscribe(player, overlay.id()).unwrap();

        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("kills".to_string()));
        assert_eq!(registry.display_owner(player, DisplaySlot::Sidebar), SlotOwner::Downstream);
    }

    #[test]
    fn test_remove_overlay_restores_backend_display() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = claiming(&registry, 1, "overlay");
        registry.subscribe(player, overlay.id()).unwrap();
        backend_sidebar(&registry, player, "kills");
        let mut received = sink.take();

        registry.remove_overlay(overlay.id()).unwrap();

        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("kills".to_string()));
    }

    #[test]
    fn test_overlay_release_restores_backend_display() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = claiming(&registry, 1, "overlay");
        registry.subscribe(player, overlay.id()).unwrap();
        backend_sidebar(&registry, player, "kills");
        let mut received = sink.take();

        assert!(overlay.clear_display_slot(DisplaySlot::Sidebar));
        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("kills".to_string()));

        overlay.set_display_slot(DisplaySlot::Sidebar, "overlay").unwrap();
        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("overlay".to_string()));

        overlay.unregister_objective("overlay").unwrap();
        received.extend(sink.take());
        assert_eq!(shown_in(&received, DisplaySlot::Sidebar), Some("kills".to_string()));
    }

    #[test]
    fn test_overlay_moving_objective_restores_backend_display() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = claiming(&registry, 1, "overlay");
        registry.subscribe(player, overlay.id()).unwrap();
        backend_sidebar(&registry, player, "kills");
        sink.take();

        overlay.set_display_slot(DisplaySlot::PlayerList, "overlay").unwrap();

        assert_eq!(
            sink.take(),
            vec![
                show(DisplaySlot::Sidebar, "kills"),
                show(DisplaySlot::PlayerList, "overlay"),
            ]
        );
    }

    #[test]
    fn test_backend_moving_objective_clears_old_slot() {
        let registry = registry();
        let (player, sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let epoch = registry.epoch(player).unwrap();
        assert_eq!(backend_sidebar(&registry, player, "kills"), PacketVerdict::Forward);

        let verdict = registry.handle_downstream(player, epoch, &show(DisplaySlot::PlayerList, "kills"));

        assert_eq!(verdict, PacketVerdict::Forward);
        assert_eq!(sink.take(), vec![show(DisplaySlot::Sidebar, "")]);

        // An overlay-owned slot is left alone
        let (other, other_sink) = connect(&registry, ProtocolVersion::MINECRAFT_1_21);
        let overlay = claiming(&registry, 1, "overlay");
        registry.subscribe(other, overlay.id()).unwrap();
        backend_sidebar(&registry, other, "kills");
        other_sink.take();

        let epoch = registry.epoch(other).unwrap();
        registry.handle_downstream(other, epoch, &show(DisplaySlot::PlayerList, "kills"));

        assert_eq!(other_sink.len(), 0);
    }
}
