//! Proxy-owned scoreboards projected onto subscribed players
//!
//! An [`Overlay`] owns its objectives, teams and scores independently of
//! whatever the backend shows. Every mutation is pushed to all current
//! viewers; a new viewer receives a full replay of the current state.
//!
//! State and viewer set share one lock, and packets are handed to the
//! viewers' sinks while it is held. A viewer subscribing concurrently with
//! a mutation therefore sees either the state before it or after it, and
//! per-viewer packet order matches the order of mutations.
//!
//! Display slots are shared with the backend and with other overlays. An
//! overlay only sends a slot packet to a viewer when its [`SlotArbiter`]
//! says it wins that slot for the viewer, and hands the slot back to the
//! next claimant when it stops showing something there.

use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::metrics::ScoreboardMetrics;
use crate::net::packet::{DisplayObjectivePacket, ObjectivePacket, ScoreboardPacket, TeamPacket};
use crate::net::protocol::{PlayerId, ProtocolVersion};
use crate::net::sink::Viewer;
use crate::scoreboard::error::ScoreboardError;
use crate::scoreboard::event::{EventKind, EventPublisher, ScoreboardEvent};
use crate::scoreboard::objective::{Objective, ObjectiveBuilder, ObjectiveUpdate};
use crate::scoreboard::score::Score;
use crate::scoreboard::team::{Team, TeamBuilder};
use crate::scoreboard::types::{DisplaySlot, Entries, TeamProperties};

pub type OverlayId = u64;

/// Decides, per player, who shows what in a display slot.
///
/// Called while the asking overlay holds its own lock, so implementations
/// must not lock any overlay's state.
pub trait SlotArbiter: Send + Sync {
    /// Whether the overlay's claim on `slot` beats every other claim the
    /// player can see
    fn wins(&self, player: PlayerId, overlay: OverlayId, priority: i32, slot: DisplaySlot) -> bool;

    /// Objective the player should see in `slot` once `overlay` stops
    /// showing something there
    fn successor(&self, player: PlayerId, overlay: OverlayId, slot: DisplaySlot) -> Option<String>;
}

/// Arbitration for an overlay outside any registry: it owns every slot it claims
struct Unarbitrated;

impl SlotArbiter for Unarbitrated {
    fn wins(&self, _: PlayerId, _: OverlayId, _: i32, _: DisplaySlot) -> bool {
        true
    }

    fn successor(&self, _: PlayerId, _: OverlayId, _: DisplaySlot) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct OverlayState {
    objectives: HashMap<String, Objective>,
    teams: HashMap<String, Team>,
    display_slots: HashMap<DisplaySlot, String>,
    viewers: HashMap<PlayerId, Viewer>,
}

impl OverlayState {
    /// Put the objective in the slot, detaching it from any other slot and
    /// detaching the slot's previous occupant. Returns the slot the
    /// objective left.
    fn install_slot(&mut self, slot: DisplaySlot, name: &str) -> Option<DisplaySlot> {
        let moved_from = self
            .objectives
            .get(name)
            .and_then(Objective::display_slot)
            .filter(|old| *old != slot);
        if let Some(old_slot) = moved_from {
            self.display_slots.remove(&old_slot);
        }
        if let Some(previous) = self.display_slots.insert(slot, name.to_string()) {
            if previous != name {
                if let Some(objective) = self.objectives.get_mut(&previous) {
                    objective.set_display_slot(None);
                }
            }
        }
        if let Some(objective) = self.objectives.get_mut(name) {
            objective.set_display_slot(Some(slot));
        }
        moved_from
    }

    fn evict_slot(&mut self, slot: DisplaySlot) -> Option<String> {
        let previous = self.display_slots.remove(&slot)?;
        if let Some(objective) = self.objectives.get_mut(&previous) {
            objective.set_display_slot(None);
        }
        Some(previous)
    }

    /// Send the whole state to one viewer: teams, then objectives each
    /// followed by its slot (where `shows` allows it) and scores
    fn replay(&self, viewer: &Viewer, shows: impl Fn(DisplaySlot) -> bool) -> usize {
        let mut sent = 0;
        for team in self.teams.values() {
            viewer.send(TeamPacket::register(team));
            sent += 1;
        }
        for objective in self.objectives.values() {
            viewer.send(ObjectivePacket::register(objective));
            sent += 1;
            if let Some(slot) = objective.display_slot().filter(|slot| shows(*slot)) {
                viewer.send(DisplayObjectivePacket::new(slot, objective.name()));
                sent += 1;
            }
            for score in objective.scores() {
                viewer.send(ScoreboardPacket::score_set(
                    viewer.protocol(),
                    objective.name(),
                    score,
                ));
                sent += 1;
            }
        }
        sent
    }

    fn unregister_all(&self, viewer: &Viewer) -> usize {
        for name in self.teams.keys() {
            viewer.send(TeamPacket::unregister(name.as_str()));
        }
        for name in self.objectives.keys() {
            viewer.send(ObjectivePacket::unregister(name.as_str()));
        }
        self.teams.len() + self.objectives.len()
    }
}

/// A proxy-owned scoreboard with its own subscriber set
pub struct Overlay {
    id: OverlayId,
    priority: i32,
    owner: String,
    max_protocol: ProtocolVersion,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<ScoreboardMetrics>,
    arbiter: Weak<dyn SlotArbiter>,
    state: Mutex<OverlayState>,
    /// Copy of the slot map readable without `state`, for arbitration
    claims: RwLock<HashMap<DisplaySlot, String>>,
}

impl Overlay {
    pub(crate) fn new(
        id: OverlayId,
        priority: i32,
        owner: impl Into<String>,
        max_protocol: ProtocolVersion,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<ScoreboardMetrics>,
        arbiter: Weak<dyn SlotArbiter>,
    ) -> Self {
        Self {
            id,
            priority,
            owner: owner.into(),
            max_protocol,
            publisher,
            metrics,
            arbiter,
            state: Mutex::new(OverlayState::default()),
            claims: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn broadcast(&self, state: &OverlayState, packet: impl Fn(&Viewer) -> ScoreboardPacket) {
        for viewer in state.viewers.values() {
            viewer.send(packet(viewer));
        }
        self.metrics.record_overlay_packets(state.viewers.len());
    }

    fn notify(&self, state: &OverlayState, kind: impl Fn() -> EventKind) {
        for viewer in state.viewers.keys() {
            self.publisher
                .publish(ScoreboardEvent::overlay(self.id, *viewer, kind()));
        }
    }

    fn arbiter(&self) -> Arc<dyn SlotArbiter> {
        match self.arbiter.upgrade() {
            Some(arbiter) => arbiter,
            None => Arc::new(Unarbitrated),
        }
    }

    fn sync_claims(&self, state: &OverlayState) {
        *self.claims.write() = state.display_slots.clone();
    }

    fn show_in_slot(&self, state: &mut OverlayState, slot: DisplaySlot, name: &str) {
        let arbiter = self.arbiter();
        let moved_from = state.install_slot(slot, name);
        self.sync_claims(state);
        if let Some(old_slot) = moved_from {
            self.release_slot(state, arbiter.as_ref(), old_slot, true);
        }

        let packet = DisplayObjectivePacket::new(slot, name);
        let mut sent = 0;
        for viewer in state.viewers.values() {
            if arbiter.wins(viewer.id(), self.id, self.priority, slot) {
                viewer.send(packet.clone());
                sent += 1;
            }
        }
        self.metrics.record_overlay_packets(sent);
        self.notify(state, || EventKind::ObjectiveDisplayed {
            objective: name.to_string(),
            slot,
        });
    }

    /// This overlay stopped showing anything in `slot`; every viewer it was
    /// winning the slot for gets the next claimant's objective. With no
    /// successor the slot is cleared if `vacate` is set.
    fn release_slot(&self, state: &OverlayState, arbiter: &dyn SlotArbiter, slot: DisplaySlot, vacate: bool) {
        let sent = state
            .viewers
            .values()
            .filter(|viewer| self.hand_over(arbiter, viewer, slot, vacate))
            .count();
        self.metrics.record_overlay_packets(sent);
    }

    fn hand_over(&self, arbiter: &dyn SlotArbiter, viewer: &Viewer, slot: DisplaySlot, vacate: bool) -> bool {
        if !arbiter.wins(viewer.id(), self.id, self.priority, slot) {
            return false;
        }
        match arbiter.successor(viewer.id(), self.id, slot) {
            Some(next) => {
                debug!(
                    overlay = self.id,
                    player = %viewer.id(),
                    slot = %slot,
                    objective = %next,
                    "Handing slot over"
                );
                viewer.send(DisplayObjectivePacket::new(slot, next));
            }
            None if vacate => viewer.send(DisplayObjectivePacket::clear(slot)),
            None => return false,
        }
        true
    }

    /// Build and register an objective, showing it in the builder's slot if
    /// one was requested
    pub fn register_objective(&self, builder: ObjectiveBuilder) -> Result<(), ScoreboardError> {
        let slot = builder.requested_slot();
        let objective = builder.build()?;
        let name = objective.name().to_string();

        let mut state = self.state.lock();
        if state.objectives.contains_key(&name) {
            return Err(ScoreboardError::ObjectiveExists(name));
        }

        let packet = ObjectivePacket::register(&objective);
        state.objectives.insert(name.clone(), objective);
        self.broadcast(&state, |_| packet.clone().into());
        self.notify(&state, || EventKind::ObjectiveRegistered {
            objective: name.clone(),
        });

        if let Some(slot) = slot {
            self.show_in_slot(&mut state, slot, &name);
        }

        debug!(overlay = self.id, objective = %name, "Registered objective");
        Ok(())
    }

    pub fn unregister_objective(&self, name: &str) -> Result<(), ScoreboardError> {
        let mut state = self.state.lock();
        let Some(removed) = state.objectives.remove(name) else {
            return Err(ScoreboardError::UnknownObjective(name.to_string()));
        };
        state.display_slots.retain(|_, occupant| occupant != name);
        self.sync_claims(&state);

        self.broadcast(&state, |_| ObjectivePacket::unregister(name).into());
        // The client empties the slot itself on unregister
        if let Some(slot) = removed.display_slot() {
            self.release_slot(&state, self.arbiter().as_ref(), slot, false);
        }
        self.notify(&state, || EventKind::ObjectiveUnregistered {
            objective: name.to_string(),
        });
        debug!(overlay = self.id, objective = %name, "Unregistered objective");
        Ok(())
    }

    /// Change title, health display or number format of an objective
    pub fn update_objective(&self, name: &str, update: &ObjectiveUpdate) -> Result<(), ScoreboardError> {
        let mut state = self.state.lock();
        let objective = state
            .objectives
            .get_mut(name)
            .ok_or_else(|| ScoreboardError::UnknownObjective(name.to_string()))?;
        objective.apply(update);
        let packet = ObjectivePacket::update(objective);

        self.broadcast(&state, |_| packet.clone().into());
        Ok(())
    }

    /// Show the objective in a slot, detaching whatever occupied it before
    pub fn set_display_slot(&self, slot: DisplaySlot, objective: &str) -> Result<(), ScoreboardError> {
        let mut state = self.state.lock();
        if !state.objectives.contains_key(objective) {
            return Err(ScoreboardError::UnknownObjective(objective.to_string()));
        }
        self.show_in_slot(&mut state, slot, objective);
        Ok(())
    }

    /// Stop showing anything in a slot. Viewers see the next claimant's
    /// objective, or an empty slot. Returns false if nothing was shown there.
    pub fn clear_display_slot(&self, slot: DisplaySlot) -> bool {
        let mut state = self.state.lock();
        if state.evict_slot(slot).is_none() {
            return false;
        }
        self.sync_claims(&state);
        self.release_slot(&state, self.arbiter().as_ref(), slot, true);
        true
    }

    /// Score of the holder, created with `value` if it does not exist yet.
    ///
    /// An existing score is returned unchanged and nothing is sent.
    pub fn find_or_create_score(
        &self,
        objective: &str,
        holder: &str,
        value: i32,
    ) -> Result<Score, ScoreboardError> {
        if holder.is_empty() {
            return Err(ScoreboardError::InvalidName(holder.to_string()));
        }
        let mut state = self.state.lock();
        let target = state
            .objectives
            .get_mut(objective)
            .ok_or_else(|| ScoreboardError::UnknownObjective(objective.to_string()))?;
        if let Some(existing) = target.score(holder) {
            return Ok(existing.clone());
        }
        let score = target.set_score(holder, value, None, None).clone();

        self.broadcast(&state, |viewer| {
            ScoreboardPacket::score_set(viewer.protocol(), objective, &score)
        });
        Ok(score)
    }

    /// Create or update a score. Overrides left `None` keep their current value.
    pub fn set_score(&self, objective: &str, score: Score) -> Result<(), ScoreboardError> {
        if score.holder.is_empty() {
            return Err(ScoreboardError::InvalidName(score.holder));
        }
        let mut state = self.state.lock();
        let target = state
            .objectives
            .get_mut(objective)
            .ok_or_else(|| ScoreboardError::UnknownObjective(objective.to_string()))?;
        let stored = target
            .set_score(
                &score.holder,
                score.value,
                score.display_name.as_ref(),
                score.number_format.as_ref(),
            )
            .clone();

        self.broadcast(&state, |viewer| {
            ScoreboardPacket::score_set(viewer.protocol(), objective, &stored)
        });
        Ok(())
    }

    /// Returns whether the holder had a score
    pub fn remove_score(&self, objective: &str, holder: &str) -> Result<bool, ScoreboardError> {
        let mut state = self.state.lock();
        let target = state
            .objectives
            .get_mut(objective)
            .ok_or_else(|| ScoreboardError::UnknownObjective(objective.to_string()))?;
        if target.remove_score(holder).is_none() {
            return Ok(false);
        }

        self.broadcast(&state, |viewer| {
            ScoreboardPacket::score_reset(viewer.protocol(), Some(objective), holder)
        });
        Ok(true)
    }

    /// Build and register a team. Its entries leave any other team of this overlay.
    pub fn register_team(&self, builder: TeamBuilder) -> Result<(), ScoreboardError> {
        let team = builder.build()?;
        let name = team.name().to_string();

        let mut state = self.state.lock();
        if state.teams.contains_key(&name) {
            return Err(ScoreboardError::TeamExists(name));
        }

        let entries: Vec<String> = team.entries().cloned().collect();
        for other in state.teams.values_mut() {
            other.remove_entries(&entries);
        }
        let packet = TeamPacket::register(&team);
        state.teams.insert(name.clone(), team);

        self.broadcast(&state, |_| packet.clone().into());
        self.notify(&state, || EventKind::TeamRegistered { team: name.clone() });
        debug!(overlay = self.id, team = %name, "Registered team");
        Ok(())
    }

    pub fn unregister_team(&self, name: &str) -> Result<(), ScoreboardError> {
        let mut state = self.state.lock();
        if state.teams.remove(name).is_none() {
            return Err(ScoreboardError::UnknownTeam(name.to_string()));
        }

        self.broadcast(&state, |_| TeamPacket::unregister(name).into());
        self.notify(&state, || EventKind::TeamUnregistered {
            team: name.to_string(),
        });
        debug!(overlay = self.id, team = %name, "Unregistered team");
        Ok(())
    }

    pub fn update_team(&self, name: &str, properties: TeamProperties) -> Result<(), ScoreboardError> {
        let mut state = self.state.lock();
        let team = state
            .teams
            .get_mut(name)
            .ok_or_else(|| ScoreboardError::UnknownTeam(name.to_string()))?;
        team.properties = properties.clone();

        self.broadcast(&state, |_| TeamPacket::update(name, properties.clone()).into());
        Ok(())
    }

    /// Add entries to a team, taking them out of every other team here.
    ///
    /// Clients move the entries themselves on receiving the add packet.
    pub fn add_team_entries<I, S>(&self, name: &str, entries: I) -> Result<(), ScoreboardError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Entries = entries.into_iter().map(Into::into).collect();
        if let Some(empty) = entries.iter().find(|entry| entry.is_empty()) {
            return Err(ScoreboardError::InvalidName(empty.clone()));
        }

        let mut state = self.state.lock();
        if !state.teams.contains_key(name) {
            return Err(ScoreboardError::UnknownTeam(name.to_string()));
        }
        for team in state.teams.values_mut() {
            team.remove_entries(&entries);
        }
        if let Some(team) = state.teams.get_mut(name) {
            team.add_entries(&entries);
        }

        self.broadcast(&state, |_| TeamPacket::add_entries(name, entries.clone()).into());
        for entry in &entries {
            self.notify(&state, || EventKind::TeamEntryAdded {
                team: name.to_string(),
                entry: entry.clone(),
            });
        }
        Ok(())
    }

    /// Remove entries from a team. Non-members are skipped; returns how
    /// many were removed.
    pub fn remove_team_entries<I, S>(&self, name: &str, entries: I) -> Result<usize, ScoreboardError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        let team = state
            .teams
            .get_mut(name)
            .ok_or_else(|| ScoreboardError::UnknownTeam(name.to_string()))?;
        let members: Entries = entries
            .into_iter()
            .map(Into::into)
            .filter(|entry: &String| team.has_entry(entry))
            .collect();
        team.remove_entries(&members);

        if !members.is_empty() {
            self.broadcast(&state, |_| TeamPacket::remove_entries(name, members.clone()).into());
            for entry in &members {
                self.notify(&state, || EventKind::TeamEntryRemoved {
                    team: name.to_string(),
                    entry: entry.clone(),
                });
            }
        }
        Ok(members.len())
    }

    /// Subscribe a player and replay the full state to them.
    ///
    /// Returns false for players already subscribed and for clients newer
    /// than the supported protocol.
    pub fn add_viewer(&self, viewer: Viewer) -> bool {
        if viewer.protocol() > self.max_protocol {
            debug!(
                overlay = self.id,
                player = %viewer.id(),
                protocol = %viewer.protocol(),
                "Skipping viewer with unsupported protocol"
            );
            return false;
        }

        let mut state = self.state.lock();
        if state.viewers.contains_key(&viewer.id()) {
            debug!(overlay = self.id, player = %viewer.id(), "Player is already viewing");
            return false;
        }

        let arbiter = self.arbiter();
        let sent = state.replay(&viewer, |slot| {
            arbiter.wins(viewer.id(), self.id, self.priority, slot)
        });
        self.metrics.record_overlay_packets(sent);
        self.metrics.record_replay();
        debug!(overlay = self.id, player = %viewer.id(), packets = sent, "Added viewer");
        state.viewers.insert(viewer.id(), viewer);
        true
    }

    /// Unsubscribe a player, unregistering this overlay's teams and
    /// objectives on their client only. Slots this overlay was showing to
    /// them go to the next claimant.
    pub fn remove_viewer(&self, player: PlayerId) -> bool {
        let mut state = self.state.lock();
        let Some(viewer) = state.viewers.remove(&player) else {
            return false;
        };
        let mut sent = state.unregister_all(&viewer);
        let arbiter = self.arbiter();
        for slot in state.display_slots.keys() {
            if self.hand_over(arbiter.as_ref(), &viewer, *slot, false) {
                sent += 1;
            }
        }
        self.metrics.record_overlay_packets(sent);
        debug!(overlay = self.id, player = %player, "Removed viewer");
        true
    }

    /// Drop a player whose connection is gone, sending nothing
    pub fn forget_viewer(&self, player: PlayerId) -> bool {
        self.state.lock().viewers.remove(&player).is_some()
    }

    /// Replay the full state to a subscribed player whose client was reset
    pub fn resend(&self, player: PlayerId) -> bool {
        let state = self.state.lock();
        let Some(viewer) = state.viewers.get(&player) else {
            return false;
        };
        let arbiter = self.arbiter();
        let sent = state.replay(viewer, |slot| {
            arbiter.wins(player, self.id, self.priority, slot)
        });
        self.metrics.record_overlay_packets(sent);
        self.metrics.record_replay();
        true
    }

    pub fn objective(&self, name: &str) -> Option<Objective> {
        self.state.lock().objectives.get(name).cloned()
    }

    pub fn team(&self, name: &str) -> Option<Team> {
        self.state.lock().teams.get(name).cloned()
    }

    pub fn objective_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().objectives.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn team_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().teams.keys().cloned().collect();
        names.sort();
        names
    }

    /// Objective shown in the slot
    pub fn display_slot(&self, slot: DisplaySlot) -> Option<String> {
        self.claims.read().get(&slot).cloned()
    }

    /// Does not take the state lock
    pub fn claims_slot(&self, slot: DisplaySlot) -> bool {
        self.claims.read().contains_key(&slot)
    }

    pub fn viewer_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.state.lock().viewers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn has_viewer(&self, player: PlayerId) -> bool {
        self.state.lock().viewers.contains_key(&player)
    }

    pub fn viewer_count(&self) -> usize {
        self.state.lock().viewers.len()
    }

    pub fn dump(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut lines = vec![format!(
            "--- Overlay {} of {} (priority {}, {} viewers) ---",
            self.id,
            self.owner,
            self.priority,
            state.viewers.len()
        )];

        let mut teams: Vec<&Team> = state.teams.values().collect();
        teams.sort_by(|a, b| a.name().cmp(b.name()));
        lines.push(format!("Teams ({}):", teams.len()));
        lines.extend(teams.into_iter().flat_map(Team::dump));

        let mut objectives: Vec<&Objective> = state.objectives.values().collect();
        objectives.sort_by(|a, b| a.name().cmp(b.name()));
        lines.push(format!("Objectives ({}):", objectives.len()));
        lines.extend(objectives.into_iter().flat_map(Objective::dump));

        lines
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .finish()
    }
}
