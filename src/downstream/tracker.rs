//! Mirror of what the backend server believes the client displays
//!
//! Every scoreboard packet the backend sends is applied here before it is
//! forwarded. A packet that contradicts the mirror (unknown or duplicate
//! names) is reported as a [`DownstreamViolation`] and leaves the mirror
//! untouched, so the caller can drop it.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::net::packet::{
    DisplayObjectivePacket, ObjectiveAction, ObjectivePacket, ScoreAction, ScoreboardPacket,
    TeamAction, TeamPacket,
};
use crate::net::protocol::PlayerId;
use crate::scoreboard::error::DownstreamViolation;
use crate::scoreboard::event::{EventKind, EventPublisher, ScoreboardEvent};
use crate::scoreboard::objective::{Objective, ObjectiveUpdate};
use crate::scoreboard::score::Score;
use crate::scoreboard::team::Team;
use crate::scoreboard::types::{
    DisplaySlot, HealthDisplay, NumberFormat, TeamProperties, TextComponent,
};

/// Generation of the backend connection a packet belongs to.
///
/// Bumped by every [`DownstreamTracker::clear`]; packets tagged with an older
/// epoch are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnectionEpoch(pub u64);

impl ConnectionEpoch {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for ConnectionEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-player mirror of the backend's scoreboard
pub struct DownstreamTracker {
    viewer: PlayerId,
    publisher: Arc<dyn EventPublisher>,
    log_invalid: bool,
    epoch: ConnectionEpoch,
    objectives: HashMap<String, Objective>,
    teams: HashMap<String, Team>,
    display_slots: HashMap<DisplaySlot, String>,
}

impl DownstreamTracker {
    pub fn new(viewer: PlayerId, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            viewer,
            publisher,
            log_invalid: true,
            epoch: ConnectionEpoch::default(),
            objectives: HashMap::new(),
            teams: HashMap::new(),
            display_slots: HashMap::new(),
        }
    }

    /// Enable or disable the warning logged for each violation
    pub fn with_invalid_logging(mut self, enabled: bool) -> Self {
        self.log_invalid = enabled;
        self
    }

    pub fn viewer(&self) -> PlayerId {
        self.viewer
    }

    pub fn epoch(&self) -> ConnectionEpoch {
        self.epoch
    }

    /// Apply a backend packet to the mirror
    pub fn handle(&mut self, packet: &ScoreboardPacket) -> Result<(), DownstreamViolation> {
        let result = match packet {
            ScoreboardPacket::Objective(p) => self.handle_objective(p),
            ScoreboardPacket::DisplayObjective(p) => self.handle_display(p),
            ScoreboardPacket::Score(p) => match p.action {
                ScoreAction::Set => self.handle_set(&p.objective_name, &p.holder, p.value, None, None),
                ScoreAction::Reset => {
                    let objective = Some(p.objective_name.as_str()).filter(|name| !name.is_empty());
                    self.handle_reset(objective, &p.holder)
                }
            },
            ScoreboardPacket::ScoreSet(p) => self.handle_set(
                &p.objective_name,
                &p.holder,
                p.value,
                p.display_name.as_ref(),
                p.number_format.as_ref(),
            ),
            ScoreboardPacket::ScoreReset(p) => {
                let objective = p.objective_name.as_deref().filter(|name| !name.is_empty());
                self.handle_reset(objective, &p.holder)
            }
            ScoreboardPacket::Team(p) => self.handle_team(p),
        };

        if let Err(violation) = &result {
            self.report(violation);
        }
        result
    }

    /// Apply a packet tagged with the backend connection epoch it came from
    pub fn handle_at(
        &mut self,
        epoch: ConnectionEpoch,
        packet: &ScoreboardPacket,
    ) -> Result<(), DownstreamViolation> {
        if epoch != self.epoch {
            let violation = DownstreamViolation::StaleEpoch {
                packet: epoch,
                current: self.epoch,
            };
            self.report(&violation);
            return Err(violation);
        }
        self.handle(packet)
    }

    fn report(&self, violation: &DownstreamViolation) {
        if self.log_invalid {
            warn!(player = %self.viewer, "Invalid downstream scoreboard packet: {}", violation);
        }
    }

    fn publish(&self, kind: EventKind) {
        self.publisher
            .publish(ScoreboardEvent::downstream(self.viewer, kind));
    }

    fn handle_objective(&mut self, packet: &ObjectivePacket) -> Result<(), DownstreamViolation> {
        let name = &packet.objective_name;
        match packet.action {
            ObjectiveAction::Register => {
                if self.objectives.contains_key(name) {
                    return Err(DownstreamViolation::DuplicateObjective(name.clone()));
                }
                let objective = Objective::new(
                    name.clone(),
                    packet.title.clone(),
                    packet.health_display,
                    packet.number_format.clone(),
                );
                self.objectives.insert(name.clone(), objective);
                self.publish(EventKind::ObjectiveRegistered {
                    objective: name.clone(),
                });
            }
            ObjectiveAction::Unregister => {
                if self.objectives.remove(name).is_none() {
                    return Err(DownstreamViolation::UnknownObjective {
                        name: name.clone(),
                        action: "unregister",
                    });
                }
                self.display_slots.retain(|_, occupant| occupant != name);
                self.publish(EventKind::ObjectiveUnregistered {
                    objective: name.clone(),
                });
            }
            ObjectiveAction::Update => {
                let objective = self.objectives.get_mut(name).ok_or_else(|| {
                    DownstreamViolation::UnknownObjective {
                        name: name.clone(),
                        action: "update",
                    }
                })?;
                objective.apply(&ObjectiveUpdate {
                    title: Some(packet.title.clone()),
                    health_display: Some(packet.health_display),
                    number_format: Some(packet.number_format.clone()),
                });
            }
        }
        Ok(())
    }

    fn handle_display(&mut self, packet: &DisplayObjectivePacket) -> Result<(), DownstreamViolation> {
        let slot = packet.slot;

        if packet.is_clear() {
            if let Some(previous) = self.display_slots.remove(&slot) {
                if let Some(objective) = self.objectives.get_mut(&previous) {
                    objective.set_display_slot(None);
                }
            }
            return Ok(());
        }

        let name = &packet.objective_name;
        let old_slot = match self.objectives.get(name) {
            Some(objective) => objective.display_slot(),
            None => {
                return Err(DownstreamViolation::UnknownObjective {
                    name: name.clone(),
                    action: "set display slot",
                })
            }
        };

        // An objective occupies at most one slot
        if let Some(old_slot) = old_slot.filter(|old| *old != slot) {
            self.display_slots.remove(&old_slot);
        }

        if let Some(previous) = self.display_slots.insert(slot, name.clone()) {
            if &previous != name {
                if let Some(objective) = self.objectives.get_mut(&previous) {
                    objective.set_display_slot(None);
                }
            }
        }
        if let Some(objective) = self.objectives.get_mut(name) {
            objective.set_display_slot(Some(slot));
        }

        self.publish(EventKind::ObjectiveDisplayed {
            objective: name.clone(),
            slot,
        });
        Ok(())
    }

    fn handle_set(
        &mut self,
        objective_name: &str,
        holder: &str,
        value: i32,
        display_name: Option<&TextComponent>,
        number_format: Option<&NumberFormat>,
    ) -> Result<(), DownstreamViolation> {
        let objective = self.objectives.get_mut(objective_name).ok_or_else(|| {
            DownstreamViolation::UnknownObjective {
                name: objective_name.to_string(),
                action: "set score",
            }
        })?;
        objective.set_score(holder, value, display_name, number_format);
        Ok(())
    }

    fn handle_reset(&mut self, objective_name: Option<&str>, holder: &str) -> Result<(), DownstreamViolation> {
        match objective_name {
            None => {
                for objective in self.objectives.values_mut() {
                    objective.remove_score(holder);
                }
            }
            Some(name) => {
                let objective = self.objectives.get_mut(name).ok_or_else(|| {
                    DownstreamViolation::UnknownObjective {
                        name: name.to_string(),
                        action: "reset score",
                    }
                })?;
                objective.remove_score(holder);
            }
        }
        Ok(())
    }

    fn handle_team(&mut self, packet: &TeamPacket) -> Result<(), DownstreamViolation> {
        let name = &packet.name;
        match packet.action {
            TeamAction::Register => {
                if self.teams.contains_key(name) {
                    return Err(DownstreamViolation::DuplicateTeam(name.clone()));
                }
                self.strip_entries(&packet.entries);
                let properties = packet.properties.clone().unwrap_or_default();
                let team = Team::new(name.clone(), properties, packet.entries.iter().cloned());
                self.teams.insert(name.clone(), team);
                self.publish(EventKind::TeamRegistered { team: name.clone() });
            }
            TeamAction::Unregister => {
                if self.teams.remove(name).is_none() {
                    return Err(unknown_team(name, "unregister"));
                }
                self.publish(EventKind::TeamUnregistered { team: name.clone() });
            }
            TeamAction::Update => {
                let Some(team) = self.teams.get_mut(name) else {
                    return Err(unknown_team(name, "update"));
                };
                if let Some(properties) = &packet.properties {
                    team.properties = properties.clone();
                }
            }
            TeamAction::AddEntries => {
                if !self.teams.contains_key(name) {
                    return Err(unknown_team(name, "add entries"));
                }
                self.strip_entries(&packet.entries);
                if let Some(team) = self.teams.get_mut(name) {
                    team.add_entries(&packet.entries);
                }
                for entry in &packet.entries {
                    self.publish(EventKind::TeamEntryAdded {
                        team: name.clone(),
                        entry: entry.clone(),
                    });
                }
            }
            TeamAction::RemoveEntries => {
                let Some(team) = self.teams.get_mut(name) else {
                    return Err(unknown_team(name, "remove entries"));
                };
                let removed = team.remove_entries(&packet.entries);
                if removed != packet.entries.len() {
                    debug!(
                        player = %self.viewer,
                        "Backend removed {} entries from team \"{}\" that were not members",
                        packet.entries.len() - removed,
                        name
                    );
                }
                for entry in &packet.entries {
                    self.publish(EventKind::TeamEntryRemoved {
                        team: name.clone(),
                        entry: entry.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove entries from every team (an entry is in at most one team)
    fn strip_entries(&mut self, entries: &[String]) {
        for team in self.teams.values_mut() {
            team.remove_entries(entries);
        }
    }

    /// Forget everything mirrored and start a new connection epoch
    pub fn clear(&mut self) -> ConnectionEpoch {
        self.objectives.clear();
        self.teams.clear();
        self.display_slots.clear();
        self.epoch = self.epoch.next();
        debug!(player = %self.viewer, epoch = %self.epoch, "Cleared downstream scoreboard");
        self.epoch
    }

    pub fn objective(&self, name: &str) -> Option<&Objective> {
        self.objectives.get(name)
    }

    pub fn objective_in_slot(&self, slot: DisplaySlot) -> Option<&Objective> {
        self.display_slots
            .get(&slot)
            .and_then(|name| self.objectives.get(name))
    }

    pub fn objectives(&self) -> impl Iterator<Item = &Objective> {
        self.objectives.values()
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.get(name)
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Team the entry currently belongs to
    pub fn team_of(&self, entry: &str) -> Option<&Team> {
        self.teams.values().find(|team| team.has_entry(entry))
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty() && self.teams.is_empty() && self.display_slots.is_empty()
    }

    /// Human-readable listing of the mirrored state
    pub fn dump(&self) -> Vec<String> {
        let mut lines = vec![format!("--- Downstream scoreboard of player {} ---", self.viewer)];

        let mut teams: Vec<&Team> = self.teams.values().collect();
        teams.sort_by(|a, b| a.name().cmp(b.name()));
        lines.push(format!("Teams ({}):", teams.len()));
        lines.extend(teams.into_iter().flat_map(Team::dump));

        let mut objectives: Vec<&Objective> = self.objectives.values().collect();
        objectives.sort_by(|a, b| a.name().cmp(b.name()));
        lines.push(format!("Objectives ({}):", objectives.len()));
        lines.extend(objectives.into_iter().flat_map(Objective::dump));

        lines
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let mut objectives: Vec<ObjectiveSnapshot> = self
            .objectives
            .values()
            .map(|objective| {
                let mut scores: Vec<Score> = objective.scores().cloned().collect();
                scores.sort_by(|a, b| a.holder.cmp(&b.holder));
                ObjectiveSnapshot {
                    name: objective.name().to_string(),
                    title: objective.title.clone(),
                    health_display: objective.health_display,
                    number_format: objective.number_format.clone(),
                    display_slot: objective.display_slot(),
                    scores,
                }
            })
            .collect();
        objectives.sort_by(|a, b| a.name.cmp(&b.name));

        let mut teams: Vec<TeamSnapshot> = self
            .teams
            .values()
            .map(|team| {
                let mut entries: Vec<String> = team.entries().cloned().collect();
                entries.sort();
                TeamSnapshot {
                    name: team.name().to_string(),
                    properties: team.properties.clone(),
                    entries,
                }
            })
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));

        TrackerSnapshot {
            viewer: self.viewer,
            epoch: self.epoch,
            objectives,
            teams,
        }
    }
}

fn unknown_team(name: &str, action: &'static str) -> DownstreamViolation {
    DownstreamViolation::UnknownTeam {
        name: name.to_string(),
        action,
    }
}

/// Serializable copy of a tracker's state, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub viewer: PlayerId,
    pub epoch: ConnectionEpoch,
    pub objectives: Vec<ObjectiveSnapshot>,
    pub teams: Vec<TeamSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectiveSnapshot {
    pub name: String,
    pub title: TextComponent,
    pub health_display: HealthDisplay,
    pub number_format: Option<NumberFormat>,
    pub display_slot: Option<DisplaySlot>,
    pub scores: Vec<Score>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamSnapshot {
    pub name: String,
    pub properties: TeamProperties,
    pub entries: Vec<String>,
}
