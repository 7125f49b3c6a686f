//! Decoded scoreboard packets exchanged with the transport layer
//!
//! Only semantic fields live here; byte layout and version-gated field
//! presence are handled by the codec. Constructors that build packets from
//! entities produce wire-safe content (see [`NumberFormat::for_wire`]).

use serde::{Deserialize, Serialize};

use crate::net::protocol::ProtocolVersion;
use crate::scoreboard::objective::Objective;
use crate::scoreboard::score::Score;
use crate::scoreboard::team::Team;
use crate::scoreboard::types::{
    DisplaySlot, Entries, HealthDisplay, NumberFormat, TeamProperties, TextComponent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveAction {
    Register,
    Unregister,
    Update,
}

/// Objective register / unregister / update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectivePacket {
    pub action: ObjectiveAction,
    pub objective_name: String,
    pub title: TextComponent,
    pub health_display: HealthDisplay,
    pub number_format: Option<NumberFormat>,
}

impl ObjectivePacket {
    pub fn register(objective: &Objective) -> Self {
        Self::with_action(ObjectiveAction::Register, objective)
    }

    pub fn update(objective: &Objective) -> Self {
        Self::with_action(ObjectiveAction::Update, objective)
    }

    pub fn unregister(objective_name: impl Into<String>) -> Self {
        Self {
            action: ObjectiveAction::Unregister,
            objective_name: objective_name.into(),
            title: TextComponent::default(),
            health_display: HealthDisplay::Integer,
            number_format: None,
        }
    }

    fn with_action(action: ObjectiveAction, objective: &Objective) -> Self {
        Self {
            action,
            objective_name: objective.name().to_string(),
            title: objective.title.clone(),
            health_display: objective.health_display,
            number_format: objective.number_format.as_ref().map(NumberFormat::for_wire),
        }
    }
}

/// Display-slot assignment. An empty objective name clears the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayObjectivePacket {
    pub slot: DisplaySlot,
    pub objective_name: String,
}

impl DisplayObjectivePacket {
    pub fn new(slot: DisplaySlot, objective_name: impl Into<String>) -> Self {
        Self {
            slot,
            objective_name: objective_name.into(),
        }
    }

    pub fn clear(slot: DisplaySlot) -> Self {
        Self::new(slot, String::new())
    }

    pub fn is_clear(&self) -> bool {
        self.objective_name.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreAction {
    Set,
    Reset,
}

/// Combined score packet used by clients before 1.20.3
///
/// A reset with an empty objective name resets the holder everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePacket {
    pub action: ScoreAction,
    pub holder: String,
    pub objective_name: String,
    pub value: i32,
}

/// Score set (1.20.3+), with optional per-entry overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSetPacket {
    pub holder: String,
    pub objective_name: String,
    pub value: i32,
    pub display_name: Option<TextComponent>,
    pub number_format: Option<NumberFormat>,
}

/// Score reset (1.20.3+). No objective resets the holder everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResetPacket {
    pub holder: String,
    pub objective_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamAction {
    Register,
    Unregister,
    Update,
    AddEntries,
    RemoveEntries,
}

/// Team register / unregister / update / add-entries / remove-entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPacket {
    pub action: TeamAction,
    pub name: String,
    /// Present for register and update
    pub properties: Option<TeamProperties>,
    /// Present for register, add-entries and remove-entries
    pub entries: Entries,
}

impl TeamPacket {
    pub fn register(team: &Team) -> Self {
        Self {
            action: TeamAction::Register,
            name: team.name().to_string(),
            properties: Some(team.properties.clone()),
            entries: team.entries().cloned().collect(),
        }
    }

    pub fn unregister(name: impl Into<String>) -> Self {
        Self {
            action: TeamAction::Unregister,
            name: name.into(),
            properties: None,
            entries: Entries::new(),
        }
    }

    pub fn update(name: impl Into<String>, properties: TeamProperties) -> Self {
        Self {
            action: TeamAction::Update,
            name: name.into(),
            properties: Some(properties),
            entries: Entries::new(),
        }
    }

    pub fn add_entries(name: impl Into<String>, entries: Entries) -> Self {
        Self {
            action: TeamAction::AddEntries,
            name: name.into(),
            properties: None,
            entries,
        }
    }

    pub fn remove_entries(name: impl Into<String>, entries: Entries) -> Self {
        Self {
            action: TeamAction::RemoveEntries,
            name: name.into(),
            properties: None,
            entries,
        }
    }
}

/// Any of the six scoreboard packet kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreboardPacket {
    Objective(ObjectivePacket),
    DisplayObjective(DisplayObjectivePacket),
    Score(ScorePacket),
    ScoreSet(ScoreSetPacket),
    ScoreReset(ScoreResetPacket),
    Team(TeamPacket),
}

impl ScoreboardPacket {
    /// Score set in the generation the client understands
    pub fn score_set(protocol: ProtocolVersion, objective_name: &str, score: &Score) -> Self {
        if protocol.has_split_scores() {
            ScoreboardPacket::ScoreSet(ScoreSetPacket {
                holder: score.holder.clone(),
                objective_name: objective_name.to_string(),
                value: score.value,
                display_name: score.display_name.clone(),
                number_format: score.number_format.as_ref().map(NumberFormat::for_wire),
            })
        } else {
            ScoreboardPacket::Score(ScorePacket {
                action: ScoreAction::Set,
                holder: score.holder.clone(),
                objective_name: objective_name.to_string(),
                value: score.value,
            })
        }
    }

    /// Score reset in the generation the client understands
    pub fn score_reset(protocol: ProtocolVersion, objective_name: Option<&str>, holder: &str) -> Self {
        if protocol.has_split_scores() {
            ScoreboardPacket::ScoreReset(ScoreResetPacket {
                holder: holder.to_string(),
                objective_name: objective_name.map(str::to_string),
            })
        } else {
            ScoreboardPacket::Score(ScorePacket {
                action: ScoreAction::Reset,
                holder: holder.to_string(),
                objective_name: objective_name.unwrap_or_default().to_string(),
                value: 0,
            })
        }
    }

    /// Short name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ScoreboardPacket::Objective(_) => "objective",
            ScoreboardPacket::DisplayObjective(_) => "display_objective",
            ScoreboardPacket::Score(_) => "score",
            ScoreboardPacket::ScoreSet(_) => "score_set",
            ScoreboardPacket::ScoreReset(_) => "score_reset",
            ScoreboardPacket::Team(_) => "team",
        }
    }
}

impl From<ObjectivePacket> for ScoreboardPacket {
    fn from(packet: ObjectivePacket) -> Self {
        ScoreboardPacket::Objective(packet)
    }
}

impl From<DisplayObjectivePacket> for ScoreboardPacket {
    fn from(packet: DisplayObjectivePacket) -> Self {
        ScoreboardPacket::DisplayObjective(packet)
    }
}

impl From<ScorePacket> for ScoreboardPacket {
    fn from(packet: ScorePacket) -> Self {
        ScoreboardPacket::Score(packet)
    }
}

impl From<ScoreSetPacket> for ScoreboardPacket {
    fn from(packet: ScoreSetPacket) -> Self {
        ScoreboardPacket::ScoreSet(packet)
    }
}

impl From<ScoreResetPacket> for ScoreboardPacket {
    fn from(packet: ScoreResetPacket) -> Self {
        ScoreboardPacket::ScoreReset(packet)
    }
}

impl From<TeamPacket> for ScoreboardPacket {
    fn from(packet: TeamPacket) -> Self {
        ScoreboardPacket::Team(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoreboard::types::Style;

    #[test]
    fn test_score_set_generation_follows_protocol() {
        let score = Score::new("Line1", 69).with_display_name("Custom");

        match ScoreboardPacket::score_set(ProtocolVersion::MINECRAFT_1_21, "sidebar", &score) {
            ScoreboardPacket::ScoreSet(packet) => {
                assert_eq!(packet.holder, "Line1");
                assert_eq!(packet.value, 69);
                assert_eq!(packet.display_name, Some(TextComponent::from("Custom")));
            }
            other => panic!("Wrong packet type: {:?}", other),
        }

        match ScoreboardPacket::score_set(ProtocolVersion::MINECRAFT_1_20_2, "sidebar", &score) {
            ScoreboardPacket::Score(packet) => {
                assert_eq!(packet.action, ScoreAction::Set);
                assert_eq!(packet.objective_name, "sidebar");
            }
            other => panic!("Wrong packet type: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_reset_without_objective_uses_empty_name() {
        match ScoreboardPacket::score_reset(ProtocolVersion::MINECRAFT_1_20_2, None, "Alice") {
            ScoreboardPacket::Score(packet) => {
                assert_eq!(packet.action, ScoreAction::Reset);
                assert!(packet.objective_name.is_empty());
            }
            other => panic!("Wrong packet type: {:?}", other),
        }
    }

    #[test]
    fn test_styled_format_is_blank_on_wire() {
        let score = Score::new("Line1", 1).with_number_format(NumberFormat::Styled(Style::default()));
        match ScoreboardPacket::score_set(ProtocolVersion::MINECRAFT_1_21, "sidebar", &score) {
            ScoreboardPacket::ScoreSet(packet) => {
                assert_eq!(packet.number_format, Some(NumberFormat::Blank));
            }
            other => panic!("Wrong packet type: {:?}", other),
        }
    }

    #[test]
    fn test_team_register_carries_entries() {
        let team = Team::builder("Red").entry("Alice").build().unwrap();
        let packet = TeamPacket::register(&team);

        assert_eq!(packet.action, TeamAction::Register);
        assert!(packet.properties.is_some());
        assert_eq!(packet.entries.as_slice(), &["Alice".to_string()]);
    }
}
