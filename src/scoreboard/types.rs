//! Closed value types shared by the downstream mirror and overlays
//!
//! Rich text formatting is the transport's concern; text is carried as an
//! opaque [`TextComponent`] payload.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Opaque rich-text payload (already serialized by the host, e.g. JSON text)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextComponent(pub String);

impl TextComponent {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TextComponent {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for TextComponent {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl std::fmt::Display for TextComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-screen location that can show at most one objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisplaySlot {
    PlayerList,
    Sidebar,
    BelowName,
    SidebarTeam(TeamColor),
}

impl DisplaySlot {
    /// Wire id (0-2 fixed slots, 3-18 team-colored sidebars)
    pub fn id(&self) -> u8 {
        match self {
            DisplaySlot::PlayerList => 0,
            DisplaySlot::Sidebar => 1,
            DisplaySlot::BelowName => 2,
            DisplaySlot::SidebarTeam(color) => 3 + color.id(),
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(DisplaySlot::PlayerList),
            1 => Some(DisplaySlot::Sidebar),
            2 => Some(DisplaySlot::BelowName),
            3..=18 => TeamColor::from_id(id - 3).map(DisplaySlot::SidebarTeam),
            _ => None,
        }
    }
}

impl std::fmt::Display for DisplaySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplaySlot::PlayerList => write!(f, "list"),
            DisplaySlot::Sidebar => write!(f, "sidebar"),
            DisplaySlot::BelowName => write!(f, "below_name"),
            DisplaySlot::SidebarTeam(color) => write!(f, "sidebar.team.{:?}", color),
        }
    }
}

/// How objective values are rendered in the player list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthDisplay {
    #[default]
    Integer,
    Hearts,
}

/// Minimal text style used by [`NumberFormat::Styled`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    pub color: Option<TeamColor>,
    pub bold: bool,
    pub italic: bool,
    pub underlined: bool,
    pub strikethrough: bool,
    pub obfuscated: bool,
}

/// Score number rendering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberFormat {
    /// Replace the number with fixed text
    Fixed(TextComponent),
    /// Hide the number
    Blank,
    /// Render the number with a style
    Styled(Style),
}

impl NumberFormat {
    pub fn fixed(text: impl Into<TextComponent>) -> Self {
        NumberFormat::Fixed(text.into())
    }

    /// Format to put on the wire.
    ///
    /// Styled formats cannot be encoded yet and degrade to [`NumberFormat::Blank`].
    pub fn for_wire(&self) -> NumberFormat {
        match self {
            NumberFormat::Styled(_) => {
                tracing::debug!("Styled number format is not encodable, sending blank");
                NumberFormat::Blank
            }
            other => other.clone(),
        }
    }
}

/// The 16 chat colors plus reset, as used by team colors and sidebar slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
    #[default]
    Reset,
}

impl TeamColor {
    const ALL: [TeamColor; 16] = [
        TeamColor::Black,
        TeamColor::DarkBlue,
        TeamColor::DarkGreen,
        TeamColor::DarkAqua,
        TeamColor::DarkRed,
        TeamColor::DarkPurple,
        TeamColor::Gold,
        TeamColor::Gray,
        TeamColor::DarkGray,
        TeamColor::Blue,
        TeamColor::Green,
        TeamColor::Aqua,
        TeamColor::Red,
        TeamColor::LightPurple,
        TeamColor::Yellow,
        TeamColor::White,
    ];

    pub fn id(&self) -> u8 {
        match self {
            TeamColor::Reset => 21,
            color => Self::ALL.iter().position(|c| c == color).unwrap_or(0) as u8,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0..=15 => Some(Self::ALL[id as usize]),
            21 => Some(TeamColor::Reset),
            _ => None,
        }
    }
}

/// Nametag visibility rule of a team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameVisibility {
    #[default]
    Always,
    Never,
    HideForOtherTeams,
    HideForOwnTeam,
}

impl NameVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameVisibility::Always => "always",
            NameVisibility::Never => "never",
            NameVisibility::HideForOtherTeams => "hideForOtherTeams",
            NameVisibility::HideForOwnTeam => "hideForOwnTeam",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always" => Some(NameVisibility::Always),
            "never" => Some(NameVisibility::Never),
            "hideForOtherTeams" => Some(NameVisibility::HideForOtherTeams),
            "hideForOwnTeam" => Some(NameVisibility::HideForOwnTeam),
            _ => None,
        }
    }
}

/// Collision rule of a team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionRule {
    #[default]
    Always,
    Never,
    PushOtherTeams,
    PushOwnTeam,
}

impl CollisionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionRule::Always => "always",
            CollisionRule::Never => "never",
            CollisionRule::PushOtherTeams => "pushOtherTeams",
            CollisionRule::PushOwnTeam => "pushOwnTeam",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always" => Some(CollisionRule::Always),
            "never" => Some(CollisionRule::Never),
            "pushOtherTeams" => Some(CollisionRule::PushOtherTeams),
            "pushOwnTeam" => Some(CollisionRule::PushOwnTeam),
            _ => None,
        }
    }
}

/// Team property bundle (everything except the entry set)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamProperties {
    pub display_name: TextComponent,
    pub prefix: TextComponent,
    pub suffix: TextComponent,
    pub name_visibility: NameVisibility,
    pub collision_rule: CollisionRule,
    pub color: TeamColor,
    pub allow_friendly_fire: bool,
    pub can_see_friendly_invisibles: bool,
}

impl TeamProperties {
    const FRIENDLY_FIRE: u8 = 0x01;
    const SEE_INVISIBLES: u8 = 0x02;

    /// Packed option flags as sent on the wire
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.allow_friendly_fire {
            flags |= Self::FRIENDLY_FIRE;
        }
        if self.can_see_friendly_invisibles {
            flags |= Self::SEE_INVISIBLES;
        }
        flags
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.allow_friendly_fire = flags & Self::FRIENDLY_FIRE != 0;
        self.can_see_friendly_invisibles = flags & Self::SEE_INVISIBLES != 0;
    }
}

/// Entry batch carried by team packets; almost always a single name
pub type Entries = SmallVec<[String; 1]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_slot_ids() {
        assert_eq!(DisplaySlot::Sidebar.id(), 1);
        assert_eq!(DisplaySlot::SidebarTeam(TeamColor::Black).id(), 3);
        assert_eq!(DisplaySlot::SidebarTeam(TeamColor::White).id(), 18);
        assert_eq!(
            DisplaySlot::from_id(15),
            Some(DisplaySlot::SidebarTeam(TeamColor::Red))
        );
        assert_eq!(DisplaySlot::from_id(19), None);
    }

    #[test]
    fn test_team_flags() {
        let mut props = TeamProperties::default();
        assert_eq!(props.flags(), 0);

        props.set_flags(0x03);
        assert!(props.allow_friendly_fire);
        assert!(props.can_see_friendly_invisibles);

        props.can_see_friendly_invisibles = false;
        assert_eq!(props.flags(), 0x01);
    }

    #[test]
    fn test_styled_format_degrades_to_blank() {
        let styled = NumberFormat::Styled(Style {
            bold: true,
            ..Default::default()
        });
        assert_eq!(styled.for_wire(), NumberFormat::Blank);

        let fixed = NumberFormat::fixed("-");
        assert_eq!(fixed.for_wire(), fixed);
    }

    #[test]
    fn test_rule_strings() {
        for rule in [
            NameVisibility::Always,
            NameVisibility::Never,
            NameVisibility::HideForOtherTeams,
            NameVisibility::HideForOwnTeam,
        ] {
            assert_eq!(NameVisibility::parse(rule.as_str()), Some(rule));
        }
        assert_eq!(CollisionRule::parse("pushOwnTeam"), Some(CollisionRule::PushOwnTeam));
        assert_eq!(CollisionRule::parse("sometimes"), None);
    }
}
