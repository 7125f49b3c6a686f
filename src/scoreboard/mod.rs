//! Scoreboard entity model: objectives, teams, scores and the value types
//! they are built from.

pub mod error;
pub mod event;
pub mod objective;
pub mod score;
pub mod team;
pub mod types;

pub use error::{DownstreamViolation, ScoreboardError};
pub use event::{ChannelPublisher, EventKind, EventPublisher, EventSource, NoopPublisher, ScoreboardEvent};
pub use objective::{Objective, ObjectiveBuilder, ObjectiveUpdate};
pub use score::Score;
pub use team::{Team, TeamBuilder};
pub use types::{
    CollisionRule, DisplaySlot, Entries, HealthDisplay, NameVisibility, NumberFormat, Style,
    TeamColor, TeamProperties, TextComponent,
};
