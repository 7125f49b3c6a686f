use crate::downstream::tracker::ConnectionEpoch;

/// Backend sent a scoreboard packet that contradicts the mirrored state.
///
/// Reported to the caller so the packet can be dropped; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownstreamViolation {
    #[error("This scoreboard already contains objective \"{0}\"")]
    DuplicateObjective(String),
    #[error("This scoreboard does not contain objective \"{name}\", cannot {action}")]
    UnknownObjective { name: String, action: &'static str },
    #[error("This scoreboard already contains team \"{0}\"")]
    DuplicateTeam(String),
    #[error("This scoreboard does not contain team \"{name}\", cannot {action}")]
    UnknownTeam { name: String, action: &'static str },
    #[error("Packet from connection epoch {packet} arrived after switch to epoch {current}")]
    StaleEpoch {
        packet: ConnectionEpoch,
        current: ConnectionEpoch,
    },
}

/// Misuse of the proxy-side scoreboard API (programming error)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreboardError {
    #[error("Objective \"{0}\" already exists")]
    ObjectiveExists(String),
    #[error("This scoreboard does not contain an objective named \"{0}\"")]
    UnknownObjective(String),
    #[error("Team \"{0}\" already exists")]
    TeamExists(String),
    #[error("This scoreboard does not contain a team named \"{0}\"")]
    UnknownTeam(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    #[error("Priority cannot be negative: {0}")]
    NegativePriority(i32),
    #[error("Priority 0 is reserved for downstream packets")]
    ReservedPriority,
    #[error("Player {0} has no session")]
    UnknownPlayer(uuid::Uuid),
    #[error("Overlay {0} is not registered")]
    UnknownOverlay(u64),
}
