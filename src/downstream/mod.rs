//! Backend-side scoreboard state, one tracker per connected player

pub mod tracker;

pub use tracker::{ConnectionEpoch, DownstreamTracker, ObjectiveSnapshot, TeamSnapshot, TrackerSnapshot};
