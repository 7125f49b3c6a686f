use crate::net::protocol::ProtocolVersion;

/// Scoreboard synchronization configuration
#[derive(Debug, Clone)]
pub struct ScoreboardConfig {
    /// Newest client protocol overlays can be projected onto
    pub max_protocol_version: ProtocolVersion,
    /// Log a warning for every dropped downstream packet
    pub log_invalid_packets: bool,
    /// Drop backend display packets for slots owned by an overlay
    pub suppress_shadowed_display: bool,
    /// Capacity of the bounded event channel
    pub event_capacity: usize,
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            max_protocol_version: ProtocolVersion::MINECRAFT_1_21,
            log_invalid_packets: true,
            suppress_shadowed_display: true,
            event_capacity: 1024,
        }
    }
}

impl ScoreboardConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(protocol) = std::env::var("SCOREBOARD_MAX_PROTOCOL") {
            if let Ok(parsed) = protocol.parse::<u32>() {
                config.max_protocol_version = ProtocolVersion(parsed);
            } else {
                tracing::warn!("Invalid SCOREBOARD_MAX_PROTOCOL '{}', using default", protocol);
            }
        }

        if let Ok(flag) = std::env::var("SCOREBOARD_LOG_INVALID") {
            match parse_bool(&flag) {
                Some(value) => config.log_invalid_packets = value,
                None => tracing::warn!("Invalid SCOREBOARD_LOG_INVALID '{}', using default", flag),
            }
        }

        if let Ok(flag) = std::env::var("SCOREBOARD_SUPPRESS_SHADOWED_DISPLAY") {
            match parse_bool(&flag) {
                Some(value) => config.suppress_shadowed_display = value,
                None => tracing::warn!(
                    "Invalid SCOREBOARD_SUPPRESS_SHADOWED_DISPLAY '{}', using default",
                    flag
                ),
            }
        }

        if let Ok(capacity) = std::env::var("SCOREBOARD_EVENT_CAPACITY") {
            if let Ok(parsed) = capacity.parse::<usize>() {
                if parsed > 0 && parsed <= 1_000_000 {
                    config.event_capacity = parsed;
                } else {
                    tracing::warn!("SCOREBOARD_EVENT_CAPACITY must be 1-1000000, using default");
                }
            } else {
                tracing::warn!("Invalid SCOREBOARD_EVENT_CAPACITY '{}', using default", capacity);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.max_protocol_version.0 == 0 {
            return Err("max_protocol_version cannot be 0".to_string());
        }
        if self.event_capacity == 0 || self.event_capacity > 1_000_000 {
            return Err("event_capacity must be 1-1000000".to_string());
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
