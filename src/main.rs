use std::sync::Arc;

use smallvec::smallvec;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use scoreboard_sync::downstream::ConnectionEpoch;
use scoreboard_sync::net::packet::{
    DisplayObjectivePacket, ObjectiveAction, ObjectivePacket, ScoreSetPacket, ScoreboardPacket,
    TeamAction, TeamPacket,
};
use scoreboard_sync::net::{ProtocolVersion, Viewer};
use scoreboard_sync::scoreboard::{
    ChannelPublisher, DisplaySlot, HealthDisplay, NumberFormat, Objective, Score, Team, TeamColor,
    TeamProperties, TextComponent,
};
use scoreboard_sync::{PacketVerdict, ScoreboardConfig, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Scoreboard Sync v{}", env!("CARGO_PKG_VERSION"));

    let config = ScoreboardConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: max_protocol={}, suppress_shadowed_display={}, event_capacity={}",
        config.max_protocol_version, config.suppress_shadowed_display, config.event_capacity
    );

    let (publisher, events) = ChannelPublisher::bounded(config.event_capacity);
    let registry = SessionRegistry::new(config, Arc::new(publisher));

    // Connection writer: stands in for the codec + socket of one client
    let (tx, mut rx) = mpsc::unbounded_channel::<ScoreboardPacket>();
    let writer = tokio::spawn(async move {
        let mut written = 0usize;
        while let Some(packet) = rx.recv().await {
            debug!("-> client {:?}", packet);
            written += 1;
        }
        written
    });

    let player = Uuid::new_v4();
    let viewer = registry.connect(player, ProtocolVersion::MINECRAFT_1_21, Arc::new(tx));

    let overlay = registry.create_overlay(1, "demo")?;
    overlay.register_team(
        Team::builder("Staff")
            .prefix("[Staff] ")
            .color(TeamColor::Red)
            .entry("Notch"),
    )?;
    overlay.register_objective(
        Objective::builder("MyObjective")
            .title("My Objective")
            .display_slot(DisplaySlot::Sidebar),
    )?;
    overlay.find_or_create_score("MyObjective", "Line1", 69)?;
    overlay.set_score(
        "MyObjective",
        Score::new("Line2", 42).with_number_format(NumberFormat::fixed("!")),
    )?;
    registry.subscribe(player, overlay.id())?;

    // First backend
    let epoch = registry
        .epoch(player)
        .ok_or_else(|| anyhow::anyhow!("no session for {}", player))?;
    relay(&registry, &viewer, epoch, &backend_join("kills"));

    // Second backend; anything still in flight from the first one is stale
    let stale = epoch;
    let epoch = registry
        .on_server_switch(player)
        .ok_or_else(|| anyhow::anyhow!("no session for {}", player))?;
    relay(&registry, &viewer, stale, &backend_join("late"));
    relay(&registry, &viewer, epoch, &backend_join("deaths"));

    if let Some(lines) = registry.dump(player) {
        for line in lines {
            info!("{}", line);
        }
    }
    info!("Session JSON:\n{}", registry.dump_json(player)?.unwrap_or_default());

    registry.on_disconnect(player);
    registry.remove_overlay(overlay.id())?;

    for event in events.try_iter() {
        debug!(viewer = %event.viewer, source = ?event.source, "Event {:?}", event.kind);
    }

    let metrics = registry.metrics().snapshot();
    info!(
        "Downstream packets: {} handled, {} dropped, {} suppressed; overlay packets sent: {}",
        metrics.downstream_handled,
        metrics.downstream_rejected,
        metrics.downstream_suppressed,
        metrics.overlay_packets_sent
    );
    print!("{}", registry.metrics().render_prometheus());

    // Release every sink clone so the writer drains and exits
    drop(viewer);
    drop(overlay);
    drop(registry);
    let written = writer.await?;
    info!("Client received {} packets", written);

    Ok(())
}

/// Pass backend packets through the registry, forwarding what survives
fn relay(registry: &SessionRegistry, viewer: &Viewer, epoch: ConnectionEpoch, packets: &[ScoreboardPacket]) {
    for packet in packets {
        match registry.handle_downstream(viewer.id(), epoch, packet) {
            PacketVerdict::Forward => viewer.send(packet.clone()),
            PacketVerdict::Suppress => debug!("Suppressed {} packet", packet.kind()),
            PacketVerdict::Drop(violation) => warn!("Dropped {} packet: {}", packet.kind(), violation),
        }
    }
}

/// What a backend typically sends after a join, with two mistakes mixed in
fn backend_join(objective: &str) -> Vec<ScoreboardPacket> {
    vec![
        ObjectivePacket {
            action: ObjectiveAction::Register,
            objective_name: objective.to_string(),
            title: TextComponent::from(objective),
            health_display: HealthDisplay::Integer,
            number_format: None,
        }
        .into(),
        DisplayObjectivePacket::new(DisplaySlot::Sidebar, objective).into(),
        DisplayObjectivePacket::new(DisplaySlot::PlayerList, objective).into(),
        ScoreSetPacket {
            holder: "Alice".to_string(),
            objective_name: objective.to_string(),
            value: 3,
            display_name: None,
            number_format: None,
        }
        .into(),
        ScoreSetPacket {
            holder: "Alice".to_string(),
            objective_name: "missing".to_string(),
            value: 1,
            display_name: None,
            number_format: None,
        }
        .into(),
        TeamPacket {
            action: TeamAction::Register,
            name: "Red".to_string(),
            properties: Some(TeamProperties::default()),
            entries: smallvec!["Alice".to_string()],
        }
        .into(),
        TeamPacket::add_entries("Blue", smallvec!["Alice".to_string()]).into(),
    ]
}
