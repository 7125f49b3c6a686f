//! Scoreboard synchronization counters
//!
//! Lock-free counters shared by the registry, trackers and overlays.
//! Rendered in Prometheus text format by [`ScoreboardMetrics::render_prometheus`];
//! serving them is left to the host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Metrics registry for scoreboard synchronization
#[derive(Debug)]
pub struct ScoreboardMetrics {
    // Downstream packet outcomes
    pub downstream_handled: AtomicU64,
    pub downstream_rejected: AtomicU64,
    pub downstream_suppressed: AtomicU64,

    // Overlay output
    pub overlay_packets_sent: AtomicU64,
    pub replays: AtomicU64,

    // Gauges
    pub active_sessions: AtomicU64,
    pub active_overlays: AtomicU64,

    start_time: Instant,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub downstream_handled: u64,
    pub downstream_rejected: u64,
    pub downstream_suppressed: u64,
    pub overlay_packets_sent: u64,
    pub replays: u64,
    pub active_sessions: u64,
    pub active_overlays: u64,
    pub uptime_seconds: u64,
}

impl ScoreboardMetrics {
    pub fn new() -> Self {
        Self {
            downstream_handled: AtomicU64::new(0),
            downstream_rejected: AtomicU64::new(0),
            downstream_suppressed: AtomicU64::new(0),
            overlay_packets_sent: AtomicU64::new(0),
            replays: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            active_overlays: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_downstream(&self, rejected: bool, suppressed: bool) {
        self.downstream_handled.fetch_add(1, Ordering::Relaxed);
        if rejected {
            self.downstream_rejected.fetch_add(1, Ordering::Relaxed);
        }
        if suppressed {
            self.downstream_suppressed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_overlay_packets(&self, count: usize) {
        self.overlay_packets_sent
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_replay(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.store(count as u64, Ordering::Relaxed);
    }

    pub fn set_active_overlays(&self, count: usize) {
        self.active_overlays.store(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downstream_handled: self.downstream_handled.load(Ordering::Relaxed),
            downstream_rejected: self.downstream_rejected.load(Ordering::Relaxed),
            downstream_suppressed: self.downstream_suppressed.load(Ordering::Relaxed),
            overlay_packets_sent: self.overlay_packets_sent.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            active_overlays: self.active_overlays.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Render all metrics in Prometheus text format
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::with_capacity(1024);

        output.push_str("# HELP scoreboard_downstream_packets_total Backend scoreboard packets seen\n");
        output.push_str("# TYPE scoreboard_downstream_packets_total counter\n");
        output.push_str(&format!(
            "scoreboard_downstream_packets_total {}\n",
            s.downstream_handled
        ));

        output.push_str("# HELP scoreboard_downstream_rejected_total Backend packets dropped as protocol violations\n");
        output.push_str("# TYPE scoreboard_downstream_rejected_total counter\n");
        output.push_str(&format!(
            "scoreboard_downstream_rejected_total {}\n",
            s.downstream_rejected
        ));

        output.push_str("# HELP scoreboard_downstream_suppressed_total Backend display packets shadowed by an overlay\n");
        output.push_str("# TYPE scoreboard_downstream_suppressed_total counter\n");
        output.push_str(&format!(
            "scoreboard_downstream_suppressed_total {}\n",
            s.downstream_suppressed
        ));

        output.push_str("# HELP scoreboard_overlay_packets_total Packets emitted by overlays\n");
        output.push_str("# TYPE scoreboard_overlay_packets_total counter\n");
        output.push_str(&format!(
            "scoreboard_overlay_packets_total {}\n",
            s.overlay_packets_sent
        ));

        output.push_str("# HELP scoreboard_replays_total Full overlay replays to a viewer\n");
        output.push_str("# TYPE scoreboard_replays_total counter\n");
        output.push_str(&format!("scoreboard_replays_total {}\n", s.replays));

        output.push_str("# HELP scoreboard_sessions Connected players with a tracker\n");
        output.push_str("# TYPE scoreboard_sessions gauge\n");
        output.push_str(&format!("scoreboard_sessions {}\n", s.active_sessions));

        output.push_str("# HELP scoreboard_overlays Registered overlays\n");
        output.push_str("# TYPE scoreboard_overlays gauge\n");
        output.push_str(&format!("scoreboard_overlays {}\n", s.active_overlays));

        output.push_str("# HELP scoreboard_uptime_seconds Seconds since the registry started\n");
        output.push_str("# TYPE scoreboard_uptime_seconds counter\n");
        output.push_str(&format!("scoreboard_uptime_seconds {}\n", s.uptime_seconds));

        output
    }
}

impl Default for ScoreboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}
