//! `/network status` report built from process-local uptime and latency figures.

use std::time::Duration;

use crate::health::RelaySnapshot;

pub const NETWORK_COMMAND: &str = "network";
pub const STATUS_SUBCOMMAND: &str = "status";

/// Format a duration as `1d 2h 3m 4s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Render the ephemeral status reply.
pub fn render_status(
    provider: &str,
    snapshot: &RelaySnapshot,
    gateway_latency: Option<Duration>,
) -> String {
    let gateway = gateway_latency
        .map(|d| format!("{}ms", d.as_millis()))
        .unwrap_or_else(|| "unknown".to_string());
    let relay_latency = if snapshot.relays_ok > 0 {
        format!("{}ms", snapshot.avg_latency_ms)
    } else {
        "n/a".to_string()
    };

    format!(
        "**Network status**\n\
         - Uptime: {}\n\
         - Gateway latency: {}\n\
         - Provider `{}`: {} (avg {} over the last 5m)\n\
         - Events: {} handled, {} replies, {} fallbacks",
        format_uptime(Duration::from_secs(snapshot.uptime_secs)),
        gateway,
        provider,
        snapshot.status,
        relay_latency,
        snapshot.events_dispatched,
        snapshot.replies_delivered,
        snapshot.fallbacks_sent,
    )
}
