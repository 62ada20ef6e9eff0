//! Prometheus text exposition of the lease metrics.

use std::fmt::Write;

use leasekeeper_core::MetricsSnapshot;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const PREFIX: &str = "leasekeeper";

/// Render a snapshot in the Prometheus text format.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    counter(
        &mut out,
        "registrations_total",
        "Total number of successful registrations.",
        snapshot.successful_registrations_total,
    );
    counter(
        &mut out,
        "registration_errors_total",
        "Total number of failed registration attempts.",
        snapshot.registration_errors_total,
    );
    counter(
        &mut out,
        "heartbeats_total",
        "Total number of successful heartbeats.",
        snapshot.heartbeats_total,
    );
    counter(
        &mut out,
        "heartbeat_errors_total",
        "Total number of failed heartbeat attempts.",
        snapshot.heartbeat_errors_total,
    );
    counter(
        &mut out,
        "deregistrations_total",
        "Total number of successful deregistrations.",
        snapshot.deregistrations_total,
    );

    let _ = writeln!(
        out,
        "# HELP {PREFIX}_registered Registration status per instance (1 if registered, 0 otherwise)."
    );
    let _ = writeln!(out, "# TYPE {PREFIX}_registered gauge");
    for (name, value) in &snapshot.registered_status_by_instance {
        let _ = writeln!(
            out,
            "{PREFIX}_registered{{instance=\"{}\"}} {}",
            escape_label(name),
            value
        );
    }

    out
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {PREFIX}_{name} {help}");
    let _ = writeln!(out, "# TYPE {PREFIX}_{name} counter");
    let _ = writeln!(out, "{PREFIX}_{name} {value}");
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
