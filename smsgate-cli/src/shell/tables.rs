//! Plain-text tables for the terminal

use std::fmt::Write;

use crate::store::DashboardSnapshot;
use smsgate_shared::{
    Connector, ConnectorKind, ConnectorStatus, Group, Route, StatusSummary, TrafficStats, User,
};

fn rule(out: &mut String, width: usize) {
    let _ = writeln!(out, "{}", "-".repeat(width));
}

fn or_dash(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "-",
    }
}

pub fn connectors(connectors: &[Connector]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<20} {:<6} {:<36} {:<12} {:<12}", "CID", "TYPE", "ENDPOINT", "BIND", "STATUS");
    rule(&mut out, 90);
    for connector in connectors {
        let bind = match &connector.kind {
            ConnectorKind::Smpp(smpp) => smpp.bind_mode.to_string(),
            ConnectorKind::Http(_) => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<20} {:<6} {:<36} {:<12} {:<12}",
            connector.cid,
            connector.kind.type_name(),
            connector.kind.endpoint(),
            bind,
            connector.status.to_string(),
        );
    }
    out
}

pub fn routes(routes: &[Route]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<36} {:<10} {:<20} {:<8} {:<8} {:<10}", "ORDER", "ID", "TYPE", "CONNECTOR", "RATE", "FILTERS", "STATUS");
    rule(&mut out, 104);
    for route in routes {
        let rate = route
            .rate
            .map(|r| format!("{:.4}", r))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<6} {:<36} {:<10} {:<20} {:<8} {:<8} {:<10}",
            route.order,
            route.id,
            route.route_type.to_string(),
            route.connector_id,
            rate,
            route.filters.len(),
            route.status.to_string(),
        );
    }
    out
}

pub fn users(users: &[User]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<36} {:<20} {:<30} {:<20} {:<8}", "ID", "USERNAME", "EMAIL", "ROLES", "ACTIVE");
    rule(&mut out, 118);
    for user in users {
        let roles = user.roles.iter().cloned().collect::<Vec<_>>().join(",");
        let _ = writeln!(
            out,
            "{:<36} {:<20} {:<30} {:<20} {:<8}",
            user.id,
            user.username,
            user.email,
            or_dash(Some(&roles)),
            if user.is_active { "yes" } else { "no" },
        );
    }
    out
}

pub fn groups(groups: &[Group]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<36} {:<20} {:<8} {}", "ID", "NAME", "MEMBERS", "PERMISSIONS");
    rule(&mut out, 100);
    for group in groups {
        let permissions = group.format_permissions();
        let _ = writeln!(
            out,
            "{:<36} {:<20} {:<8} {}",
            group.id,
            group.name,
            group.member_count,
            or_dash(Some(&permissions)),
        );
    }
    out
}

fn traffic(out: &mut String, title: &str, stats: &TrafficStats) {
    let _ = writeln!(out, "{}", title);
    if stats.connectors.is_empty() {
        let _ = writeln!(out, "  (no traffic)");
        return;
    }
    for c in &stats.connectors {
        let _ = writeln!(
            out,
            "  {:<20} sent {:>8}  delivered {:>8}  failed {:>6}  {}",
            c.cid, c.sent, c.delivered, c.failed, c.status
        );
    }
}

pub fn dashboard(snapshot: &DashboardSnapshot, summary: &StatusSummary) -> String {
    let system = &snapshot.system;
    let mut out = String::new();
    let _ = writeln!(out, "Gateway status at {}", snapshot.refreshed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    rule(&mut out, 60);
    let _ = writeln!(out, "Messages sent:      {}", system.total_sent);
    let _ = writeln!(out, "Delivered:          {}", system.total_delivered);
    let _ = writeln!(out, "Failed:             {}", system.total_failed);
    let _ = writeln!(out, "Delivery rate:      {:.1}%", system.delivery_rate);
    let _ = writeln!(out, "Throughput:         {:.2} msg/s", system.messages_per_second);
    let _ = writeln!(
        out,
        "Connectors:         {} total, {} connected, {} disconnected, {} binding, {} error",
        summary.total,
        summary.count(ConnectorStatus::Connected),
        summary.count(ConnectorStatus::Disconnected),
        summary.count(ConnectorStatus::Binding),
        summary.count(ConnectorStatus::Error),
    );
    rule(&mut out, 60);
    traffic(&mut out, "SMPP", &snapshot.smpp);
    traffic(&mut out, "HTTP", &snapshot.http);
    out
}
