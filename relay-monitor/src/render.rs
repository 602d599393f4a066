//! Text rendering of the presentation state
//!
//! Each call consumes the dirty flags, so only parts that changed since the
//! previous call produce lines.

use relay_ipc::{ConnectionState, DisplayedHost, Flag, Indicators, Series, SharedMonitorState};

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "--"
    }
}

pub fn indicator_line(indicators: &Indicators) -> String {
    let mut line = Flag::ALL
        .iter()
        .map(|flag| format!("{} {}", flag.label(), mark(indicators.flags.get(*flag))))
        .collect::<Vec<_>>()
        .join(" | ");
    if let Some(connection) = indicators.connection {
        let shown = match connection {
            ConnectionState::Disconnected => "--",
            ConnectionState::Negotiating => "..",
            ConnectionState::Connected => "ok",
        };
        line.push_str(&format!(" | connection {} ({})", shown, connection));
    }
    line
}

pub fn host_lines(hosts: &[DisplayedHost]) -> Vec<String> {
    if hosts.is_empty() {
        return vec!["no hosts discovered".to_string()];
    }
    hosts
        .iter()
        .enumerate()
        .map(|(i, host)| format!("[{}] {}", i, host.label))
        .collect()
}

/// Lines for everything that changed since the last call
pub fn render(state: &SharedMonitorState) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(indicators) = state.indicators.read_if_dirty() {
        lines.push(indicator_line(&indicators));
    }

    if let Some(hosts) = state.hosts.read_if_dirty() {
        lines.extend(host_lines(&hosts));
    }

    let latest: Vec<String> = Series::ALL
        .iter()
        .filter_map(|series| {
            let points = state.series(*series).read_if_dirty()?;
            let point = points.last()?;
            Some(format!("{} {:.1}", series.label(), point.value))
        })
        .collect();
    if !latest.is_empty() {
        lines.push(latest.join(", "));
    }

    if let Some(net) = state.net.read_if_dirty().and_then(|n| n.last().cloned()) {
        let limit = net.kbs_limit.as_deref().unwrap_or("none");
        lines.push(format!(
            "outgoing {:.1} KB/s at {:.0}s (limit {})",
            net.outgoing_kbs, net.second_time, limit
        ));
    }

    lines
}
