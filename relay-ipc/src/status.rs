//! # Status Snapshot Types
//!
//! The worker writes a flat JSON object into the status range. Every field is
//! optional; anything missing decodes to `false`, zero or absent.
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `COORD` | connection coordinator reachable |
//! | `RESOLVEDSDP` | NAT traversal / address resolved |
//! | `CONNECTED` | peer connected |
//! | `CONNSTATUS` | 0 disconnected, 1 negotiating, 2 connected |
//! | `UPDATETIME` | timestamp of the throughput sample below |
//! | `INCOMINGKBS`, `OUTGOINGKBS`, `OUTGOINGLIMITKBS` | rates in KB/s |
//! | `OUTGOINGBUFFERSIZEKB`, `OUTGOINGMESSAGECOUNT` | send-side backlog |
//! | `NETDATA` | nested rate record from the application host |
//! | `HOSTS` | `[{GUID, NAME, APPNAME}]` discovered hosts |

use serde::Deserialize;

use crate::error::ChannelResult;

/// Negotiation state of the worker's peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Negotiating,
    Connected,
}

impl ConnectionState {
    /// Map the wire code; unknown codes yield `None`
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ConnectionState::Disconnected),
            1 => Some(ConnectionState::Negotiating),
            2 => Some(ConnectionState::Connected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Negotiating => write!(f, "negotiating"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// One throughput sample, present when the worker sent `UPDATETIME`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Throughput {
    /// Producer timestamp; a new value means a new sample
    pub update_time: f64,
    pub incoming_kbs: f64,
    pub outgoing_kbs: f64,
    pub outgoing_limit_kbs: f64,
    pub outgoing_buffer_kb: f64,
    pub outgoing_message_count: f64,
}

/// Rate record written by the application host worker
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct NetData {
    #[serde(rename = "OUTGOINGKBS", default)]
    pub outgoing_kbs: f64,
    #[serde(rename = "SECONDTIME", default)]
    pub second_time: f64,
    #[serde(rename = "KBSLIMIT", default)]
    pub kbs_limit: Option<String>,
}

/// A host the worker discovered through the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Stable key (`GUID`)
    pub id: String,
    /// Display name (`NAME`)
    pub name: String,
    /// Application running on the host (`APPNAME`)
    pub app_name: Option<String>,
}

/// How a host is rendered in the presentation list and in connect commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostLabelStyle {
    /// `<GUID>:<NAME>`
    #[default]
    Plain,
    /// `<GUID>:<NAME> Running... <APPNAME>`
    WithApplication,
}

impl HostEntry {
    /// Text shown for this host and sent back as the connect command
    pub fn label(&self, style: HostLabelStyle) -> String {
        match style {
            HostLabelStyle::Plain => format!("{}:{}", self.id, self.name),
            HostLabelStyle::WithApplication => format!(
                "{}:{} Running... {}",
                self.id,
                self.name,
                self.app_name.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Decoded status payload for one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub coordinator: bool,
    pub resolved: bool,
    pub connected: bool,
    pub connection: Option<ConnectionState>,
    pub throughput: Option<Throughput>,
    pub net_data: Option<NetData>,
    pub hosts: Option<Vec<HostEntry>>,
}

impl StatusSnapshot {
    /// Decode the status text. Fails with `MalformedStatus` when the text is
    /// not a JSON object or a present field has the wrong type.
    pub fn decode(text: &str) -> ChannelResult<Self> {
        let wire: WireStatus = serde_json::from_str(text)?;
        Ok(wire.into())
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireHost {
    #[serde(rename = "GUID", default)]
    guid: Option<String>,
    #[serde(rename = "NAME", default)]
    name: Option<String>,
    #[serde(rename = "APPNAME", default)]
    app_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireStatus {
    #[serde(rename = "COORD", default)]
    coord: Option<bool>,
    #[serde(rename = "RESOLVEDSDP", default)]
    resolved_sdp: Option<bool>,
    #[serde(rename = "CONNECTED", default)]
    connected: Option<bool>,
    #[serde(rename = "CONNSTATUS", default)]
    conn_status: Option<i64>,
    #[serde(rename = "OUTGOINGLIMITKBS", default)]
    outgoing_limit_kbs: Option<f64>,
    #[serde(rename = "INCOMINGKBS", default)]
    incoming_kbs: Option<f64>,
    #[serde(rename = "OUTGOINGKBS", default)]
    outgoing_kbs: Option<f64>,
    #[serde(rename = "OUTGOINGBUFFERSIZEKB", default)]
    outgoing_buffer_kb: Option<f64>,
    #[serde(rename = "OUTGOINGMESSAGECOUNT", default)]
    outgoing_message_count: Option<f64>,
    #[serde(rename = "UPDATETIME", default)]
    update_time: Option<f64>,
    #[serde(rename = "NETDATA", default)]
    net_data: Option<NetData>,
    #[serde(rename = "HOSTS", default)]
    hosts: Option<Vec<WireHost>>,
}

impl From<WireStatus> for StatusSnapshot {
    fn from(wire: WireStatus) -> Self {
        let connection = wire.conn_status.and_then(|code| {
            let state = ConnectionState::from_code(code);
            if state.is_none() {
                log::debug!("Ignoring unknown CONNSTATUS {}", code);
            }
            state
        });

        let throughput = wire.update_time.map(|update_time| Throughput {
            update_time,
            incoming_kbs: wire.incoming_kbs.unwrap_or_default(),
            outgoing_kbs: wire.outgoing_kbs.unwrap_or_default(),
            outgoing_limit_kbs: wire.outgoing_limit_kbs.unwrap_or_default(),
            outgoing_buffer_kb: wire.outgoing_buffer_kb.unwrap_or_default(),
            outgoing_message_count: wire.outgoing_message_count.unwrap_or_default(),
        });

        let hosts = wire.hosts.map(|hosts| {
            hosts
                .into_iter()
                .filter_map(|host| {
                    let id = host.guid.filter(|g| !g.is_empty())?;
                    Some(HostEntry {
                        id,
                        name: host.name.unwrap_or_default(),
                        app_name: host.app_name,
                    })
                })
                .collect()
        });

        Self {
            coordinator: wire.coord.unwrap_or(false),
            resolved: wire.resolved_sdp.unwrap_or(false),
            connected: wire.connected.unwrap_or(false),
            connection,
            throughput,
            net_data: wire.net_data,
            hosts,
        }
    }
}
