use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "localhost";
pub const MIN_PORT_NUMBER: i64 = 1;
pub const MAX_PORT_NUMBER: i64 = 65535;

/// A network endpoint tracked by its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub port_number: i32,
    pub protocol: String,
    pub host: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
    Tcp,
    Udp,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Http, Protocol::Https, Protocol::Tcp, Protocol::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Protocol must be one of http, https, tcp, udp (got '{}')", s))
    }
}

/// Field set applied by a partial update. `None` leaves the column as is;
/// `description: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortChanges {
    pub name: Option<String>,
    pub port_number: Option<i32>,
    pub protocol: Option<Protocol>,
    pub host: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl PortChanges {
    pub fn apply(&self, port: &mut Port, updated_at: DateTime<Utc>) {
        if let Some(name) = &self.name {
            port.name = name.clone();
        }
        if let Some(port_number) = self.port_number {
            port.port_number = port_number;
        }
        if let Some(protocol) = self.protocol {
            port.protocol = protocol.to_string();
        }
        if let Some(host) = &self.host {
            port.host = host.clone();
        }
        if let Some(description) = &self.description {
            port.description = description.clone();
        }
        if let Some(is_active) = self.is_active {
            port.is_active = is_active;
        }
        port.updated_at = updated_at;
    }
}
