use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProbeError;

/// The kind of diagnostic to run against a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeCommand {
    /// HTTP request, reported the way `curl -i` would print it.
    #[default]
    Curl,
    /// ICMP echo.
    Ping,
    /// Path tracing.
    Tracert,
    /// User supplied command template with a `{url}` placeholder.
    Custom,
}

impl ProbeCommand {
    pub const ALL: [ProbeCommand; 4] = [
        ProbeCommand::Curl,
        ProbeCommand::Ping,
        ProbeCommand::Tracert,
        ProbeCommand::Custom,
    ];

    /// Wire name, as sent in the `command` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeCommand::Curl => "curl",
            ProbeCommand::Ping => "ping",
            ProbeCommand::Tracert => "tracert",
            ProbeCommand::Custom => "custom",
        }
    }

    /// Human readable label for the command selector.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeCommand::Curl => "cURL - HTTP Request",
            ProbeCommand::Ping => "Ping - ICMP Echo",
            ProbeCommand::Tracert => "Traceroute - Path Tracing",
            ProbeCommand::Custom => "Custom Command",
        }
    }
}

impl fmt::Display for ProbeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeCommand {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProbeCommand::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| ProbeError::UnknownCommand(s.to_string()))
    }
}

/// Body of `POST /api/test`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub command: ProbeCommand,
    pub url: String,

    /// Only meaningful for [`ProbeCommand::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// Where and when a probe ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub target: String,
    pub os: String,
    /// RFC 3339 timestamp of the probe start.
    pub timestamp: String,
}

/// Response body of `POST /api/test`.
///
/// `success` decides which of `output` and `error` is authoritative. A failed
/// probe may still carry the partial output it produced before failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub command: String,
    pub duration: String,

    #[serde(default)]
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub connection: ConnectionInfo,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}
