use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// The Probe Service configuration, as read from `netweb.yml`.
/// Every field is optional in the file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// The address the HTTP server binds to.
    pub listen: SocketAddr,

    /// Directory with the static frontend, served for every non-API path.
    /// Ignored when the directory does not exist.
    pub static_dir: Option<PathBuf>,

    /// DNS servers used to time lookups for HTTP probes.
    /// Empty means the system resolver.
    pub dns_hosts: Vec<String>,

    #[serde(flatten)]
    pub probes: ProbeSettings,
}

/// Knobs for the probes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Whether the `custom` command may run user supplied shell templates.
    pub allow_custom: bool,

    /// Number of echo requests sent by the ping probe.
    pub ping_count: u32,

    pub timeouts: TimeoutConfig,
}

/// Per probe timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub curl_seconds: u64,
    pub ping_seconds: u64,
    pub tracert_seconds: u64,
    pub custom_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: Some(PathBuf::from("./frontend/build")),
            dns_hosts: Vec::new(),
            probes: ProbeSettings::default(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            allow_custom: true,
            ping_count: 4,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            curl_seconds: 30,
            ping_seconds: 15,
            tracert_seconds: 60,
            custom_seconds: 30,
        }
    }
}
