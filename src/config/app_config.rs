use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs, io};

use thiserror::Error;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::model::ServiceConfig;
use crate::probe::http::HttpProber;
use crate::probe::runner::ProbeRunner;

pub const DEFAULT_CONFIG_FILE: &str = "netweb.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {name} value {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to build TLS connector: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Load the service configuration from a YAML file and environment variables.
/// The file is named by `CONFIG_FILE` (default `netweb.yml`) and may be absent,
/// in which case the defaults apply. `NETWEB_LISTEN`, `NETWEB_STATIC_DIR` and
/// `DNS_HOSTS` override the file.
pub fn load_config() -> Result<ServiceConfig, ConfigError> {
    let path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let text = match fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("No configuration file at {path}, using defaults");
            None
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    build_config(&path, text.as_deref(), |name| env::var(name).ok())
}

/// Layers environment overrides, looked up through `lookup`, on top of the
/// (optional) YAML document.
pub fn build_config(
    path: &str,
    text: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServiceConfig, ConfigError> {
    let mut config = match text {
        Some(text) if !text.trim().is_empty() => {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?
        }
        _ => ServiceConfig::default(),
    };

    if let Some(listen) = lookup("NETWEB_LISTEN") {
        config.listen = parse_listen(&listen)?;
    }

    if let Some(dir) = lookup("NETWEB_STATIC_DIR") {
        config.static_dir = (!dir.trim().is_empty()).then(|| PathBuf::from(dir));
    }

    if let Some(hosts) = lookup("DNS_HOSTS") {
        config.dns_hosts = hosts
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    log::info!("Using DNS hosts: {:?}", config.dns_hosts);

    Ok(config)
}

pub fn parse_listen(value: &str) -> Result<SocketAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: "listen",
        value: value.to_string(),
    })
}

/// Setup a TLS connector that accepts invalid certificates, so that the
/// expiry of self-signed or expired certificates can still be reported.
pub fn setup_tls_connector() -> Result<TokioTlsConnector, native_tls::Error> {
    let mut builder = native_tls::TlsConnector::builder();
    builder.danger_accept_invalid_certs(true);
    let connector = builder.build()?;
    Ok(TokioTlsConnector::from(connector))
}

/// Setup a DNS resolver using the provided DNS hosts
/// This function creates a `TokioAsyncResolver` configured with the specified DNS hosts.
/// It sets the resolver options to have 2 attempts, a timeout of 100 milliseconds and a cache size of 1024.
/// Returns `None` when no hosts are given, which means the system resolver is used.
pub fn setup_resolver(dns_hosts: &[String]) -> Result<Option<TokioAsyncResolver>, ConfigError> {
    if dns_hosts.is_empty() {
        return Ok(None);
    }

    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = Duration::from_millis(100);
    opts.cache_size = 1024;

    let mut name_servers = NameServerConfigGroup::new();

    for host in dns_hosts {
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidValue {
            name: "DNS host",
            value: host.clone(),
        })?;
        name_servers.push(NameServerConfig {
            socket_addr: (ip, 53).into(),
            protocol: Protocol::Tcp, // TCP is more reliable then UDP for DNS queries
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(Some(TokioAsyncResolver::tokio(resolver_config, opts)))
}

/// Wire the probe runner from the service configuration.
pub fn build_runner(config: &ServiceConfig) -> Result<ProbeRunner, ConfigError> {
    let connector = setup_tls_connector()?;
    let resolver = setup_resolver(&config.dns_hosts)?;
    let timeout = Duration::from_secs(config.probes.timeouts.curl_seconds);
    let http = HttpProber::new(timeout, connector, resolver)?;

    Ok(ProbeRunner::new(http, config.probes.clone()))
}
