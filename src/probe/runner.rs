use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};

use super::exec::{custom_spec, ping_spec, run_command, traceroute_spec};
use super::http::HttpProber;
use super::model::{ConnectionInfo, ProbeCommand, ProbeResult};
use super::{Execution, ProbeError};
use crate::config::model::ProbeSettings;

/// Executes probes on behalf of the HTTP service.
pub struct ProbeRunner {
    http: HttpProber,
    settings: ProbeSettings,
}

impl ProbeRunner {
    pub fn new(http: HttpProber, settings: ProbeSettings) -> Self {
        ProbeRunner { http, settings }
    }

    /// Runs one probe and packages its outcome. `command` is the raw wire
    /// name so that unknown commands are reported in the result, not rejected.
    pub async fn run(&self, command: &str, target: &str, custom: Option<&str>) -> ProbeResult {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let start = Instant::now();

        let execution = match command.parse::<ProbeCommand>() {
            Ok(kind) => self.dispatch(kind, target, custom).await,
            Err(e) => Execution::failed(e),
        };

        let duration = format!("{:?}", start.elapsed());
        log::debug!(
            "Probe {command} against {target:?} finished in {duration} (ok: {})",
            execution.error.is_none()
        );

        let mut metadata: HashMap<String, String> = execution.metadata.into_iter().collect();
        metadata.insert("command_type".to_string(), command.to_string());
        metadata.insert("execution_time".to_string(), duration.clone());

        ProbeResult {
            success: execution.error.is_none(),
            command: command.to_string(),
            duration,
            output: execution.output,
            error: execution.error.map(|e| e.to_string()),
            connection: ConnectionInfo {
                target: target.to_string(),
                os: std::env::consts::OS.to_string(),
                timestamp,
            },
            metadata,
        }
    }

    async fn dispatch(&self, kind: ProbeCommand, target: &str, custom: Option<&str>) -> Execution {
        if target.trim().is_empty() {
            return Execution::failed(ProbeError::MissingTarget);
        }

        let timeouts = &self.settings.timeouts;
        match kind {
            ProbeCommand::Curl => self.http.probe(target).await,
            ProbeCommand::Ping => {
                let spec = ping_spec(target, self.settings.ping_count, secs(timeouts.ping_seconds));
                run_command(&spec).await
            }
            ProbeCommand::Tracert => {
                run_command(&traceroute_spec(target, secs(timeouts.tracert_seconds))).await
            }
            ProbeCommand::Custom => {
                if !self.settings.allow_custom {
                    return Execution::failed(ProbeError::CustomDisabled);
                }
                let template = custom.unwrap_or_default();
                if template.trim().is_empty() {
                    return Execution::failed(ProbeError::EmptyTemplate);
                }
                run_command(&custom_spec(template, target, secs(timeouts.custom_seconds))).await
            }
        }
    }
}

fn secs(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}

/// Runner with the system resolver and a short HTTP timeout.
#[cfg(test)]
pub(crate) fn test_runner(settings: ProbeSettings) -> ProbeRunner {
    let connector = crate::config::app_config::setup_tls_connector().unwrap();
    let http = HttpProber::new(Duration::from_secs(5), connector, None).unwrap();
    ProbeRunner::new(http, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn runner(settings: ProbeSettings) -> ProbeRunner {
        test_runner(settings)
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported_in_result() {
        let result = runner(ProbeSettings::default()).run("nmap", "example.com", None).await;

        assert!(!result.success);
        assert_eq!(result.command, "nmap");
        assert_eq!(result.error.as_deref(), Some("unknown command: nmap"));
        assert_eq!(result.metadata.get("command_type").map(String::as_str), Some("nmap"));
        assert!(result.metadata.contains_key("execution_time"));
    }

    #[tokio::test]
    async fn test_connection_info() {
        let result = runner(ProbeSettings::default()).run("ping", "", None).await;

        assert_eq!(result.error.as_deref(), Some("target must not be empty"));
        assert_eq!(result.connection.os, std::env::consts::OS);
        assert!(DateTime::parse_from_rfc3339(&result.connection.timestamp).is_ok());
        assert_eq!(result.duration, result.metadata["execution_time"]);
    }

    #[tokio::test]
    async fn test_custom_requires_template() {
        let result = runner(ProbeSettings::default())
            .run("custom", "example.com", Some("  "))
            .await;
        assert_eq!(result.error.as_deref(), Some("custom command template is empty"));
    }

    #[tokio::test]
    async fn test_custom_can_be_disabled() {
        let settings = ProbeSettings {
            allow_custom: false,
            ..Default::default()
        };
        let result = runner(settings).run("custom", "example.com", Some("echo {url}")).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("custom commands are disabled"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_custom_command_success() {
        let result = runner(ProbeSettings::default())
            .run("custom", "example.com", Some("echo probing {url}"))
            .await;

        assert!(result.success);
        assert_eq!(result.error, None);
        assert_eq!(result.output, "probing example.com\n");
        assert_eq!(result.connection.target, "example.com");
        assert_eq!(result.metadata.get("exit_code").map(String::as_str), Some("0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_custom_command_keeps_partial_output() {
        let result = runner(ProbeSettings::default())
            .run("custom", "example.com", Some("echo partial; exit 2"))
            .await;

        assert!(!result.success);
        assert_eq!(result.output, "partial\n");
        assert!(result.error.unwrap().starts_with("custom command error:"));
    }
}
