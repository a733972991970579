pub mod exec;
pub mod http;
pub mod model;
pub mod runner;
pub mod target;

use std::fmt::Write;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Why a probe did not succeed. Travels to the console as `result.error`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("target must not be empty")]
    MissingTarget,

    #[error("custom commands are disabled")]
    CustomDisabled,

    #[error("custom command template is empty")]
    EmptyTemplate,

    #[error("{tool} error: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} error: timed out after {after:?}")]
    Timeout { tool: &'static str, after: Duration },

    #[error("{tool} error: {status}")]
    Failed {
        tool: &'static str,
        status: ExitStatus,
    },

    #[error("curl error: {0}")]
    Http(String),
}

/// What a probe produced: its (possibly partial) output, extra metadata and
/// the error that stopped it, if any.
#[derive(Debug, Default)]
pub struct Execution {
    pub output: String,
    pub metadata: Vec<(String, String)>,
    pub error: Option<ProbeError>,
}

impl Execution {
    pub fn failed(error: ProbeError) -> Self {
        Execution {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }
}

/// Flattens an error and its sources into a single message.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
