use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

pub mod config;
pub mod console;
pub mod probe;
pub mod server;

use config::app_config::{build_runner, load_config};
use console::FormState;
use console::client::{DEFAULT_SERVICE_URL, ProbeClient};
use console::session::{run_interactive, run_once};
use probe::model::ProbeCommand;

#[derive(Parser, Debug)]
#[command(name = "netweb", about = "Network testing tool: curl, ping, traceroute and custom probes", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Probe Service
    Serve {
        /// address to listen on, overrides the configuration file
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// directory with the static frontend
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Submit a single probe and print the result
    Probe {
        #[command(flatten)]
        service: ServiceArgs,
        /// probe to run: curl, ping, tracert or custom
        #[arg(long, default_value = "curl")]
        command: ProbeCommand,
        /// target URL or host
        #[arg(long)]
        url: String,
        /// custom command template, {url} is replaced by the target
        #[arg(long, default_value = "")]
        custom: String,
        /// print the raw JSON result instead of the rendered panel
        #[arg(long)]
        json: bool,
    },
    /// Interactive console
    Console {
        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// base URL of the Probe Service
    #[arg(long, env = "NETWEB_SERVICE_URL", default_value = DEFAULT_SERVICE_URL)]
    service: String,
    /// seconds to wait for the service to answer
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

impl ServiceArgs {
    fn client(&self) -> anyhow::Result<ProbeClient> {
        Ok(ProbeClient::new(&self.service, Duration::from_secs(self.timeout))?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, static_dir } => {
            let mut config = load_config()?;
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if let Some(dir) = static_dir {
                config.static_dir = Some(dir);
            }

            let runner = build_runner(&config)?;
            server::serve(config, runner).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Probe {
            service,
            command,
            url,
            custom,
            json,
        } => {
            let client = service.client()?;
            let mut form = FormState::default();
            form.set_command(command);
            form.set_url(url);
            form.set_custom_command(custom);

            Ok(run_once(&client, form, json).await.exit_code())
        }
        Commands::Console { service } => {
            run_interactive(service.client()?).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_probe_arguments() {
        let cli = Cli::try_parse_from([
            "netweb", "probe", "--command", "custom", "--url", "example.com", "--custom", "dig {url}",
        ])
        .unwrap();

        let Commands::Probe { command, url, custom, json, service } = cli.command else {
            panic!("expected the probe subcommand");
        };
        assert_eq!(command, ProbeCommand::Custom);
        assert_eq!(url, "example.com");
        assert_eq!(custom, "dig {url}");
        assert!(!json);
        assert_eq!(service.timeout, 120);
    }

    #[test]
    fn test_unknown_probe_command_is_rejected() {
        let result = Cli::try_parse_from(["netweb", "probe", "--command", "nmap", "--url", "x"]);
        assert!(result.is_err());
    }
}
