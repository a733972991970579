use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::client::{ProbeClient, TransportError};
use super::render::{render_form, render_view};
use super::{Console, FormState, Ticket, ViewState};
use crate::probe::model::{ProbeCommand, ProbeResult};

const HELP: &str = "\
Commands:
  command <curl|ping|tracert|custom>  select the probe
  url <target>                         set the target URL or host
  custom <template>                    set the custom command, {url} is substituted
  run                                  submit the form
  show                                 print the form and the last outcome
  help                                 this text
  quit                                 leave the console";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Command(ProbeCommand),
    Url(String),
    Custom(String),
    Run,
    Show,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match word {
        "command" => rest
            .parse::<ProbeCommand>()
            .map(Input::Command)
            .map_err(|e| e.to_string()),
        "url" => Ok(Input::Url(rest.to_string())),
        "custom" => Ok(Input::Custom(rest.to_string())),
        "run" => Ok(Input::Run),
        "show" => Ok(Input::Show),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown input {other:?}, type help for a list")),
    }
}

/// How a one-shot submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// The service answered, the probe failed.
    ProbeFailed,
    /// The form was invalid or the service could not be reached.
    Unreachable,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Succeeded => ExitCode::SUCCESS,
            Outcome::ProbeFailed => ExitCode::from(1),
            Outcome::Unreachable => ExitCode::from(2),
        }
    }
}

/// Runs a single submission from a prepared form and prints the outcome.
pub async fn run_once(client: &ProbeClient, form: FormState, json: bool) -> Outcome {
    let mut console = Console::new();
    console.form = form;

    let submission = match console.submit() {
        Ok(submission) => submission,
        Err(_) => {
            print!("{}", render_view(console.view()));
            return Outcome::Unreachable;
        }
    };

    let outcome = client.run(&submission.request).await;
    console.settle(submission.ticket, outcome);

    match console.view() {
        ViewState::Completed(result) => {
            if json {
                match serde_json::to_string_pretty(result) {
                    Ok(text) => println!("{text}"),
                    Err(e) => log::error!("Failed to encode result: {e}"),
                }
            } else {
                print!("{}", render_view(console.view()));
            }
            if result.success { Outcome::Succeeded } else { Outcome::ProbeFailed }
        }
        view => {
            print!("{}", render_view(view));
            Outcome::Unreachable
        }
    }
}

/// Interactive console on stdin. Submissions run in the background and may
/// overlap; only the most recent one is reflected on screen.
pub async fn run_interactive(client: ProbeClient) -> std::io::Result<()> {
    let mut console = Console::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<(Ticket, Result<ProbeResult, TransportError>)>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("NetWeb - Network Testing Tool ({})", client.endpoint());
    println!("{HELP}\n");
    print!("{}", render_form(&console.form, false));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }

                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Help) => println!("{HELP}"),
                    Ok(Input::Show) => {
                        print!("{}", render_form(&console.form, console.is_loading()));
                        print!("{}", render_view(console.view()));
                    }
                    Ok(Input::Command(command)) => {
                        console.form.set_command(command);
                        print!("{}", render_form(&console.form, console.is_loading()));
                    }
                    Ok(Input::Url(url)) => console.form.set_url(url),
                    Ok(Input::Custom(template)) => console.form.set_custom_command(template),
                    Ok(Input::Run) => match console.submit() {
                        Ok(submission) => {
                            print!("{}", render_view(console.view()));
                            let client = client.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                let outcome = client.run(&submission.request).await;
                                let _ = tx.send((submission.ticket, outcome));
                            });
                        }
                        Err(_) => print!("{}", render_view(console.view())),
                    },
                    Err(message) => println!("{message}"),
                }
            }
            Some((ticket, outcome)) = rx.recv() => {
                if console.settle(ticket, outcome) {
                    print!("{}", render_view(console.view()));
                }
            }
        }
    }

    Ok(())
}
