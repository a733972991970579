//! The Probe Console: form state, the single visible outcome and the
//! bookkeeping that keeps overlapping submissions from clobbering each other.
//!
//! Every submission gets a ticket from a monotonic counter. Only the outcome
//! carrying the latest ticket is applied; older ones are dropped when they
//! settle. In-flight requests are not aborted.

pub mod client;
pub mod render;
pub mod session;

use thiserror::Error;

use crate::probe::model::{ProbeCommand, ProbeRequest, ProbeResult};
use client::TransportError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("a target URL or host is required")]
    EmptyTarget,
}

/// The three form fields. Setters touch exactly one field each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    command: ProbeCommand,
    url: String,
    custom_command: String,
}

impl FormState {
    pub fn command(&self) -> ProbeCommand {
        self.command
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn custom_command(&self) -> &str {
        &self.custom_command
    }

    pub fn set_command(&mut self, command: ProbeCommand) {
        self.command = command;
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn set_custom_command(&mut self, template: impl Into<String>) {
        self.custom_command = template.into();
    }

    /// The custom command input is only part of the form for custom probes.
    pub fn shows_custom_command(&self) -> bool {
        self.command == ProbeCommand::Custom
    }

    /// Builds the request body, refusing to submit without a target.
    pub fn to_request(&self) -> Result<ProbeRequest, FormError> {
        if self.url.trim().is_empty() {
            return Err(FormError::EmptyTarget);
        }

        Ok(ProbeRequest {
            command: self.command,
            url: self.url.clone(),
            custom: self
                .shows_custom_command()
                .then(|| self.custom_command.clone()),
        })
    }
}

/// What the console shows below the form. Exactly one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Failed(String),
    Completed(ProbeResult),
}

/// Monotonic id of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub ticket: Ticket,
    pub request: ProbeRequest,
}

#[derive(Debug, Default)]
pub struct Console {
    pub form: FormState,
    view: ViewState,
    latest: u64,
}

impl Console {
    pub fn new() -> Self {
        Console::default()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn is_loading(&self) -> bool {
        self.view == ViewState::Loading
    }

    /// Starts a submission: validates the form, issues a new ticket and shows
    /// the loading indicator. Any earlier submission is superseded, also when
    /// the form is rejected; the rejection then replaces whatever was shown.
    pub fn submit(&mut self) -> Result<Submission, FormError> {
        self.latest += 1;

        let request = match self.form.to_request() {
            Ok(request) => request,
            Err(e) => {
                self.view = ViewState::Failed(e.to_string());
                return Err(e);
            }
        };
        self.view = ViewState::Loading;

        Ok(Submission {
            ticket: Ticket(self.latest),
            request,
        })
    }

    /// Applies the outcome of a submission. Returns `false` and leaves the
    /// view untouched when the ticket has been superseded.
    pub fn settle(&mut self, ticket: Ticket, outcome: Result<ProbeResult, TransportError>) -> bool {
        if ticket.0 != self.latest {
            log::debug!("Dropping stale response for submission {} (latest {})", ticket.0, self.latest);
            return false;
        }

        self.view = match outcome {
            Ok(result) => ViewState::Completed(result),
            Err(e) => ViewState::Failed(e.to_string()),
        };
        true
    }
}
