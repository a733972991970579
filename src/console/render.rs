use std::fmt::Write;

use chrono::{DateTime, Local};
use unicode_truncate::{Alignment, UnicodeTruncateStr};

use super::{FormState, ViewState};
use crate::probe::model::ProbeResult;

pub const SUCCESS_BANNER: &str = "✓ Test Successful";
pub const FAILURE_BANNER: &str = "✗ Test Failed";
pub const LOADING: &str = "Testing...";

const LABEL_WIDTH: usize = 11;

fn to_fixed_width(input: &str, width: usize) -> String {
    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

fn push_item(out: &mut String, label: &str, value: &str, width: usize) {
    let _ = writeln!(out, "  {} {}", to_fixed_width(&format!("{label}:"), width), value);
}

/// Like [`push_item`], but a label wider than `width` is printed whole.
fn push_padded_item(out: &mut String, label: &str, value: &str, width: usize) {
    let label = format!("{label}:");
    let _ = writeln!(out, "  {} {}", label.unicode_pad(width, Alignment::Left, false), value);
}

fn display_width(text: &str) -> usize {
    text.unicode_truncate(usize::MAX).1
}

/// Shows RFC 3339 timestamps in local time; anything else is shown as is.
pub fn local_timestamp(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => timestamp.to_string(),
    }
}

pub fn render_form(form: &FormState, loading: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Command Type:    {}", form.command().label());
    if form.shows_custom_command() {
        let _ = writeln!(out, "Custom Command:  {}", form.custom_command());
        let _ = writeln!(out, "                 Use {{url}} as placeholder for the URL");
    }
    let _ = writeln!(out, "Target URL/Host: {}", form.url());
    let _ = writeln!(out, "[ {} ]", if loading { LOADING } else { "Run Test" });
    out
}

/// Renders whichever single outcome the view holds.
pub fn render_view(view: &ViewState) -> String {
    match view {
        ViewState::Idle => String::new(),
        ViewState::Loading => format!("{LOADING}\n"),
        ViewState::Failed(message) => render_error(message),
        ViewState::Completed(result) => render_result(result),
    }
}

pub fn render_error(message: &str) -> String {
    format!("Error\n  {message}\n")
}

pub fn render_result(result: &ProbeResult) -> String {
    let mut out = String::new();

    out.push_str(if result.success { SUCCESS_BANNER } else { FAILURE_BANNER });
    out.push_str("\n\nConnection Information\n");
    push_item(&mut out, "Target", &result.connection.target, LABEL_WIDTH);
    push_item(&mut out, "Command", &result.command, LABEL_WIDTH);
    push_item(&mut out, "Duration", &result.duration, LABEL_WIDTH);
    push_item(&mut out, "OS", &result.connection.os, LABEL_WIDTH);
    push_item(
        &mut out,
        "Timestamp",
        &local_timestamp(&result.connection.timestamp),
        LABEL_WIDTH,
    );

    if let Some(error) = result.error.as_deref().filter(|e| !e.is_empty()) {
        let _ = write!(out, "\nError Details\n{error}\n");
    }

    let _ = write!(out, "\nResponse Output\n{}", result.output);
    if !result.output.ends_with('\n') {
        out.push('\n');
    }

    if !result.metadata.is_empty() {
        out.push_str("\nMetadata\n");
        let mut entries: Vec<_> = result.metadata.iter().collect();
        entries.sort();

        let width = entries
            .iter()
            .map(|(key, _)| display_width(key) + 1)
            .max()
            .unwrap_or(LABEL_WIDTH);
        for (key, value) in entries {
            push_padded_item(&mut out, key, value, width);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::model::{ConnectionInfo, ProbeCommand};

    fn connection() -> ConnectionInfo {
        ConnectionInfo {
            target: "example.com".to_string(),
            os: "linux".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn ping_success() -> ProbeResult {
        ProbeResult {
            success: true,
            command: "ping".to_string(),
            duration: "12ms".to_string(),
            output: "64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=11.6 ms".to_string(),
            connection: connection(),
            ..Default::default()
        }
    }

    fn curl_failure() -> ProbeResult {
        ProbeResult {
            success: false,
            command: "curl".to_string(),
            duration: "5s".to_string(),
            output: String::new(),
            error: Some("unreachable".to_string()),
            connection: connection(),
            ..Default::default()
        }
    }

    #[test]
    fn test_successful_result_panel() {
        let text = render_result(&ping_success());

        assert!(text.starts_with(SUCCESS_BANNER));
        assert!(!text.contains(FAILURE_BANNER));
        assert!(text.contains("64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=11.6 ms\n"));
        assert!(text.contains("  Target:     example.com\n"));
        assert!(text.contains("  Duration:   12ms\n"));
        assert!(!text.contains("Error Details"));
        assert!(!text.contains("Metadata"));
    }

    #[test]
    fn test_failed_result_panel_shows_error_details() {
        let text = render_result(&curl_failure());

        assert!(text.starts_with(FAILURE_BANNER));
        assert!(text.contains("\nError Details\nunreachable\n"));
        assert!(text.contains("Response Output"));
    }

    #[test]
    fn test_empty_error_string_has_no_error_section() {
        let mut result = ping_success();
        result.error = Some(String::new());
        assert!(!render_result(&result).contains("Error Details"));
    }

    #[test]
    fn test_metadata_is_sorted() {
        let mut result = ping_success();
        result.metadata.insert("execution_time".to_string(), "12ms".to_string());
        result.metadata.insert("command_type".to_string(), "ping".to_string());

        let text = render_result(&result);
        let command_type = text.find("command_type:").unwrap();
        let execution_time = text.find("execution_time:").unwrap();
        assert!(text.contains("\nMetadata\n"));
        assert!(command_type < execution_time);
    }

    #[test]
    fn test_long_metadata_keys_are_not_cut() {
        let key = "upstream_connection_reuse_negotiated_ms";
        let mut result = ping_success();
        result.metadata.insert(key.to_string(), "3".to_string());
        result.metadata.insert("exit_code".to_string(), "0".to_string());

        let text = render_result(&result);
        assert!(text.contains(&format!("  {key}: 3\n")));
        let padded = format!("  {:<width$} 0\n", "exit_code:", width = key.len() + 1);
        assert!(text.contains(&padded));
    }

    #[test]
    fn test_output_is_verbatim() {
        let mut result = ping_success();
        result.output = "line one\n  indented <tag> & {url}\n".to_string();
        assert!(render_result(&result).ends_with("Response Output\nline one\n  indented <tag> & {url}\n"));
    }

    #[test]
    fn test_view_renders_exactly_one_outcome() {
        assert_eq!(render_view(&ViewState::Idle), "");
        assert_eq!(render_view(&ViewState::Loading), "Testing...\n");

        let error = render_view(&ViewState::Failed("HTTP error! status: 500".to_string()));
        assert!(error.starts_with("Error\n"));
        assert!(error.contains("500"));
        assert!(!error.contains(SUCCESS_BANNER) && !error.contains(FAILURE_BANNER));

        let panel = render_view(&ViewState::Completed(ping_success()));
        assert!(panel.starts_with(SUCCESS_BANNER));
        assert!(!panel.starts_with("Error"));
    }

    #[test]
    fn test_form_hides_custom_command_unless_selected() {
        let mut form = FormState::default();
        form.set_url("example.com");
        form.set_custom_command("dig {url}");

        let text = render_form(&form, false);
        assert!(text.contains("cURL - HTTP Request"));
        assert!(!text.contains("Custom Command:"));
        assert!(text.contains("[ Run Test ]"));

        form.set_command(ProbeCommand::Custom);
        let text = render_form(&form, true);
        assert!(text.contains("Custom Command:  dig {url}"));
        assert!(text.contains("Use {url} as placeholder for the URL"));
        assert!(text.contains("[ Testing... ]"));
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(local_timestamp("yesterday"), "yesterday");
        let shown = local_timestamp("2024-01-01T00:00:00Z");
        assert_ne!(shown, "2024-01-01T00:00:00Z");
        assert!(!shown.contains('T'));
    }

    #[test]
    fn test_to_fixed_width() {
        assert_eq!(to_fixed_width("OS:", 5), "OS:  ");
        assert_eq!(to_fixed_width("Timestamp:", 4), "Time");
    }
}
