use url::Url;

/// Placeholder replaced by the target in custom command templates.
pub const URL_PLACEHOLDER: &str = "{url}";

/// Reduces a user supplied target to a bare host for ICMP style tools.
///
/// `https://example.com/path` and `example.com/path` both become `example.com`.
pub fn host_of(target: &str) -> String {
    let target = target.trim();

    if target.contains("://") {
        if let Some(host) = Url::parse(target).ok().as_ref().and_then(|u| u.host_str()) {
            return host.trim_matches(|c| c == '[' || c == ']').to_string();
        }
    }

    let target = target
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    target.split('/').next().unwrap_or(target).to_string()
}

/// Turns a target into something an HTTP client can fetch, defaulting to
/// plain http the way curl does.
pub fn http_url(target: &str) -> Result<Url, url::ParseError> {
    let target = target.trim();
    if target.contains("://") {
        Url::parse(target)
    } else {
        Url::parse(&format!("http://{target}"))
    }
}

/// Substitutes every `{url}` in a custom command template.
pub fn render_template(template: &str, target: &str) -> String {
    template.replace(URL_PLACEHOLDER, target)
}
