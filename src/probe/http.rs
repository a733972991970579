use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::TokioAsyncResolver;
use url::Url;
use x509_parser::parse_x509_certificate;

use super::target::http_url;
use super::{Execution, ProbeError, report};

/// Performs the `curl` probe natively: an HTTP GET that follows redirects,
/// printed like `curl -i`, enriched with DNS and certificate timings.
pub struct HttpProber {
    client: Client,
    connector: TokioTlsConnector,
    resolver: Option<TokioAsyncResolver>,
    /// Bounds the lookups and the certificate handshake made next to the request.
    timeout: Duration,
}

impl HttpProber {
    /// `resolver` is used for lookups when set; otherwise the system resolver is.
    pub fn new(
        timeout: Duration,
        connector: TokioTlsConnector,
        resolver: Option<TokioAsyncResolver>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("netweb/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpProber {
            client,
            connector,
            resolver,
            timeout,
        })
    }

    pub async fn probe(&self, target: &str) -> Execution {
        let url = match http_url(target) {
            Ok(url) => url,
            Err(e) => return Execution::failed(ProbeError::Http(format!("invalid URL {target:?}: {e}"))),
        };
        let host = url.host_str().unwrap_or_default().to_string();

        let dns_duration = self.measure_dns_time(&host).await;

        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                log::warn!("HTTP probe of {url} failed: {e}");
                let mut execution = Execution::failed(ProbeError::Http(report(&e)));
                if let Some(dns) = dns_duration {
                    execution = execution.with_meta("dns_lookup_ms", format_millis(dns));
                }
                return execution;
            }
        };

        let status = response.status();
        let version = http_version(&response);
        let final_url = response.url().clone();
        let head = format_head(version, status, response.headers());

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let mut execution = Execution::failed(ProbeError::Http(report(&e)));
                execution.output = head;
                return execution;
            }
        };
        let http_duration = start.elapsed();

        let mut execution = Execution {
            output: format!("{head}{body}"),
            ..Default::default()
        }
        .with_meta("http_status", status.as_u16())
        .with_meta("http_version", version)
        .with_meta("http_time_ms", format_millis(http_duration))
        .with_meta("final_url", &final_url);

        if let Some(dns) = dns_duration {
            execution = execution.with_meta("dns_lookup_ms", format_millis(dns));
        }

        if final_url.scheme() == "https" {
            if let Some(days) = self.cert_validity_days(&final_url).await {
                execution = execution.with_meta("cert_valid_days", days);
            }
        }

        execution
    }

    async fn lookup(&self, host: &str, port: u16) -> Option<SocketAddr> {
        let lookup = async {
            match &self.resolver {
                Some(resolver) => {
                    let ip = resolver.lookup_ip(host).await.ok()?.iter().next()?;
                    Some(SocketAddr::new(ip, port))
                }
                None => tokio::net::lookup_host((host, port)).await.ok()?.next(),
            }
        };

        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(addr) => addr,
            Err(_) => {
                log::warn!("DNS lookup of {host} timed out after {:?}", self.timeout);
                None
            }
        }
    }

    async fn measure_dns_time(&self, host: &str) -> Option<Duration> {
        if host.is_empty() || host.parse::<IpAddr>().is_ok() {
            return None;
        }

        let start = Instant::now();
        self.lookup(host, 80).await?;
        Some(start.elapsed())
    }

    async fn cert_validity_days(&self, url: &Url) -> Option<i64> {
        let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
        let port = url.port_or_known_default().unwrap_or(443);
        let socket_addr = self.lookup(host, port).await?;

        let handshake = async {
            let stream = tokio::net::TcpStream::connect(socket_addr).await.ok()?;
            self.connector.connect(host, stream).await.ok()
        };
        let tls_stream = match tokio::time::timeout(self.timeout, handshake).await {
            Ok(stream) => stream?,
            Err(_) => {
                log::warn!("TLS handshake with {socket_addr} timed out after {:?}", self.timeout);
                return None;
            }
        };

        // Extract certificate in blocking context
        let cert_der = tokio::task::spawn_blocking(move || {
            let cert = tls_stream.get_ref().peer_certificate().ok().flatten()?;
            cert.to_der().ok()
        })
        .await
        .ok()??;

        let (_, parsed) = parse_x509_certificate(&cert_der).ok()?;

        let not_after = parsed.validity().not_after.timestamp();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs() as i64;

        Some((not_after - now) / 86400)
    }
}

fn http_version(response: &Response) -> &'static str {
    match response.version() {
        reqwest::Version::HTTP_09 => "HTTP/0.9",
        reqwest::Version::HTTP_10 => "HTTP/1.0",
        reqwest::Version::HTTP_11 => "HTTP/1.1",
        reqwest::Version::HTTP_2 => "HTTP/2",
        reqwest::Version::HTTP_3 => "HTTP/3",
        _ => "UNKNOWN",
    }
}

/// Status line and headers, terminated by the blank line that precedes the body.
fn format_head(version: &str, status: reqwest::StatusCode, headers: &HeaderMap) -> String {
    let mut head = format!("{version} {status}\r\n");
    for (name, value) in headers {
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(&String::from_utf8_lossy(value.as_bytes()));
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head
}

fn format_millis(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::app_config::setup_tls_connector;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> HttpProber {
        prober_with_timeout(Duration::from_secs(5))
    }

    fn prober_with_timeout(timeout: Duration) -> HttpProber {
        let connector = setup_tls_connector().unwrap();
        HttpProber::new(timeout, connector, None).unwrap()
    }

    fn meta<'a>(execution: &'a Execution, key: &str) -> Option<&'a str> {
        execution
            .metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_format_head() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let head = format_head("HTTP/1.1", reqwest::StatusCode::NOT_FOUND, &headers);
        assert_eq!(head, "HTTP/1.1 404 Not Found\r\ncontent-type: text/plain\r\n\r\n");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(Duration::from_micros(12_345)), "12.35");
    }

    #[tokio::test]
    async fn test_probe_prints_head_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("all good"))
            .mount(&server)
            .await;

        let execution = prober().probe(&format!("{}/status", server.uri())).await;

        assert!(execution.error.is_none());
        assert!(execution.output.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(execution.output.ends_with("\r\n\r\nall good"));
        assert_eq!(meta(&execution, "http_status"), Some("200"));
        assert_eq!(meta(&execution, "http_version"), Some("HTTP/1.1"));
        assert!(meta(&execution, "cert_valid_days").is_none());
        // The mock listens on an IP literal, nothing to resolve.
        assert!(meta(&execution, "dns_lookup_ms").is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_still_a_successful_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let execution = prober().probe(&server.uri()).await;

        assert!(execution.error.is_none());
        assert_eq!(meta(&execution, "http_status"), Some("503"));
        assert!(execution.output.contains("503 Service Unavailable"));
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let execution = prober().probe(&format!("{}/old", server.uri())).await;

        assert!(execution.error.is_none());
        assert_eq!(meta(&execution, "final_url"), Some(format!("{}/new", server.uri()).as_str()));
        assert!(execution.output.ends_with("moved"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_probe_error() {
        // Port 9 (discard) on loopback is not expected to accept HTTP.
        let execution = prober().probe("http://127.0.0.1:9/").await;

        let error = execution.error.expect("connection must fail");
        assert!(error.to_string().starts_with("curl error:"));
        assert!(execution.output.is_empty());
    }

    #[tokio::test]
    async fn test_hostname_target_reports_dns_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let target = format!("http://localhost:{}/", server.address().port());
        let execution = prober().probe(&target).await;

        let dns = meta(&execution, "dns_lookup_ms").expect("localhost must resolve");
        assert!(dns.parse::<f64>().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_stalled_handshake_gives_up() {
        // Accepts connections and never answers the TLS ClientHello.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let prober = prober_with_timeout(Duration::from_millis(300));
        let url = Url::parse(&format!("https://127.0.0.1:{port}/")).unwrap();
        let started = Instant::now();
        let days = prober.cert_validity_days(&url).await;

        assert!(days.is_none());
        assert!(started.elapsed() < Duration::from_secs(3));
        holder.abort();
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let execution = prober().probe("http://").await;
        assert!(matches!(execution.error, Some(ProbeError::Http(_))));
    }
}
