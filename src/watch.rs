// ABOUTME: Polls an HTTP endpoint at a fixed interval to observe a traffic switch from outside.
// ABOUTME: Reports per-request status and latency plus success/failure totals.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{HeaderName, HeaderValue, USER_AGENT};
use hyper::{Request, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Endpoint polled when no `--url` is given.
pub const DEFAULT_URL: &str = "http://localhost:9001/color";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Request(String),
}

/// What to poll and how often.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub url: Uri,
    /// Pause between requests; zero runs them back to back.
    pub interval: Duration,
    /// Per-request timeout, covering connect and body.
    pub timeout: Duration,
    /// Stop after this many requests; `None` runs until stopped.
    pub count: Option<u64>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Print bodies verbatim instead of compacting JSON.
    pub raw: bool,
}

/// Parse an endpoint URL. Only absolute `http` and `https` URLs are accepted.
pub fn parse_url(value: &str) -> Result<Uri, String> {
    let uri: Uri = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid URL {value:?}: {e}"))?;
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.authority().is_some() => Ok(uri),
        _ => Err(format!("expected an http:// or https:// URL, got {value:?}")),
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("expected a number of seconds, got {value:?}"))?;
    if secs < 0.0 {
        return Err("value must be >= 0".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{value:?}: {e}"))
}

/// Seconds between requests; zero is allowed.
pub fn parse_interval(value: &str) -> Result<Duration, String> {
    parse_seconds(value)
}

/// Per-request timeout in seconds; must be positive.
pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let timeout = parse_seconds(value)?;
    if timeout.is_zero() {
        return Err("value must be greater than 0".to_string());
    }
    Ok(timeout)
}

/// `NAME=VALUE`, split on the first `=`. The name is trimmed, the value kept as is.
pub fn parse_header(value: &str) -> Result<(HeaderName, HeaderValue), String> {
    let Some((name, header_value)) = value.split_once('=') else {
        return Err("header must look like NAME=VALUE".to_string());
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("header name cannot be empty".to_string());
    }
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
    let header_value = HeaderValue::from_str(header_value)
        .map_err(|e| format!("invalid value for header {name}: {e}"))?;
    Ok((name, header_value))
}

/// Status and body of one answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: Bytes,
}

/// Issues one GET against the watched endpoint.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self) -> Result<Reply, WatchError>;
}

/// Fetches over HTTP or HTTPS with a pooled hyper client.
pub struct HttpFetcher {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    url: Uri,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HttpFetcher {
    pub fn new(settings: &WatchSettings) -> Result<Self, WatchError> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config(settings.insecure)?)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            url: settings.url.clone(),
            headers: settings.headers.clone(),
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self) -> Result<Reply, WatchError> {
        let mut builder = Request::get(self.url.clone())
            .header(USER_AGENT, concat!("bluegreen/", env!("CARGO_PKG_VERSION")));
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        let request = builder
            .body(Empty::new())
            .map_err(|e| WatchError::Request(describe(&e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| WatchError::Request(describe(&e)))?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| WatchError::Request(describe(&e)))?
            .to_bytes();

        Ok(Reply { status, body })
    }
}

/// An error and its sources on one line; hyper's top-level messages are terse.
fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn tls_config(insecure: bool) -> Result<rustls::ClientConfig, WatchError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| WatchError::Tls(e.to_string()))?;

    if insecure {
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth());
    }

    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::debug!(%error, "skipping unreadable native certificate");
    }
    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "loaded native root certificates");

    Ok(builder.with_root_certificates(roots).with_no_client_auth())
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Render a body for one output line. JSON objects and arrays are compacted,
/// JSON strings are unquoted, anything else is shown trimmed.
pub fn format_body(body: &[u8], raw: bool) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    let fallback = |placeholder: &str| {
        if text.is_empty() {
            placeholder.to_string()
        } else {
            text.to_string()
        }
    };

    if raw {
        return fallback("<empty body>");
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(value) => value.to_string(),
        Err(_) => fallback("<non-JSON body>"),
    }
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TickResult {
    /// The endpoint answered, whatever the status code.
    Response {
        status: u16,
        latency_ms: f64,
        body: String,
    },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    /// 1-based request number.
    pub seq: u64,
    #[serde(flatten)]
    pub result: TickResult,
}

impl Tick {
    pub fn is_error(&self) -> bool {
        matches!(self.result, TickResult::Error { .. })
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            TickResult::Response {
                status,
                latency_ms,
                body,
            } => write!(f, "[{:04}] {status} {latency_ms:.1}ms {body}", self.seq),
            TickResult::Error { message } => write!(f, "[{:04}] ERROR {message}", self.seq),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchStats {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WatchSummary {
    #[serde(flatten)]
    pub stats: WatchStats,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Stopped by the caller rather than by the count limit.
    pub interrupted: bool,
}

impl WatchSummary {
    /// A watch passes when at least one request got an answer.
    pub fn any_succeeded(&self) -> bool {
        self.stats.success > 0
    }
}

impl fmt::Display for WatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stopped after {} request(s) in {:.1}s: {} succeeded, {} failed.",
            self.stats.total,
            self.elapsed.as_secs_f64(),
            self.stats.success,
            self.stats.failure
        )
    }
}

/// Poll until `settings.count` requests have finished or `stop` resolves.
///
/// A request cut short by `stop` is not counted. Every finished request is
/// passed to `report` as it completes.
pub async fn watch<F, S>(
    fetcher: &F,
    settings: &WatchSettings,
    stop: S,
    mut report: impl FnMut(&Tick),
) -> WatchSummary
where
    F: Fetch + ?Sized,
    S: Future<Output = ()>,
{
    let started = Instant::now();
    let mut stats = WatchStats::default();
    let mut interrupted = false;
    tokio::pin!(stop);

    loop {
        if settings.count.is_some_and(|limit| stats.total >= limit) {
            break;
        }

        let request_started = Instant::now();
        let attempt = tokio::time::timeout(settings.timeout, fetcher.get());
        let finished = tokio::select! {
            result = attempt => Some(result),
            _ = &mut stop => None,
        };
        let Some(finished) = finished else {
            interrupted = true;
            break;
        };

        stats.total += 1;
        let result = match finished {
            Ok(Ok(reply)) => {
                stats.success += 1;
                TickResult::Response {
                    status: reply.status,
                    latency_ms: request_started.elapsed().as_secs_f64() * 1000.0,
                    body: format_body(&reply.body, settings.raw),
                }
            }
            Ok(Err(e)) => {
                stats.failure += 1;
                TickResult::Error {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                stats.failure += 1;
                TickResult::Error {
                    message: WatchError::Timeout(settings.timeout).to_string(),
                }
            }
        };
        report(&Tick {
            seq: stats.total,
            result,
        });

        if settings.count.is_some_and(|limit| stats.total >= limit) {
            break;
        }
        if !settings.interval.is_zero() {
            let paused = tokio::select! {
                _ = tokio::time::sleep(settings.interval) => true,
                _ = &mut stop => false,
            };
            if !paused {
                interrupted = true;
                break;
            }
        }
    }

    WatchSummary {
        stats,
        elapsed: started.elapsed(),
        interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Answers from a script; each entry waits `delay` before answering.
    struct Scripted {
        replies: Mutex<VecDeque<Result<Reply, WatchError>>>,
        delay: Duration,
        calls: Mutex<u64>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Reply, WatchError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                delay: Duration::ZERO,
                calls: Mutex::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl Fetch for Scripted {
        async fn get(&self) -> Result<Reply, WatchError> {
            *self.calls.lock() += 1;
            tokio::time::sleep(self.delay).await;
            self.replies.lock().pop_front().unwrap_or_else(|| ok(200, "{}"))
        }
    }

    fn ok(status: u16, body: &str) -> Result<Reply, WatchError> {
        Ok(Reply {
            status,
            body: Bytes::from(body.to_string()),
        })
    }

    fn settings(count: Option<u64>) -> WatchSettings {
        WatchSettings {
            url: parse_url(DEFAULT_URL).unwrap(),
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(1),
            count,
            headers: Vec::new(),
            insecure: false,
            raw: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_answers_and_failures_until_the_limit() {
        let fetcher = Scripted::new(vec![
            ok(200, r#"{ "color": "blue" }"#),
            Err(WatchError::Request("connection refused".to_string())),
            ok(503, "draining"),
        ]);
        let mut ticks = Vec::new();

        let summary = watch(&fetcher, &settings(Some(3)), std::future::pending(), |t| {
            ticks.push(t.clone())
        })
        .await;

        assert_eq!(
            summary.stats,
            WatchStats {
                total: 3,
                success: 2,
                failure: 1
            }
        );
        assert!(summary.any_succeeded());
        assert!(!summary.interrupted);
        // Two pauses between three requests.
        assert_eq!(summary.elapsed, Duration::from_secs(1));

        assert_eq!(ticks[0].to_string(), r#"[0001] 200 0.0ms {"color":"blue"}"#);
        assert_eq!(ticks[1].to_string(), "[0002] ERROR connection refused");
        assert!(ticks[1].is_error());
        assert_eq!(ticks[2].to_string(), "[0003] 503 0.0ms draining");
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_means_no_success() {
        let fetcher = Scripted::new(vec![
            Err(WatchError::Request("refused".to_string())),
            Err(WatchError::Request("refused".to_string())),
        ]);
        let summary = watch(&fetcher, &settings(Some(2)), std::future::pending(), |_| {}).await;

        assert_eq!(summary.stats.failure, 2);
        assert!(!summary.any_succeeded());
        assert_eq!(
            summary.to_string(),
            "Stopped after 2 request(s) in 0.5s: 0 succeeded, 2 failed."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_endpoint_times_out_per_request() {
        let fetcher = Scripted::slow(Duration::from_secs(5));
        let mut ticks = Vec::new();

        let summary = watch(&fetcher, &settings(Some(2)), std::future::pending(), |t| {
            ticks.push(t.clone())
        })
        .await;

        assert_eq!(summary.stats.failure, 2);
        assert!(ticks.iter().all(|t| t.to_string().contains("timed out after 1s")));
        // Two 1s timeouts plus one pause.
        assert_eq!(summary.elapsed, Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_measured_per_request() {
        let fetcher = Scripted::slow(Duration::from_millis(250));
        let mut ticks = Vec::new();
        watch(&fetcher, &settings(Some(1)), std::future::pending(), |t| {
            ticks.push(t.clone())
        })
        .await;

        assert_eq!(ticks[0].to_string(), "[0001] 200 250.0ms {}");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_runs_back_to_back() {
        let fetcher = Scripted::new(Vec::new());
        let settings = WatchSettings {
            interval: Duration::ZERO,
            ..settings(Some(4))
        };
        let summary = watch(&fetcher, &settings, std::future::pending(), |_| {}).await;

        assert_eq!(summary.stats.total, 4);
        assert_eq!(summary.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_an_unbounded_watch() {
        let fetcher = Scripted::new(Vec::new());
        let stop = tokio::time::sleep(Duration::from_millis(1200));

        let summary = watch(&fetcher, &settings(None), stop, |_| {}).await;

        // Requests at 0, 0.5 and 1.0s; stopped during the following pause.
        assert_eq!(summary.stats.total, 3);
        assert!(summary.interrupted);
        assert!(summary.any_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn request_cut_short_by_stop_is_not_counted() {
        let fetcher = Scripted::slow(Duration::from_millis(800));
        let stop = tokio::time::sleep(Duration::from_millis(300));

        let summary = watch(&fetcher, &settings(None), stop, |_| {}).await;

        assert_eq!(*fetcher.calls.lock(), 1);
        assert_eq!(summary.stats, WatchStats::default());
        assert!(summary.interrupted);
    }

    #[test]
    fn interval_and_timeout_validation() {
        assert_eq!(parse_interval("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_interval("0.25").unwrap(), Duration::from_millis(250));
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("soon").is_err());

        assert_eq!(parse_timeout("1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_timeout("0").unwrap_err().contains("greater than 0"));
        assert!(parse_timeout("-2").is_err());
    }

    #[test]
    fn header_validation() {
        let (name, value) = parse_header(" X-Canary =blue=1").unwrap();
        assert_eq!(name.as_str(), "x-canary");
        assert_eq!(value.to_str().unwrap(), "blue=1");

        assert!(parse_header("X-Empty=").is_ok());
        assert!(parse_header("no-equals").unwrap_err().contains("NAME=VALUE"));
        assert!(parse_header(" =value").unwrap_err().contains("cannot be empty"));
        assert!(parse_header("bad name=1").is_err());
    }

    #[test]
    fn url_validation() {
        assert!(parse_url("https://shop.example.com/color").is_ok());
        assert!(parse_url("ftp://shop.example.com").is_err());
        assert!(parse_url("/color").is_err());
    }

    #[test]
    fn body_formatting() {
        assert_eq!(format_body(b"{ \"a\": [1, 2] }", false), r#"{"a":[1,2]}"#);
        assert_eq!(format_body(b"\"green\"", false), "green");
        assert_eq!(format_body(b"  hello \n", false), "hello");
        assert_eq!(format_body(b"", false), "<non-JSON body>");
        assert_eq!(format_body(b"{ \"a\": 1 }", true), r#"{ "a": 1 }"#);
        assert_eq!(format_body(b"   ", true), "<empty body>");
    }

    #[test]
    fn insecure_and_verified_tls_configs_build() {
        assert!(tls_config(true).is_ok());
        assert!(tls_config(false).is_ok());
    }
}
