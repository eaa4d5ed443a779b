use async_trait::async_trait;
use hostpulse_common::types::MetricsRecord;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Maximum length of a response body kept in a [`TransportError::Status`].
pub const MAX_BODY_LENGTH: usize = 256;

/// Errors raised while delivering a record. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout and other request-level errors.
    #[error("HTTP request failed: {}", error_chain(.0))]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("collector returned status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivers one record to the collection endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, record: &MetricsRecord) -> Result<(), TransportError>;

    /// Where records go, for logging.
    fn target(&self) -> &str;
}

/// POSTs each record as a JSON body.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, record: &MetricsRecord) -> Result<(), TransportError> {
        let body = serde_json::to_vec(record)?;
        let resp = self
            .client
            .post(self.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = match resp.text().await {
            Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
            Err(e) => format!("[failed to read response body: {e}]"),
        };
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn target(&self) -> &str {
        &self.url
    }
}

/// Joins an error's message with every cause below it.
///
/// reqwest's own message omits the underlying I/O error, which is the part
/// an operator needs ("Connection refused", "timed out").
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Truncates to at most `max_chars` characters, marking the cut.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}... [truncated]", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    fn record() -> MetricsRecord {
        MetricsRecord {
            hostname: "test-host".to_string(),
            timestamp: 1_700_000_000_000_000_000,
            cpu_usage: 12.0,
            memory_usage: 34.5,
            disk_usage: 56.25,
            disk_io_read: 8192,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/metrics")
    }

    #[tokio::test]
    async fn posts_json_record() {
        let received: Arc<Mutex<Option<(String, MetricsRecord)>>> = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/metrics",
            post(move |headers: HeaderMap, body: String| {
                let sink = sink.clone();
                async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let parsed: MetricsRecord = serde_json::from_str(&body).unwrap();
                    *sink.lock().unwrap() = Some((content_type, parsed));
                    StatusCode::OK
                }
            }),
        );
        let url = serve(app).await;

        let transport = HttpTransport::new(&url, Duration::from_secs(5)).unwrap();
        transport.send(&record()).await.unwrap();

        let (content_type, parsed) = received.lock().unwrap().take().unwrap();
        assert_eq!(content_type, "application/json");
        assert_eq!(parsed, record());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/metrics",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "x".repeat(1000)) }),
        );
        let url = serve(app).await;

        let transport = HttpTransport::new(&url, Duration::from_secs(5)).unwrap();
        match transport.send(&record()).await {
            Err(TransportError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.ends_with("... [truncated]"));
                assert!(body.len() < 300);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(&format!("http://{addr}/metrics"), Duration::from_secs(5)).unwrap();
        let err = transport.send(&record()).await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
        let message = err.to_string().to_lowercase();
        assert!(message.contains("refused"), "cause missing from: {message}");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn error_chain_walks_sources() {
        assert_eq!(error_chain(&Outer(Inner)), "outer: inner");
        assert_eq!(error_chain(&Inner), "inner");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("ééééé", 2), "éé... [truncated]");
    }
}
