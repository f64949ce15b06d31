//! Measurement service client.
//!
//! The measurement service brackets a benchmark and each of its runs:
//!
//! ```text
//!   POST /start-benchmark
//!     POST /start-run   {"WL1":"NG1-10.0.0.1-cuda", ...}
//!     POST /end-run     → {"latency_ms": ..., ...}
//!     ...
//!   POST /end-benchmark
//! ```
//!
//! Every call except `end-benchmark` must answer `200 OK`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use thiserror::Error;
use tracing::debug;

/// Open-ended result object returned by `end-run`.
pub type RunResults = serde_json::Map<String, serde_json::Value>;

pub type MeasurementResult<T> = Result<T, MeasurementError>;

#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("invalid measurement address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to connect to measurement service at {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{call} answered {status}")]
    Status { call: &'static str, status: StatusCode },

    #[error("{call} returned a malformed body: {source}")]
    Decode {
        call: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Run and benchmark boundaries reported to the measurement service.
#[async_trait]
pub trait MeasurementService: Send + Sync + 'static {
    /// Base address, published to templates as `addr.measurement`.
    fn address(&self) -> &str;

    async fn start_benchmark(&self) -> MeasurementResult<()>;

    /// Announce a run with its workload → identifier correlation map.
    async fn start_run(&self, correlation: &BTreeMap<String, String>) -> MeasurementResult<()>;

    async fn end_run(&self) -> MeasurementResult<RunResults>;

    async fn end_benchmark(&self) -> MeasurementResult<()>;
}

/// HTTP/1 client speaking plain `http://`.
///
/// Each call opens its own connection; there are only four calls per run.
#[derive(Debug, Clone)]
pub struct HttpMeasurementClient {
    address: String,
    authority: String,
    prefix: String,
}

impl HttpMeasurementClient {
    pub fn new(address: &str) -> MeasurementResult<Self> {
        let invalid = |reason: &str| MeasurementError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = address.parse().map_err(|_| invalid("not a URI"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(_) => return Err(invalid("only http:// is supported")),
            None => return Err(invalid("missing http:// scheme")),
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);

        Ok(Self {
            address: address.trim_end_matches('/').to_string(),
            authority: format!("{host}:{port}"),
            prefix: uri.path().trim_end_matches('/').to_string(),
        })
    }

    async fn post(
        &self,
        call: &'static str,
        body: Option<Vec<u8>>,
    ) -> MeasurementResult<(StatusCode, Bytes)> {
        let path = format!("{}/{call}", self.prefix);

        let stream = tokio::net::TcpStream::connect(&self.authority)
            .await
            .map_err(|source| MeasurementError::Connect {
                authority: self.authority.clone(),
                source,
            })?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "measurement connection closed with error");
            }
        });

        let mut builder = http::Request::builder()
            .method(Method::POST)
            .uri(path.as_str())
            .header(http::header::HOST, self.authority.as_str())
            .header(http::header::USER_AGENT, "benchgrid/0.1");
        if body.is_some() {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        let req = builder.body(Full::new(Bytes::from(body.unwrap_or_default())))?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        let bytes = resp.into_body().collect().await?.to_bytes();
        debug!(%call, %status, bytes = bytes.len(), "measurement call answered");
        Ok((status, bytes))
    }

    async fn expect_ok(
        &self,
        call: &'static str,
        body: Option<Vec<u8>>,
    ) -> MeasurementResult<Bytes> {
        let (status, bytes) = self.post(call, body).await?;
        if status != StatusCode::OK {
            return Err(MeasurementError::Status { call, status });
        }
        Ok(bytes)
    }
}

#[async_trait]
impl MeasurementService for HttpMeasurementClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn start_benchmark(&self) -> MeasurementResult<()> {
        self.expect_ok("start-benchmark", None).await?;
        Ok(())
    }

    async fn start_run(&self, correlation: &BTreeMap<String, String>) -> MeasurementResult<()> {
        let body = serde_json::to_vec(correlation).map_err(MeasurementError::Encode)?;
        self.expect_ok("start-run", Some(body)).await?;
        Ok(())
    }

    async fn end_run(&self) -> MeasurementResult<RunResults> {
        let bytes = self.expect_ok("end-run", None).await?;
        serde_json::from_slice(&bytes).map_err(|source| MeasurementError::Decode {
            call: "end-run",
            source,
        })
    }

    async fn end_benchmark(&self) -> MeasurementResult<()> {
        let (status, _) = self.post("end-benchmark", None).await?;
        if !status.is_success() {
            return Err(MeasurementError::Status {
                call: "end-benchmark",
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<String>>>,
        correlation: Arc<Mutex<Option<BTreeMap<String, String>>>>,
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn record_start_run(
        State(r): State<Recorded>,
        Json(body): Json<BTreeMap<String, String>>,
    ) {
        r.calls.lock().unwrap().push("start-run".to_string());
        *r.correlation.lock().unwrap() = Some(body);
    }

    fn recording_router(recorded: Recorded) -> Router {
        Router::new()
            .route(
                "/start-benchmark",
                post(|State(r): State<Recorded>| async move {
                    r.calls.lock().unwrap().push("start-benchmark".to_string());
                }),
            )
            .route("/start-run", post(record_start_run))
            .route(
                "/end-run",
                post(|State(r): State<Recorded>| async move {
                    r.calls.lock().unwrap().push("end-run".to_string());
                    Json(json!({ "latency_ms": 12.5, "frames": 300 }))
                }),
            )
            .route(
                "/end-benchmark",
                post(|State(r): State<Recorded>| async move {
                    r.calls.lock().unwrap().push("end-benchmark".to_string());
                }),
            )
            .with_state(recorded)
    }

    #[test]
    fn parses_base_address() {
        let client = HttpMeasurementClient::new("http://10.0.0.5:8080/").unwrap();
        assert_eq!(client.address(), "http://10.0.0.5:8080");
        assert_eq!(client.authority, "10.0.0.5:8080");
        assert_eq!(client.prefix, "");

        let client = HttpMeasurementClient::new("http://measure.lan/api").unwrap();
        assert_eq!(client.authority, "measure.lan:80");
        assert_eq!(client.prefix, "/api");
    }

    #[test]
    fn rejects_unsupported_addresses() {
        assert!(matches!(
            HttpMeasurementClient::new("https://10.0.0.5"),
            Err(MeasurementError::InvalidAddress { .. })
        ));
        assert!(matches!(
            HttpMeasurementClient::new("10.0.0.5:8080"),
            Err(MeasurementError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn full_benchmark_protocol() {
        let recorded = Recorded::default();
        let base = serve(recording_router(recorded.clone())).await;
        let client = HttpMeasurementClient::new(&base).unwrap();

        let mut correlation = BTreeMap::new();
        correlation.insert("WL1".to_string(), "NG1-10.0.0.1-cuda".to_string());

        client.start_benchmark().await.unwrap();
        client.start_run(&correlation).await.unwrap();
        let results = client.end_run().await.unwrap();
        client.end_benchmark().await.unwrap();

        assert_eq!(results["frames"], json!(300));
        assert_eq!(results["latency_ms"], json!(12.5));
        assert_eq!(
            *recorded.calls.lock().unwrap(),
            vec!["start-benchmark", "start-run", "end-run", "end-benchmark"]
        );
        assert_eq!(recorded.correlation.lock().unwrap().as_ref(), Some(&correlation));
    }

    #[tokio::test]
    async fn non_ok_status_is_an_error() {
        let router = Router::new()
            .route("/start-run", post(|| async { AxumStatus::CONFLICT }))
            .route("/end-benchmark", post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }));
        let client = HttpMeasurementClient::new(&serve(router).await).unwrap();

        let err = client.start_run(&BTreeMap::new()).await.unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::Status { call: "start-run", status } if status == StatusCode::CONFLICT
        ));

        let err = client.start_benchmark().await.unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));

        assert!(client.end_benchmark().await.is_err());
    }

    #[tokio::test]
    async fn end_run_requires_json_object() {
        let router = Router::new().route("/end-run", post(|| async { "[1, 2, 3]" }));
        let client = HttpMeasurementClient::new(&serve(router).await).unwrap();

        let err = client.end_run().await.unwrap_err();
        assert!(matches!(err, MeasurementError::Decode { call: "end-run", .. }));
    }

    #[tokio::test]
    async fn unreachable_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpMeasurementClient::new(&format!("http://{addr}")).unwrap();
        let err = client.start_benchmark().await.unwrap_err();
        assert!(matches!(err, MeasurementError::Connect { .. }));
    }
}
