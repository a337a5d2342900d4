//! Probe executors: one bounded-time network operation per candidate.
use crate::config::ConfigError;
use crate::types::{
    BodyFormat, Candidate, HttpCandidate, HttpMethod, ProbeOutcome, Target, TransportError,
    TransportErrorKind,
};
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::Duration;
use ::time::{format_description::well_known, OffsetDateTime};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

/// Execute one probe and report what happened. Implementations never fail:
/// network errors are recorded in the outcome.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    type Candidate: Into<Candidate> + Send + 'static;

    async fn execute(&self, candidate: Self::Candidate) -> ProbeOutcome;
}

/// TCP connect liveness check. The connection is shut down as soon as it is established.
#[derive(Clone)]
pub struct ConnectProbe {
    timeout: Duration,
    resolver: Option<TokioAsyncResolver>,
}

impl ConnectProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            resolver: None,
        }
    }

    /// Require a PTR record for the host before connecting.
    pub fn with_reverse_lookup(mut self, resolver: TokioAsyncResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    async fn reverse_lookup(&self, host: IpAddr) -> Result<(), TransportError> {
        let Some(resolver) = &self.resolver else {
            return Ok(());
        };
        match time::timeout(self.timeout, resolver.reverse_lookup(host)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                // NXDOMAIN still means the resolver answered.
                let kind = match e.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => TransportErrorKind::NoRecord,
                    _ => TransportErrorKind::Dns,
                };
                Err(TransportError::new(kind, e.to_string()))
            }
            Err(_) => Err(TransportError::new(
                TransportErrorKind::Dns,
                format!("reverse lookup of {host} timed out"),
            )),
        }
    }

    async fn connect(&self, target: Target) -> Result<(), TransportError> {
        let addr = target.socket_addr();
        match time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(mut stream)) => {
                if let Err(e) = stream.shutdown().await {
                    debug!("Shutdown stream error {}: {}", addr, e);
                }
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::from_io(&e)),
            Err(_) => Err(TransportError::timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Probe for ConnectProbe {
    type Candidate = Target;

    async fn execute(&self, target: Target) -> ProbeOutcome {
        let timestamp = now_rfc3339();
        let start = Instant::now();
        let result = match self.reverse_lookup(target.host).await {
            Ok(()) => self.connect(target).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();
        debug!("connect {} -> {:?} in {:?}", target, result, elapsed);
        ProbeOutcome {
            candidate: Candidate::Port(target),
            elapsed,
            status: None,
            body: None,
            error: result.err(),
            timestamp,
        }
    }
}

/// Resolver from the system configuration, falling back to Cloudflare.
pub fn system_resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
        TokioAsyncResolver::tokio(ResolverConfig::cloudflare(), ResolverOpts::default())
    })
}

/// Sends one crafted HTTP request and captures status, body and latency.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("recon-probe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self { client })
    }

    fn build_request(&self, c: &HttpCandidate) -> reqwest::RequestBuilder {
        let ep = &c.endpoint;
        let mut fields: Vec<(&str, &str)> = vec![(ep.field.as_str(), c.payload.value.as_str())];
        fields.extend(ep.fixed_fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let request = match ep.method {
            HttpMethod::Get => self.client.get(&ep.url).query(&fields),
            HttpMethod::Post => match ep.body {
                BodyFormat::Json => {
                    let body: serde_json::Map<String, serde_json::Value> = fields
                        .iter()
                        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
                        .collect();
                    self.client.post(&ep.url).json(&body)
                }
                BodyFormat::Form => self.client.post(&ep.url).form(&fields),
            },
        };
        request.timeout(ep.timeout())
    }

    async fn send(&self, c: &HttpCandidate) -> Result<(u16, String), TransportError> {
        let response = self
            .build_request(c)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        Ok((status, body))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    type Candidate = HttpCandidate;

    async fn execute(&self, candidate: HttpCandidate) -> ProbeOutcome {
        let timestamp = now_rfc3339();
        let start = Instant::now();
        let result = self.send(&candidate).await;
        let elapsed = start.elapsed();
        debug!(
            "{} {} payload={:?} -> {:?} in {:?}",
            candidate.endpoint.method,
            candidate.endpoint.url,
            candidate.payload.value,
            result.as_ref().map(|(status, _)| status),
            elapsed
        );
        let (status, body, error) = match result {
            Ok((status, body)) => (Some(status), Some(body), None),
            Err(e) => (None, None, Some(e)),
        };
        ProbeOutcome {
            candidate: Candidate::Http(candidate),
            elapsed,
            status,
            body,
            error,
            timestamp,
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
