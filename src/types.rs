use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// A single network endpoint to connect-probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub host: IpAddr,
    pub port: u16,
}

impl Target {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Detection strategy implied by a payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Sqli,
    SqliBlind,
    Xss,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload {
    pub value: String,
    pub kind: PayloadKind,
}

impl Payload {
    pub fn new(value: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// Encoding of a POST body carrying the payload. Ignored for GET.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BodyFormat {
    Json,
    Form,
}

/// Rule used to turn a [`ProbeOutcome`] into a [`Finding`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Port is open when the TCP handshake completed.
    PortLiveness,
    /// Vulnerable when the raw payload appears in the response body.
    ReflectedContent,
    /// Vulnerable when the server answered 200.
    SuccessStatus,
    /// Vulnerable when the response took strictly longer than the threshold.
    BlindTiming { threshold_ms: u64 },
}

impl Rule {
    pub fn blind_timing(threshold: Duration) -> Self {
        Rule::BlindTiming {
            threshold_ms: threshold.as_millis() as u64,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::PortLiveness => f.write_str("port-liveness"),
            Rule::ReflectedContent => f.write_str("reflected-content"),
            Rule::SuccessStatus => f.write_str("success-status"),
            Rule::BlindTiming { threshold_ms } => write!(f, "blind-timing>{threshold_ms}ms"),
        }
    }
}

/// An HTTP endpoint template: where the payload goes and how the answer is judged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub url: String,
    pub method: HttpMethod,
    /// Query parameter (GET) or body field (POST) that carries the payload.
    pub field: String,
    pub body: BodyFormat,
    /// Extra constant fields sent alongside the payload.
    pub fixed_fields: Vec<(String, String)>,
    pub timeout_ms: u64,
    pub rule: Rule,
}

impl Endpoint {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One (endpoint, payload) pair to send.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpCandidate {
    pub endpoint: Endpoint,
    pub payload: Payload,
}

/// Anything the scheduler can dispatch to a probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Candidate {
    Port(Target),
    Http(HttpCandidate),
}

impl Candidate {
    pub fn rule(&self) -> Rule {
        match self {
            Candidate::Port(_) => Rule::PortLiveness,
            Candidate::Http(c) => c.endpoint.rule,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Candidate::Port(_) => None,
            Candidate::Http(c) => Some(&c.payload),
        }
    }

    pub fn target(&self) -> Option<Target> {
        match self {
            Candidate::Port(t) => Some(*t),
            Candidate::Http(_) => None,
        }
    }

    /// Human readable subject used in findings.
    pub fn subject(&self) -> String {
        match self {
            Candidate::Port(t) => t.to_string(),
            Candidate::Http(c) => format!(
                "{} {} [{}]",
                c.endpoint.method, c.endpoint.url, c.endpoint.field
            ),
        }
    }
}

impl From<Target> for Candidate {
    fn from(t: Target) -> Self {
        Candidate::Port(t)
    }
}

impl From<HttpCandidate> for Candidate {
    fn from(c: HttpCandidate) -> Self {
        Candidate::Http(c)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Refused,
    Unreachable,
    /// Resolver unreachable or failing.
    Dns,
    /// Resolver answered with no record for the name.
    NoRecord,
    Other,
}

/// Expected network failure carried inside an outcome. Never fatal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("timed out after {} ms", after.as_millis()),
        )
    }

    pub fn from_io(err: &io::Error) -> Self {
        Self::new(kind_of_io(err.kind()), err.to_string())
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if let Some(io_kind) = io_kind_in_chain(err) {
            kind_of_io(io_kind)
        } else if err.is_connect() {
            TransportErrorKind::Refused
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

fn kind_of_io(kind: io::ErrorKind) -> TransportErrorKind {
    match kind {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            TransportErrorKind::Refused
        }
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::AddrNotAvailable => TransportErrorKind::Unreachable,
        _ => TransportErrorKind::Other,
    }
}

fn io_kind_in_chain(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        cur = e.source();
    }
    None
}

/// Raw result of executing one probe. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub candidate: Candidate,
    pub elapsed: Duration,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<TransportError>,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Open,
    Vulnerable,
    Blocked,
    Clean,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Open => "OPEN",
            Verdict::Vulnerable => "VULNERABLE",
            Verdict::Blocked => "BLOCKED",
            Verdict::Clean => "CLEAN",
        };
        f.write_str(s)
    }
}

/// Classified result of one probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub subject: String,
    pub verdict: Verdict,
    pub evidence: String,
    pub rule: Rule,
    pub target: Option<Target>,
    pub payload: Option<Payload>,
    pub error: Option<TransportErrorKind>,
    pub elapsed_ms: u64,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Discover,
    Sqli,
    Xss,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Discover => f.write_str("discover"),
            ScanMode::Sqli => f.write_str("sqli"),
            ScanMode::Xss => f.write_str("xss"),
        }
    }
}

/// Terminal artifact of a run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub mode: ScanMode,
    pub candidates_total: u64,
    pub elapsed_ms: u64,
    /// Enumeration branches dropped because of a configuration error.
    pub skipped: Vec<String>,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.findings.iter().filter(|f| f.verdict == verdict).count()
    }

    /// Open ports grouped by host, sorted.
    pub fn open_ports_by_host(&self) -> BTreeMap<IpAddr, Vec<u16>> {
        let mut map: BTreeMap<IpAddr, Vec<u16>> = BTreeMap::new();
        for t in self
            .findings
            .iter()
            .filter(|f| f.verdict == Verdict::Open)
            .filter_map(|f| f.target)
        {
            map.entry(t.host).or_default().push(t.port);
        }
        for ports in map.values_mut() {
            ports.sort_unstable();
        }
        map
    }

    /// True when the run never reached the network at all.
    ///
    /// For HTTP modes any transport error counts; for discovery only
    /// `Unreachable`/`Dns` do, since refusals, timeouts and missing PTR
    /// records are ordinary negative answers.
    pub fn is_operational_failure(&self) -> bool {
        if self.findings.is_empty() {
            return false;
        }
        self.findings.iter().all(|f| match (self.mode, f.error) {
            (_, None) => false,
            (ScanMode::Discover, Some(kind)) => {
                matches!(kind, TransportErrorKind::Unreachable | TransportErrorKind::Dns)
            }
            (_, Some(_)) => true,
        })
    }
}
