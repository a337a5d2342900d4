//! Runtime configuration: built-in defaults, an optional TOML file, then CLI overrides.
use crate::netdetect::HostRange;
use crate::payloads;
use crate::ports::DEFAULT_PORTS;
use crate::types::{BodyFormat, Payload};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Cluster service networks probed by `discover` when none are configured.
pub const DEFAULT_PREFIXES: &[&str] = &[
    "10.96.0",
    "10.244.0",
    "10.109.88",
    "10.108.142",
    "10.107.67",
    "10.106.139",
];

pub const DEFAULT_TARGET_URL: &str = "http://localhost:8080";
pub const DEFAULT_WORKERS: usize = 50;
/// Upper clamp for the worker budget.
pub const MAX_WORKERS: usize = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid target URL {url:?}: {reason}")]
    InvalidTargetUrl { url: String, reason: String },
    #[error("invalid network prefix {0:?}")]
    InvalidPrefix(String),
    #[error("invalid host range {0:?} (expected lo-hi with lo <= hi)")]
    InvalidHostRange(String),
    #[error("no valid network prefix to scan")]
    NoNetworks,
    #[error("port list is empty")]
    NoPorts,
    #[error("worker budget must be at least 1")]
    NoWorkers,
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub prefixes: Vec<String>,
    pub host_range: HostRange,
    pub ports: Vec<u16>,
    /// Per-attempt TCP connect deadline.
    pub connect_timeout: Duration,
    /// Deadline for status and reflection probes.
    pub http_timeout: Duration,
    /// Deadline for timing probes; must exceed `blind_threshold`.
    pub blind_timeout: Duration,
    pub blind_threshold: Duration,
    pub workers: usize,
    pub payloads: Vec<Payload>,
    /// Skip connecting to hosts without a PTR record.
    pub reverse_lookup: bool,
    /// Encoding of POST bodies sent to login and comment endpoints.
    pub body_format: BodyFormat,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|s| s.to_string()).collect(),
            host_range: HostRange::default(),
            ports: DEFAULT_PORTS.to_vec(),
            connect_timeout: Duration::from_secs(1),
            http_timeout: Duration::from_secs(5),
            blind_timeout: Duration::from_secs(10),
            blind_threshold: Duration::from_secs(4),
            workers: DEFAULT_WORKERS,
            payloads: payloads::default_payloads(),
            reverse_lookup: false,
            body_format: BodyFormat::Json,
        }
    }
}

impl ScanConfig {
    /// Overlay values present in a config file.
    pub fn merge(&mut self, file: &FileConfig) {
        macro_rules! merge_plain {
            ($($field: ident),+) => {
                $(
                    if let Some(v) = &file.$field {
                        self.$field = v.clone();
                    }
                )+
            }
        }
        macro_rules! merge_millis {
            ($($src: ident => $dst: ident),+) => {
                $(
                    if let Some(ms) = file.$src {
                        self.$dst = Duration::from_millis(ms);
                    }
                )+
            }
        }

        merge_plain!(prefixes, ports, workers, payloads, reverse_lookup, body_format);
        merge_millis!(
            timeout_ms => connect_timeout,
            http_timeout_ms => http_timeout,
            blind_timeout_ms => blind_timeout,
            blind_threshold_ms => blind_threshold
        );
        if let Some([lo, hi]) = file.host_range {
            self.host_range = HostRange { lo, hi };
        }
    }

    /// Checks that hold regardless of mode. Run before any enumeration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        HostRange::new(self.host_range.lo, self.host_range.hi)?;
        Ok(())
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}

/// Options read from a TOML file. Every key is optional.
///
/// # Format
///
/// prefixes = ["10.96.0", "10.244.0.0/24"]
/// host_range = [1, 254]
/// ports = [22, 80, 443]
/// timeout_ms = 1000
/// workers = 50
/// blind_threshold_ms = 4000
/// payloads = [{ value = "' OR 1=1--", kind = "sqli" }]
/// body_format = "form"
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub prefixes: Option<Vec<String>>,
    pub host_range: Option<[u32; 2]>,
    pub ports: Option<Vec<u16>>,
    pub timeout_ms: Option<u64>,
    pub http_timeout_ms: Option<u64>,
    pub blind_timeout_ms: Option<u64>,
    pub blind_threshold_ms: Option<u64>,
    pub workers: Option<usize>,
    pub payloads: Option<Vec<Payload>>,
    pub reverse_lookup: Option<bool>,
    pub body_format: Option<BodyFormat>,
}

impl FileConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }
}
