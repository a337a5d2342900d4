//! One entry point per probing mode. Each builds its candidate space, runs it
//! through the scheduler and returns a [`ScanReport`].
use crate::config::{ConfigError, ScanConfig};
use crate::enumerate;
use crate::netdetect::NetworkRange;
use crate::probe::{system_resolver, ConnectProbe, HttpProbe};
use crate::scanner::{run_probes, FindingSink};
use crate::types::{
    BodyFormat, Endpoint, HttpMethod, Payload, PayloadKind, Rule, ScanMode, ScanReport,
};
use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Connect-scan every (prefix, host, port) combination.
///
/// Malformed prefixes are skipped and listed in [`ScanReport::skipped`]; the
/// run fails only if none is usable or there are no ports.
pub async fn discover(config: &ScanConfig, sink: Option<FindingSink>) -> Result<ScanReport, ConfigError> {
    config.validate()?;
    if config.ports.is_empty() {
        return Err(ConfigError::NoPorts);
    }

    let mut skipped = Vec::new();
    let mut ranges = Vec::new();
    for prefix in &config.prefixes {
        match NetworkRange::parse(prefix, config.host_range) {
            Ok(range) => ranges.push(range),
            Err(e) => {
                warn!("Skipping {prefix:?}: {e}");
                skipped.push(format!("{prefix} ({e})"));
            }
        }
    }
    if ranges.is_empty() {
        return Err(ConfigError::NoNetworks);
    }

    let total = enumerate::target_count(&ranges, &config.ports);
    info!(
        "Discovering hosts {} in {} networks, {} ports each: {} candidates",
        config.host_range,
        ranges.len(),
        config.ports.len(),
        total
    );

    let mut probe = ConnectProbe::new(config.connect_timeout);
    if config.reverse_lookup {
        probe = probe.with_reverse_lookup(system_resolver());
    }

    let started = Instant::now();
    let findings = run_probes(
        Arc::new(probe),
        enumerate::targets(&ranges, &config.ports),
        config.effective_workers(),
        sink,
    )
    .await;

    Ok(ScanReport {
        mode: ScanMode::Discover,
        candidates_total: total,
        elapsed_ms: started.elapsed().as_millis() as u64,
        skipped,
        findings,
    })
}

/// Boolean and time-based SQL injection against `{target}/api/login`.
pub async fn probe_sqli(
    config: &ScanConfig,
    target_url: &str,
    sink: Option<FindingSink>,
) -> Result<ScanReport, ConfigError> {
    let base = parse_base_url(target_url)?;
    let plans = vec![
        (
            login_endpoint(&base, Rule::SuccessStatus, config.http_timeout.as_millis() as u64),
            payloads_of(config, PayloadKind::Sqli),
        ),
        (
            login_endpoint(
                &base,
                Rule::blind_timing(config.blind_threshold),
                config.blind_timeout.as_millis() as u64,
            ),
            payloads_of(config, PayloadKind::SqliBlind),
        ),
    ];
    info!("Testing SQL Injection on {}", base);
    run_http(ScanMode::Sqli, config, plans, sink).await
}

/// Reflected XSS via `GET {target}/?search=` and the stored-XSS approximation
/// via `POST {target}/api/comments`.
pub async fn probe_xss(
    config: &ScanConfig,
    target_url: &str,
    sink: Option<FindingSink>,
) -> Result<ScanReport, ConfigError> {
    let base = parse_base_url(target_url)?;
    let timeout_ms = config.http_timeout.as_millis() as u64;
    let xss = payloads_of(config, PayloadKind::Xss);
    let plans = vec![
        (
            endpoint_at(&base, "/", HttpMethod::Get, "search", Vec::new(), timeout_ms, Rule::ReflectedContent),
            xss.clone(),
        ),
        (
            endpoint_at(
                &base,
                "/api/comments",
                HttpMethod::Post,
                "comment",
                Vec::new(),
                timeout_ms,
                Rule::SuccessStatus,
            ),
            xss,
        ),
    ];
    info!("Testing XSS on {}", base);
    run_http(ScanMode::Xss, config, plans, sink).await
}

type Plan = (Result<Endpoint, ConfigError>, Vec<Payload>);

async fn run_http(
    mode: ScanMode,
    config: &ScanConfig,
    plans: Vec<Plan>,
    sink: Option<FindingSink>,
) -> Result<ScanReport, ConfigError> {
    config.validate()?;
    let probe = HttpProbe::new()?;

    let mut skipped = Vec::new();
    let mut usable: Vec<(Endpoint, Vec<Payload>)> = Vec::new();
    for (endpoint, payloads) in plans {
        match endpoint {
            Ok(mut ep) => {
                ep.body = config.body_format;
                usable.push((ep, payloads));
            }
            Err(e) => {
                warn!("Skipping endpoint: {e}");
                skipped.push(e.to_string());
            }
        }
    }

    let total: u64 = usable.iter().map(|(_, p)| p.len() as u64).sum();
    let candidates = usable
        .iter()
        .flat_map(|(ep, payloads)| enumerate::payload_candidates(ep, payloads));

    let started = Instant::now();
    let findings = run_probes(Arc::new(probe), candidates, config.effective_workers(), sink).await;

    Ok(ScanReport {
        mode,
        candidates_total: total,
        elapsed_ms: started.elapsed().as_millis() as u64,
        skipped,
        findings,
    })
}

fn payloads_of(config: &ScanConfig, kind: PayloadKind) -> Vec<Payload> {
    config
        .payloads
        .iter()
        .filter(|p| p.kind == kind)
        .cloned()
        .collect()
}

/// Validate the operator-supplied base URL. Failure here aborts the run.
pub fn parse_base_url(target_url: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTargetUrl {
        url: target_url.to_string(),
        reason,
    };
    let url = Url::parse(target_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn login_endpoint(base: &Url, rule: Rule, timeout_ms: u64) -> Result<Endpoint, ConfigError> {
    endpoint_at(
        base,
        "/api/login",
        HttpMethod::Post,
        "username",
        vec![("password".to_string(), "test".to_string())],
        timeout_ms,
        rule,
    )
}

/// `path` is appended to the base URL's own path, so a base of
/// `http://host/app` yields `http://host/app/api/login`.
fn endpoint_at(
    base: &Url,
    path: &str,
    method: HttpMethod,
    field: &str,
    fixed_fields: Vec<(String, String)>,
    timeout_ms: u64,
    rule: Rule,
) -> Result<Endpoint, ConfigError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    let joined = format!(
        "{}/{}",
        url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let url = Url::parse(&joined).map_err(|e| ConfigError::InvalidTargetUrl {
        url: joined.clone(),
        reason: e.to_string(),
    })?;
    Ok(Endpoint {
        url: url.to_string(),
        method,
        field: field.to_string(),
        body: BodyFormat::Json,
        fixed_fields,
        timeout_ms,
        rule,
    })
}
