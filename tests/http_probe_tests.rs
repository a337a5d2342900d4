mod common;

use common::{closed_port, form_login_app, gauged_login_app, hardened_app, slow_login_app, spawn_app, vulnerable_app, Gauge};
use recon_probe_rs::classify::classify;
use recon_probe_rs::config::{ConfigError, ScanConfig};
use recon_probe_rs::engine::{probe_sqli, probe_xss};
use recon_probe_rs::payloads;
use recon_probe_rs::probe::{HttpProbe, Probe};
use recon_probe_rs::types::{
    BodyFormat, Endpoint, HttpCandidate, HttpMethod, Payload, PayloadKind, Rule, Verdict,
};
use std::time::Duration;

fn candidate(url: String, method: HttpMethod, field: &str, rule: Rule, timeout: Duration, payload: Payload) -> HttpCandidate {
    HttpCandidate {
        endpoint: Endpoint {
            url,
            method,
            field: field.to_string(),
            body: BodyFormat::Json,
            fixed_fields: vec![("password".to_string(), "test".to_string())],
            timeout_ms: timeout.as_millis() as u64,
            rule,
        },
        payload,
    }
}

#[tokio::test]
async fn boolean_sqli_against_permissive_login_is_vulnerable() {
    let base = spawn_app(vulnerable_app()).await;
    let probe = HttpProbe::new().unwrap();
    let c = candidate(
        format!("{base}/api/login"),
        HttpMethod::Post,
        "username",
        Rule::SuccessStatus,
        Duration::from_secs(5),
        Payload::new("' OR '1'='1", PayloadKind::Sqli),
    );
    let outcome = probe.execute(c).await;
    assert_eq!(outcome.status, Some(200));

    let finding = classify(&outcome);
    assert_eq!(finding.verdict, Verdict::Vulnerable);
    assert!(finding.evidence.contains("session-abc"), "{}", finding.evidence);
}

#[tokio::test]
async fn delayed_login_is_flagged_as_time_based_sqli() {
    let base = spawn_app(slow_login_app(Duration::from_secs(5))).await;
    let probe = HttpProbe::new().unwrap();
    let c = candidate(
        format!("{base}/api/login"),
        HttpMethod::Post,
        "username",
        Rule::blind_timing(Duration::from_secs(4)),
        Duration::from_secs(10),
        Payload::new("admin' AND (SELECT SLEEP(5))--", PayloadKind::SqliBlind),
    );
    let finding = classify(&probe.execute(c).await);
    assert_eq!(finding.verdict, Verdict::Vulnerable);
    assert!(finding.elapsed_ms >= 5_000);
}

#[tokio::test]
async fn escaped_search_output_is_clean() {
    let base = spawn_app(hardened_app()).await;
    let probe = HttpProbe::new().unwrap();
    let c = candidate(
        format!("{base}/"),
        HttpMethod::Get,
        "search",
        Rule::ReflectedContent,
        Duration::from_secs(5),
        Payload::new("<script>alert('XSS')</script>", PayloadKind::Xss),
    );
    let outcome = probe.execute(c).await;
    assert!(outcome.body.as_deref().unwrap().contains("&lt;script&gt;"));
    assert_eq!(classify(&outcome).verdict, Verdict::Clean);
}

#[tokio::test]
async fn raw_search_output_is_reflected() {
    let base = spawn_app(vulnerable_app()).await;
    let probe = HttpProbe::new().unwrap();
    let c = candidate(
        format!("{base}/"),
        HttpMethod::Get,
        "search",
        Rule::ReflectedContent,
        Duration::from_secs(5),
        Payload::new("<svg onload=alert('XSS')>", PayloadKind::Xss),
    );
    assert_eq!(classify(&probe.execute(c).await).verdict, Verdict::Vulnerable);
}

#[tokio::test]
async fn request_timeout_becomes_blocked_finding() {
    let base = spawn_app(slow_login_app(Duration::from_secs(2))).await;
    let probe = HttpProbe::new().unwrap();
    let c = candidate(
        format!("{base}/api/login"),
        HttpMethod::Post,
        "username",
        Rule::SuccessStatus,
        Duration::from_millis(200),
        Payload::new("admin'--", PayloadKind::Sqli),
    );
    let outcome = probe.execute(c).await;
    assert!(outcome.status.is_none() && outcome.body.is_none());
    let finding = classify(&outcome);
    assert_eq!(finding.verdict, Verdict::Blocked);
    assert!(finding.error.is_some());
}

#[tokio::test]
async fn sqli_run_yields_one_finding_per_payload() {
    let base = spawn_app(vulnerable_app()).await;
    let config = ScanConfig::default();
    let report = probe_sqli(&config, &base, None).await.unwrap();

    let boolean = payloads::builtin(PayloadKind::Sqli).len();
    let blind = payloads::builtin(PayloadKind::SqliBlind).len();
    assert_eq!(report.candidates_total as usize, boolean + blind);
    assert_eq!(report.findings.len(), boolean + blind);
    // Every boolean payload logs in; nothing sleeps.
    assert_eq!(report.count(Verdict::Vulnerable), boolean);
    assert_eq!(report.count(Verdict::Clean), blind);
    assert!(!report.is_operational_failure());
}

#[tokio::test]
async fn xss_run_against_hardened_app() {
    let base = spawn_app(hardened_app()).await;
    let config = ScanConfig::default();
    let report = probe_xss(&config, &base, None).await.unwrap();

    let n = payloads::builtin(PayloadKind::Xss).len();
    assert_eq!(report.findings.len(), 2 * n);
    assert_eq!(report.count(Verdict::Clean), n);
    assert_eq!(report.count(Verdict::Blocked), n);
    assert_eq!(report.count(Verdict::Vulnerable), 0);
}

#[tokio::test]
async fn unreachable_target_is_an_operational_failure() {
    let port = closed_port().await;
    let mut config = ScanConfig::default();
    config.http_timeout = Duration::from_millis(500);
    config.blind_timeout = Duration::from_millis(500);
    let report = probe_sqli(&config, &format!("http://127.0.0.1:{port}"), None)
        .await
        .unwrap();
    assert_eq!(report.findings.len(), 8);
    assert!(report.findings.iter().all(|f| f.verdict == Verdict::Blocked));
    assert!(report.is_operational_failure());
}

#[tokio::test]
async fn malformed_target_url_aborts_before_probing() {
    let config = ScanConfig::default();
    let err = probe_xss(&config, "localhost:8080", None).await.unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTargetUrl { .. }));
}

#[tokio::test]
async fn payload_probes_respect_worker_budget() {
    let gauge = Gauge::default();
    let base = spawn_app(gauged_login_app(gauge.clone())).await;
    let mut config = ScanConfig::default();
    config.workers = 2;
    config.payloads = (0..12)
        .map(|i| Payload::new(format!("' OR {i}={i}--"), PayloadKind::Sqli))
        .collect();
    let report = probe_sqli(&config, &base, None).await.unwrap();
    assert_eq!(report.findings.len(), 12);
    assert!(gauge.peak() <= 2, "peak {}", gauge.peak());
    assert_eq!(report.count(Verdict::Blocked), 12);
}

#[tokio::test]
async fn configured_form_encoding_reaches_form_only_login() {
    let base = spawn_app(form_login_app()).await;
    let boolean = payloads::builtin(PayloadKind::Sqli).len();

    let mut config = ScanConfig::default();
    let json = probe_sqli(&config, &base, None).await.unwrap();
    assert_eq!(json.count(Verdict::Vulnerable), 0);
    assert_eq!(json.count(Verdict::Blocked), boolean);

    config.body_format = BodyFormat::Form;
    let form = probe_sqli(&config, &base, None).await.unwrap();
    assert_eq!(form.count(Verdict::Vulnerable), boolean);
    assert_eq!(form.findings.len(), json.findings.len());
}
