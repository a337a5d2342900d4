//! Operator-facing rendering of findings. Nothing in the probing core depends on this module.
use crate::classify::{truncate, EVIDENCE_PAYLOAD_CHARS};
use crate::types::{Finding, Rule, ScanMode, ScanReport, Verdict};
use anyhow::Result;
use std::fs::File;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// One line for a finding, or `None` when it is not worth printing live.
///
/// Closed ports are silent (a discovery run produces thousands of them);
/// every payload probe is printed.
pub fn render_finding(f: &Finding) -> Option<String> {
    let payload = f
        .payload
        .as_ref()
        .map(|p| truncate(&p.value, EVIDENCE_PAYLOAD_CHARS))
        .unwrap_or_default();
    let line = match (f.rule, f.verdict) {
        (Rule::PortLiveness, Verdict::Open) => format!("[!] Open {}", f.subject),
        (Rule::PortLiveness, _) => return None,
        (Rule::ReflectedContent, Verdict::Vulnerable) => format!("[!] REFLECTED XSS: {payload}"),
        (Rule::BlindTiming { .. }, Verdict::Vulnerable) => {
            format!("[!] TIME-BASED SQLi FOUND: {payload} ({})", f.evidence)
        }
        (_, Verdict::Vulnerable) => {
            format!("[!] VULNERABLE: {payload}\n    Response: {}", f.evidence)
        }
        (_, Verdict::Blocked) if f.error.is_some() => {
            format!("[!] Error with {payload}: {}", f.evidence)
        }
        (_, Verdict::Blocked) => format!("[-] Blocked: {payload} ({})", f.evidence),
        (_, _) => format!("[-] {}: {payload} ({})", f.verdict, f.evidence),
    };
    Some(line)
}

/// Print findings as they arrive until the sender side is dropped.
pub fn spawn_printer(mut rx: mpsc::UnboundedReceiver<Finding>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(f) = rx.recv().await {
            if let Some(line) = render_finding(&f) {
                println!("{line}");
            }
        }
    })
}

/// Wait for the printer to drain its stream. A printer that panicked or was
/// cancelled is logged and reported as `false`.
pub async fn join_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Live reporter task failed: {}", e);
            false
        }
    }
}

/// Final summary block for a finished run.
pub fn render_summary(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{} run: {} candidates in {} ms\n",
        report.mode, report.candidates_total, report.elapsed_ms
    ));
    for branch in &report.skipped {
        out.push_str(&format!("  skipped: {branch}\n"));
    }

    if report.mode == ScanMode::Discover {
        let by_host = report.open_ports_by_host();
        if by_host.is_empty() {
            out.push_str("[-] No open ports found\n");
        }
        let host_w = by_host
            .keys()
            .map(|h| h.to_string().len())
            .max()
            .unwrap_or(0)
            .max("host".len());
        if !by_host.is_empty() {
            out.push_str(&format!("{:<host_w$}  open ports\n", "host"));
            out.push_str(&format!("{:-<host_w$}  {:-<10}\n", "", ""));
        }
        for (host, ports) in &by_host {
            out.push_str(&format!("{:<host_w$}  {:?}\n", host.to_string(), ports));
        }
    }

    for verdict in [Verdict::Open, Verdict::Vulnerable, Verdict::Blocked, Verdict::Clean] {
        let n = report.count(verdict);
        if n > 0 {
            out.push_str(&format!("  {:<10} {}\n", verdict.to_string(), n));
        }
    }
    out
}

pub fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
