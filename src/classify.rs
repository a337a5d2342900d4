//! Verdicts from outcomes. Every function here is pure and total over the
//! outcomes a probe can produce.
use crate::types::{Finding, ProbeOutcome, Rule, Verdict};
use std::time::Duration;

/// Longest response body excerpt kept as evidence.
pub const EVIDENCE_BODY_CHARS: usize = 100;
/// Longest payload excerpt kept as evidence.
pub const EVIDENCE_PAYLOAD_CHARS: usize = 30;

/// Classify one outcome under the rule implied by its candidate.
///
/// # Panics
///
/// If an HTTP outcome has neither a transport error nor a status code. The
/// probe executors never build such an outcome.
pub fn classify(outcome: &ProbeOutcome) -> Finding {
    let rule = outcome.candidate.rule();
    let (verdict, evidence) = match &outcome.error {
        Some(err) => (Verdict::Blocked, err.to_string()),
        None => judge(rule, outcome),
    };
    Finding {
        subject: outcome.candidate.subject(),
        verdict,
        evidence,
        rule,
        target: outcome.candidate.target(),
        payload: outcome.candidate.payload().cloned(),
        error: outcome.error.as_ref().map(|e| e.kind),
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        timestamp: outcome.timestamp.clone(),
    }
}

fn judge(rule: Rule, outcome: &ProbeOutcome) -> (Verdict, String) {
    match rule {
        Rule::PortLiveness => (
            Verdict::Open,
            format!("connected in {} ms", outcome.elapsed.as_millis()),
        ),
        Rule::ReflectedContent => {
            expect_status(outcome);
            let payload = outcome
                .candidate
                .payload()
                .expect("reflection rule applies to payload candidates only");
            let body = outcome.body.as_deref().unwrap_or_default();
            if body.contains(payload.value.as_str()) {
                (
                    Verdict::Vulnerable,
                    format!(
                        "payload reflected: {}",
                        truncate(&payload.value, EVIDENCE_PAYLOAD_CHARS)
                    ),
                )
            } else {
                (Verdict::Clean, "payload not reflected".to_string())
            }
        }
        Rule::SuccessStatus => {
            let status = expect_status(outcome);
            if status == 200 {
                let body = outcome.body.as_deref().unwrap_or_default();
                (
                    Verdict::Vulnerable,
                    format!("status 200: {}", truncate(body, EVIDENCE_BODY_CHARS)),
                )
            } else {
                (Verdict::Blocked, format!("status {status}"))
            }
        }
        Rule::BlindTiming { threshold_ms } => {
            expect_status(outcome);
            let threshold = Duration::from_millis(threshold_ms);
            let took = outcome.elapsed.as_millis();
            if outcome.elapsed > threshold {
                (
                    Verdict::Vulnerable,
                    format!("response delayed {took} ms (threshold {threshold_ms} ms)"),
                )
            } else {
                (
                    Verdict::Clean,
                    format!("no delay: {took} ms (threshold {threshold_ms} ms)"),
                )
            }
        }
    }
}

fn expect_status(outcome: &ProbeOutcome) -> u16 {
    outcome.status.unwrap_or_else(|| {
        panic!(
            "HTTP outcome for {} has neither a status nor a transport error",
            outcome.candidate.subject()
        )
    })
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
