use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Ports probed by `discover` when none are configured.
pub const DEFAULT_PORTS: &[u16] = &[22, 80, 443, 3000, 5432, 6379, 8080, 9000];

/// Parse a port list into a deduplicated list of TCP ports (1..=65535).
///
/// Entries are separated by commas or newlines and may be:
/// - a single port number: `80`
/// - an inclusive range: `8000-8010`
///
/// Everything after `#` on a line is ignored. First-seen order is kept.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (start, end) = match token.split_once('-') {
                Some((a, b)) => {
                    let start = parse_port_str(a.trim())
                        .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                    let end = parse_port_str(b.trim())
                        .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                    if start > end {
                        bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                    }
                    (start, end)
                }
                None => {
                    let p = parse_port_str(token)
                        .with_context(|| format!("line {line_no}: invalid port value: {token}"))?;
                    (p, p)
                }
            };
            out.extend((start..=end).filter(|p| seen.insert(*p)));
        }
    }

    Ok(out)
}

/// Load a port list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
