use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use recon_probe_rs::config::{FileConfig, ScanConfig, DEFAULT_TARGET_URL};
use recon_probe_rs::netdetect::{self, HostRange};
use recon_probe_rs::types::{PayloadKind, ScanReport};
use recon_probe_rs::{engine, payloads, ports, report};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// recon-probe — host discovery and SQLi/XSS probing for segmented networks.
#[derive(Debug, Parser)]
#[command(name = "recon-probe", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// TOML config file. CLI flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Max concurrent probes.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// TCP connect timeout in milliseconds.
    #[arg(long = "timeout-ms", global = true)]
    timeout_ms: Option<u64>,

    /// HTTP status/reflection probe timeout in milliseconds.
    #[arg(long = "http-timeout-ms", global = true)]
    http_timeout_ms: Option<u64>,

    /// Write the findings as pretty JSON to this path.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect-scan the configured networks for open service ports.
    Discover(DiscoverOpts),
    /// Probe a login endpoint for boolean and time-based SQL injection.
    Sqli(SqliOpts),
    /// Probe search and comment endpoints for cross-site scripting.
    Xss(XssOpts),
}

#[derive(Debug, Args)]
struct DiscoverOpts {
    /// Network prefix (10.96.0, 10.96.0.0/24). Repeatable or comma separated.
    #[arg(long = "prefix", value_delimiter = ',')]
    prefixes: Vec<String>,

    /// Inclusive host index interval within each network, e.g. 1-254.
    #[arg(long)]
    hosts: Option<HostRange>,

    /// Ports and ranges, e.g. 22,80,8000-8010.
    #[arg(long, conflicts_with = "ports_file")]
    ports: Option<String>,

    /// File with one port or range per line.
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Scan the /24 of every local IPv4 interface instead of the configured prefixes.
    #[arg(long, conflicts_with = "prefixes")]
    local: bool,

    /// Only connect to hosts that have a PTR record.
    #[arg(long)]
    resolve: bool,
}

#[derive(Debug, Args)]
struct SqliOpts {
    #[arg(default_value = DEFAULT_TARGET_URL)]
    target_url: String,

    /// Boolean SQLi payloads, one per line.
    #[arg(long = "payloads-file")]
    payloads_file: Option<PathBuf>,

    /// Time-based SQLi payloads, one per line.
    #[arg(long = "blind-payloads-file")]
    blind_payloads_file: Option<PathBuf>,

    /// A response slower than this marks a time-based finding.
    #[arg(long = "threshold-ms")]
    threshold_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct XssOpts {
    #[arg(default_value = DEFAULT_TARGET_URL)]
    target_url: String,

    /// XSS payloads, one per line.
    #[arg(long = "payloads-file")]
    payloads_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose);

    let mut config = ScanConfig::default();
    if let Some(path) = cli.common.config.as_deref() {
        config.merge(&FileConfig::read(path)?);
    }
    apply_common(&mut config, &cli.common);

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = report::spawn_printer(rx);

    let result = match &cli.command {
        Command::Discover(opts) => {
            apply_discover(&mut config, opts)?;
            engine::discover(&config, Some(tx)).await
        }
        Command::Sqli(opts) => {
            apply_sqli(&mut config, opts)?;
            engine::probe_sqli(&config, &opts.target_url, Some(tx)).await
        }
        Command::Xss(opts) => {
            if let Some(path) = &opts.payloads_file {
                let loaded = payloads::load_payloads_from_path(path, PayloadKind::Xss)?;
                payloads::replace_kind(&mut config.payloads, PayloadKind::Xss, loaded);
            }
            engine::probe_xss(&config, &opts.target_url, Some(tx)).await
        }
    };
    // The sender is gone once the run returns, so the printer drains and exits.
    report::join_printer(printer).await;
    let scan = result?;

    print!("{}", report::render_summary(&scan));
    if let Some(path) = cli.common.output.as_deref() {
        if let Err(e) = report::write_report_json(path, &scan) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }

    Ok(exit_code(&scan))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_common(config: &mut ScanConfig, opts: &CommonOpts) {
    if let Some(w) = opts.workers {
        config.workers = w;
    }
    if let Some(ms) = opts.timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = opts.http_timeout_ms {
        config.http_timeout = Duration::from_millis(ms);
    }
}

fn apply_discover(config: &mut ScanConfig, opts: &DiscoverOpts) -> Result<()> {
    if opts.local {
        let cidrs = netdetect::detect_local_cidrs().context("failed to detect local networks")?;
        if cidrs.is_empty() {
            bail!("no non-loopback IPv4 interface found");
        }
        for cidr in &cidrs {
            info!("Detected local network {}", cidr);
        }
        config.prefixes = cidrs.iter().map(ToString::to_string).collect();
    } else if !opts.prefixes.is_empty() {
        config.prefixes = opts.prefixes.clone();
    }
    if let Some(hosts) = opts.hosts {
        config.host_range = hosts;
    }
    if let Some(list) = opts.ports.as_deref() {
        config.ports = ports::parse_ports_str(list)?;
    } else if let Some(path) = opts.ports_file.as_deref() {
        config.ports = ports::load_ports_from_path(path)?;
    }
    config.reverse_lookup |= opts.resolve;
    Ok(())
}

fn apply_sqli(config: &mut ScanConfig, opts: &SqliOpts) -> Result<()> {
    if let Some(path) = &opts.payloads_file {
        let loaded = payloads::load_payloads_from_path(path, PayloadKind::Sqli)?;
        payloads::replace_kind(&mut config.payloads, PayloadKind::Sqli, loaded);
    }
    if let Some(path) = &opts.blind_payloads_file {
        let loaded = payloads::load_payloads_from_path(path, PayloadKind::SqliBlind)?;
        payloads::replace_kind(&mut config.payloads, PayloadKind::SqliBlind, loaded);
    }
    if let Some(ms) = opts.threshold_ms {
        config.blind_threshold = Duration::from_millis(ms);
    }
    if config.blind_timeout <= config.blind_threshold {
        warn!(
            "blind timeout {:?} does not exceed threshold {:?}; delayed responses will time out",
            config.blind_timeout, config.blind_threshold
        );
    }
    Ok(())
}

/// Findings never affect the exit code; only a run that could not reach the network does.
fn exit_code(scan: &ScanReport) -> ExitCode {
    if scan.is_operational_failure() {
        eprintln!("No probe reached the network; check connectivity to the target.");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
