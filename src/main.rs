mod aggregate;
mod collectors;
mod config;
mod error;
mod models;
mod util;

use aggregate::run_cycle;
use anyhow::{Context, Result};
use clap::Parser;
use collectors::mon::CephCli;
use config::{Config, ResolvedCluster};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, Level};
use tracing_subscriber::FmtSubscriber;
use util::report::{self, ClusterOutcome};

#[derive(Parser, Debug)]
#[command(name = "cephcap", about = "Per-zone capacity report for Ceph clusters", version = "0.1")]
struct Cli {
    /// Config file (default: <config dir>/cephcap/cephcap.toml)
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Only poll this cluster; repeat for several
    #[arg(short = 'c', long = "cluster")]
    clusters: Vec<String>,

    /// Print a pretty JSON snapshot instead of the text report
    #[arg(long)]
    json: bool,

    /// Also list every pool with its rule and usage
    #[arg(long)]
    pools: bool,

    /// Repeat the poll cycle every N seconds until interrupted
    #[arg(short, long)]
    watch: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the resolved cluster list and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let path = match &cli.conf {
        Some(p) => p.clone(),
        None    => Config::config_path().context("no config dir")?,
    };
    let cfg = Config::load(&path)?;

    if cli.print_config {
        return run_print_config(&path, &cfg);
    }

    let clusters = cfg.resolve(&cli.clusters)?;
    match cli.watch {
        Some(secs) => run_watch(&clusters, secs, &cli),
        None       => run_once(&clusters, &cli),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run_print_config(path: &Path, cfg: &Config) -> Result<()> {
    println!("Config: {}", path.display());
    println!();
    println!("[default]");
    println!("  creds_path = {}", cfg.default.creds_path.display());
    println!("  ceph_bin   = {}", cfg.default.ceph_bin);
    println!();
    for (name, c) in &cfg.clusters {
        let r = c.resolve(name, &cfg.default);
        let kind = if c.kind.is_empty() { "-" } else { c.kind.as_str() };
        println!("[cluster.{}]  user={}  conf={}  type={}", name, r.user, r.conf_path.display(), kind);
    }
    Ok(())
}

fn run_once(clusters: &[ResolvedCluster], cli: &Cli) -> Result<()> {
    let outcomes = poll_all(clusters);
    print_outcomes(&outcomes, cli)?;
    if outcomes.iter().any(|o| o.error.is_some()) {
        std::process::exit(1);
    }
    Ok(())
}

fn run_watch(clusters: &[ResolvedCluster], secs: u64, cli: &Cli) -> Result<()> {
    let tick = std::time::Duration::from_secs(secs.max(1));
    info!(interval_secs = tick.as_secs(), clusters = clusters.len(), "watching");
    loop {
        let outcomes = poll_all(clusters);
        print_outcomes(&outcomes, cli)?;
        std::thread::sleep(tick);
    }
}

fn print_outcomes(outcomes: &[ClusterOutcome], cli: &Cli) -> Result<()> {
    if cli.json {
        println!("{}", report::snapshot(outcomes)?);
    } else {
        print!("{}", report::generate(outcomes, cli.pools));
    }
    Ok(())
}

/// One thread and one session per cluster; a failing cluster leaves the others alone.
fn poll_all(clusters: &[ResolvedCluster]) -> Vec<ClusterOutcome> {
    std::thread::scope(|s| {
        let handles: Vec<_> = clusters.iter()
            .map(|c| s.spawn(move || poll_cluster(c)))
            .collect();
        handles.into_iter()
            .zip(clusters)
            .map(|(h, c)| h.join().unwrap_or_else(|_| ClusterOutcome {
                name:   c.name.clone(),
                report: None,
                error:  Some("poll thread panicked".to_string()),
            }))
            .collect()
    })
}

fn poll_cluster(cluster: &ResolvedCluster) -> ClusterOutcome {
    let span = info_span!("cluster", name = %cluster.name);
    let _guard = span.enter();
    info!(conf = %cluster.conf_path.display(), "polling");

    let transport = CephCli::new(cluster.ceph_bin.clone(), cluster.conf_path.clone(), cluster.user.clone());
    match run_cycle(transport) {
        Ok(report) => {
            for z in &report.zones {
                debug!(zone = %z.public_name, rule = %z.rule_name,
                    total = %z.stat.total, provisioned = %z.stat.provisioned, free = %z.stat.free, "zone");
            }
            ClusterOutcome { name: cluster.name.clone(), report: Some(report), error: None }
        }
        Err(e) => {
            error!(error = %e, "cycle failed");
            ClusterOutcome { name: cluster.name.clone(), report: None, error: Some(e.to_string()) }
        }
    }
}
