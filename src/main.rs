mod aggregator;
mod classify;
mod collectors;
mod config;
mod metrics;
mod providers;
mod snapshot;

use aggregator::SnapshotAggregator;
use clap::Parser;
use config::Config;
use metrics::Metrics;
use providers::Providers;
use snapshot::{Snapshot, SnapshotKind};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostsnap")]
#[command(version, about = "Point-in-time JSON snapshot of host health")]
struct Cli {
    #[arg(value_enum, default_value_t = SnapshotKind::All, help = "Sections to collect")]
    kind: SnapshotKind,
    #[arg(long, help = "YAML config, built-in defaults apply when omitted")]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    pretty: bool,
    #[arg(long, help = "Also write Prometheus text exposition here")]
    metrics_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    info!(
        kind = cli.kind.as_str(),
        ping_targets = cfg.ping_targets.len(),
        "collecting snapshot"
    );

    let aggregator = SnapshotAggregator::new(Providers::platform(&cfg), &cfg);
    let started = Instant::now();
    let snapshot = match cli.kind {
        SnapshotKind::Disk => aggregator.collect_disk_snapshot().await,
        SnapshotKind::Network => aggregator.collect_network_snapshot().await,
        SnapshotKind::Process => aggregator.collect_process_snapshot().await,
        SnapshotKind::System => aggregator.collect_system_snapshot().await,
        SnapshotKind::All => aggregator.collect_full_snapshot().await,
    };
    let elapsed = started.elapsed();

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&snapshot)
    } else {
        serde_json::to_string(&snapshot)
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(err) => {
            error!(error = %err, "failed to serialize snapshot");
            std::process::exit(1);
        }
    }

    if let Some(path) = &cli.metrics_file {
        export_metrics(path, &snapshot, cli.kind, elapsed.as_secs_f64());
    }
}

// Metrics are a side channel: failures are logged and never change the exit code.
fn export_metrics(path: &Path, snapshot: &Snapshot, kind: SnapshotKind, secs: f64) {
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            return;
        }
    };
    metrics.update_from_snapshot(snapshot);
    metrics.observe_duration(kind.as_str(), secs);
    if let Err(err) = metrics.write_textfile(path) {
        error!(error = %err, "failed to export metrics");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_to_all() {
        let cli = Cli::try_parse_from(["hostsnap"]).unwrap();
        assert_eq!(cli.kind, SnapshotKind::All);
        assert!(cli.config.is_none());
        assert!(!cli.pretty);
    }

    #[test]
    fn kind_and_flags_parse() {
        let cli = Cli::try_parse_from([
            "hostsnap",
            "--config",
            "/etc/hostsnap.yaml",
            "--pretty",
            "--metrics-file",
            "/var/lib/node_exporter/hostsnap.prom",
            "disk",
        ])
        .unwrap();
        assert_eq!(cli.kind, SnapshotKind::Disk);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/hostsnap.yaml")));
        assert!(cli.pretty);
        assert!(cli.metrics_file.is_some());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["hostsnap", "gpu"]).is_err());
    }
}
