use crate::collectors::disk::collect_disks;
use crate::collectors::network::collect_network;
use crate::collectors::process::{collect_processes, collect_sessions};
use crate::collectors::resources::collect_resources;
use crate::collectors::CollectError;
use crate::config::Config;
use crate::providers::Providers;
use crate::snapshot::{now_rfc3339, Section, SessionRecord, Snapshot, SnapshotKind};
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, error, warn};

const PROCESSES_ERROR: &str = "Failed to get process information";
const RESOURCES_ERROR: &str = "Failed to get system resources";

pub struct SnapshotAggregator {
    providers: Providers,
    ping_targets: Vec<String>,
    ping_timeout: Duration,
}

impl SnapshotAggregator {
    pub fn new(providers: Providers, cfg: &Config) -> Self {
        Self {
            providers,
            ping_targets: cfg.ping_targets.clone(),
            ping_timeout: cfg.ping_timeout(),
        }
    }

    pub async fn collect_disk_snapshot(&self) -> Snapshot {
        self.collect(SnapshotKind::Disk).await
    }

    pub async fn collect_network_snapshot(&self) -> Snapshot {
        self.collect(SnapshotKind::Network).await
    }

    pub async fn collect_process_snapshot(&self) -> Snapshot {
        self.collect(SnapshotKind::Process).await
    }

    pub async fn collect_system_snapshot(&self) -> Snapshot {
        self.collect(SnapshotKind::System).await
    }

    pub async fn collect_full_snapshot(&self) -> Snapshot {
        self.collect(SnapshotKind::All).await
    }

    pub async fn collect(&self, kind: SnapshotKind) -> Snapshot {
        let started = Instant::now();
        let timestamp = now_rfc3339();

        let host = self.providers.host.clone();
        let host_info = match task::spawn_blocking(move || host.host_info()).await {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                error!(kind = kind.as_str(), error = %err, "host identity unavailable");
                return Snapshot::failed(timestamp, err.to_string());
            }
            Err(err) => {
                error!(kind = kind.as_str(), error = %err, "host identity task failed");
                return Snapshot::failed(timestamp, CollectError::from(err).to_string());
            }
        };

        let disks = async {
            if !kind.wants_disks() {
                return None;
            }
            let provider = self.providers.disks.clone();
            Some(blocking_section("disks", None, move || collect_disks(provider.as_ref())).await)
        };

        let network = async {
            if !kind.wants_network() {
                return None;
            }
            let handle = tokio::spawn(collect_network(
                self.providers.network.clone(),
                self.providers.probes.clone(),
                self.ping_targets.clone(),
                self.ping_timeout,
            ));
            let result = handle.await.map_err(CollectError::from).and_then(|r| r);
            Some(into_section("network", None, result))
        };

        let processes = async {
            if !kind.wants_processes() {
                return None;
            }
            let provider = self.providers.processes.clone();
            Some(
                blocking_section("processes", Some(PROCESSES_ERROR), move || {
                    collect_processes(provider.as_ref())
                })
                .await,
            )
        };

        let resources = async {
            if !kind.wants_system_resources() {
                return None;
            }
            let provider = self.providers.resources.clone();
            Some(
                blocking_section("system_resources", Some(RESOURCES_ERROR), move || {
                    collect_resources(provider.as_ref())
                })
                .await,
            )
        };

        let sessions = async {
            if !kind.wants_processes() {
                return None;
            }
            let provider = self.providers.sessions.clone();
            let records = task::spawn_blocking(move || collect_sessions(provider.as_ref()))
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "session task failed");
                    vec![SessionRecord::Error {
                        error: format!("Failed to get logged-in users: {err}"),
                    }]
                });
            Some(records)
        };

        let (disks, network, processes, system_resources, logged_in_users) =
            tokio::join!(disks, network, processes, resources, sessions);

        let mut snapshot = Snapshot::new(timestamp, host_info);
        snapshot.disks = disks;
        snapshot.network = network;
        snapshot.processes = processes;
        snapshot.system_resources = system_resources;
        snapshot.logged_in_users = logged_in_users;

        debug!(
            kind = kind.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = ?snapshot.failed_sections(),
            "snapshot collected"
        );
        snapshot
    }
}

async fn blocking_section<T, F>(
    name: &'static str,
    prefix: Option<&'static str>,
    collect: F,
) -> Section<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CollectError> + Send + 'static,
{
    let result = task::spawn_blocking(collect)
        .await
        .map_err(CollectError::from)
        .and_then(|r| r);
    into_section(name, prefix, result)
}

fn into_section<T>(
    name: &'static str,
    prefix: Option<&'static str>,
    result: Result<T, CollectError>,
) -> Section<T> {
    match result {
        Ok(value) => Section::Ok(value),
        Err(err) => {
            warn!(section = name, error = %err, "collector failed");
            match prefix {
                Some(prefix) => Section::failed(format!("{prefix}: {err}")),
                None => Section::failed(err.to_string()),
            }
        }
    }
}
