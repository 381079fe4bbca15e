use crate::collectors::CollectError;
use crate::providers::{NetworkProvider, ProbeExecutor, RawConnection};
use crate::snapshot::{
    ConnectionEntry, ConnectionRecord, GatewayInfo, InterfaceInfo, NetworkReport, PingResult,
    Section,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, warn};

const ESTABLISHED: &str = "ESTABLISHED";

pub async fn collect_network(
    network: Arc<dyn NetworkProvider>,
    probes: Arc<dyn ProbeExecutor>,
    targets: Vec<String>,
    probe_timeout: Duration,
) -> Result<NetworkReport, CollectError> {
    let local = tokio::task::spawn_blocking(move || collect_local(network.as_ref()));
    let (local, ping_stats) = tokio::join!(local, ping_targets(probes, targets, probe_timeout));

    let mut report = local?;
    report.ping_stats = ping_stats;
    Ok(report)
}

fn collect_local(provider: &dyn NetworkProvider) -> NetworkReport {
    let interfaces = match provider.interfaces() {
        Ok(raw) => Section::Ok(
            raw.into_iter()
                .map(|raw| match raw.bindings {
                    Ok(bindings) => InterfaceInfo::resolved(raw.name, bindings),
                    Err(err) => {
                        debug!(interface = %raw.name, error = %err, "interface lookup failed");
                        InterfaceInfo::failed(raw.name, err.to_string())
                    }
                })
                .collect(),
        ),
        Err(err) => {
            warn!(error = %err, "interface list unavailable");
            Section::failed(err.to_string())
        }
    };

    let default_gateway = match provider.gateways() {
        Ok(gw) => GatewayInfo {
            ipv4: gw.ipv4,
            ipv6: gw.ipv6,
            error: None,
        },
        Err(err) => GatewayInfo {
            error: Some(err.to_string()),
            ..GatewayInfo::default()
        },
    };

    let dns_servers = provider.dns_servers().unwrap_or_else(|err| {
        warn!(error = %err, "dns servers unavailable");
        vec![format!("Error reading DNS servers: {err}")]
    });

    let connections = match provider.connections() {
        Ok(sockets) => sockets
            .into_iter()
            .filter(|sock| sock.state == ESTABLISHED)
            .map(|sock| ConnectionRecord::Established(connection_entry(sock)))
            .collect(),
        Err(err) => {
            warn!(error = %err, "connection table unavailable");
            vec![ConnectionRecord::Error(format!(
                "Error getting connections: {err}"
            ))]
        }
    };

    NetworkReport {
        interfaces,
        default_gateway,
        dns_servers,
        connections,
        ping_stats: BTreeMap::new(),
    }
}

fn connection_entry(sock: RawConnection) -> ConnectionEntry {
    ConnectionEntry {
        local_address: format!("{}:{}", sock.local_ip, sock.local_port),
        remote_address: format!("{}:{}", sock.remote_ip, sock.remote_port),
        status: sock.state,
        pid: sock.pid,
    }
}

// Every target ends up in the map exactly once.
pub async fn ping_targets(
    probes: Arc<dyn ProbeExecutor>,
    targets: Vec<String>,
    probe_timeout: Duration,
) -> BTreeMap<String, PingResult> {
    let mut set = JoinSet::new();
    for target in &targets {
        let probe = probes.probe(target.clone());
        let target = target.clone();
        set.spawn(async move {
            // Inner task so a panicking probe surfaces as a JoinError we can attribute.
            let result = match tokio::spawn(time::timeout(probe_timeout, probe)).await {
                Ok(Ok(Ok(out))) => PingResult::completed(out.success, &out.stdout),
                Ok(Ok(Err(err))) => {
                    warn!(target = %target, error = %err, "ping failed");
                    PingResult::errored(err.to_string())
                }
                Ok(Err(_elapsed)) => {
                    warn!(target = %target, "ping timeout");
                    PingResult::errored(format!(
                        "timed out after {}s",
                        probe_timeout.as_secs_f64()
                    ))
                }
                Err(err) => {
                    warn!(target = %target, error = %err, "ping task failed");
                    PingResult::errored(format!("probe task failed: {err}"))
                }
            };
            (target, result)
        });
    }

    let mut stats = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((target, result)) => {
                stats.insert(target, result);
            }
            Err(err) => warn!(error = %err, "ping task aborted"),
        }
    }
    for target in targets {
        stats
            .entry(target)
            .or_insert_with(|| PingResult::errored("probe task aborted"));
    }
    stats
}
