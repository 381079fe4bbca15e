use crate::snapshot::{LinkStatus, Snapshot};
use prometheus::core::Collector;
use prometheus::{opts, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("failed to write metrics file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub hostsnap_section_errors_total: CounterVec,
    pub hostsnap_sections_collected: Gauge,
    pub hostsnap_snapshot_failed: Gauge,
    pub hostsnap_collection_duration_seconds: GaugeVec,
    pub hostsnap_last_collect_timestamp_seconds: Gauge,
    pub hostsnap_disk_usage_percent: GaugeVec,
    pub hostsnap_disk_used_bytes: GaugeVec,
    pub hostsnap_disk_total_bytes: GaugeVec,
    pub hostsnap_disk_critical_count: Gauge,
    pub hostsnap_ping_success: GaugeVec,
    pub hostsnap_interface_up: GaugeVec,
    pub hostsnap_process_count: Gauge,
    pub hostsnap_cpu_usage_percent: Gauge,
    pub hostsnap_memory_usage_percent: Gauge,
    pub hostsnap_swap_usage_percent: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let hostsnap_section_errors_total = CounterVec::new(
            opts!(
                "hostsnap_section_errors_total",
                "Snapshot sections that resolved to an error marker"
            ),
            &["section"],
        )?;
        let hostsnap_sections_collected = Gauge::with_opts(opts!(
            "hostsnap_sections_collected",
            "Sections present in the last snapshot, failed or not"
        ))?;
        let hostsnap_snapshot_failed = Gauge::with_opts(opts!(
            "hostsnap_snapshot_failed",
            "1 when the last snapshot could not determine host identity"
        ))?;
        let hostsnap_collection_duration_seconds = GaugeVec::new(
            opts!(
                "hostsnap_collection_duration_seconds",
                "Wall time of the last collection pass by snapshot kind"
            ),
            &["kind"],
        )?;
        let hostsnap_last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "hostsnap_last_collect_timestamp_seconds",
            "Unix time of the last collection pass"
        ))?;
        let hostsnap_disk_usage_percent = GaugeVec::new(
            opts!("hostsnap_disk_usage_percent", "Disk usage in percent by mount"),
            &["mount", "severity"],
        )?;
        let hostsnap_disk_used_bytes = GaugeVec::new(
            opts!("hostsnap_disk_used_bytes", "Disk used bytes by mount"),
            &["mount"],
        )?;
        let hostsnap_disk_total_bytes = GaugeVec::new(
            opts!("hostsnap_disk_total_bytes", "Disk total bytes by mount"),
            &["mount"],
        )?;
        let hostsnap_disk_critical_count = Gauge::with_opts(opts!(
            "hostsnap_disk_critical_count",
            "Number of disks at or above the critical threshold"
        ))?;
        let hostsnap_ping_success = GaugeVec::new(
            opts!(
                "hostsnap_ping_success",
                "1 if the last echo to the target succeeded, else 0"
            ),
            &["target"],
        )?;
        let hostsnap_interface_up = GaugeVec::new(
            opts!(
                "hostsnap_interface_up",
                "1 if the interface holds an IPv4 address, else 0"
            ),
            &["iface"],
        )?;
        let hostsnap_process_count =
            Gauge::with_opts(opts!("hostsnap_process_count", "Number of processes"))?;
        let hostsnap_cpu_usage_percent = Gauge::with_opts(opts!(
            "hostsnap_cpu_usage_percent",
            "CPU usage over a one second sample (0..100)"
        ))?;
        let hostsnap_memory_usage_percent = Gauge::with_opts(opts!(
            "hostsnap_memory_usage_percent",
            "Memory usage in percent"
        ))?;
        let hostsnap_swap_usage_percent =
            Gauge::with_opts(opts!("hostsnap_swap_usage_percent", "Swap usage in percent"))?;

        register(&registry, &hostsnap_section_errors_total)?;
        register(&registry, &hostsnap_sections_collected)?;
        register(&registry, &hostsnap_snapshot_failed)?;
        register(&registry, &hostsnap_collection_duration_seconds)?;
        register(&registry, &hostsnap_last_collect_timestamp_seconds)?;
        register(&registry, &hostsnap_disk_usage_percent)?;
        register(&registry, &hostsnap_disk_used_bytes)?;
        register(&registry, &hostsnap_disk_total_bytes)?;
        register(&registry, &hostsnap_disk_critical_count)?;
        register(&registry, &hostsnap_ping_success)?;
        register(&registry, &hostsnap_interface_up)?;
        register(&registry, &hostsnap_process_count)?;
        register(&registry, &hostsnap_cpu_usage_percent)?;
        register(&registry, &hostsnap_memory_usage_percent)?;
        register(&registry, &hostsnap_swap_usage_percent)?;

        Ok(Arc::new(Self {
            registry,
            hostsnap_section_errors_total,
            hostsnap_sections_collected,
            hostsnap_snapshot_failed,
            hostsnap_collection_duration_seconds,
            hostsnap_last_collect_timestamp_seconds,
            hostsnap_disk_usage_percent,
            hostsnap_disk_used_bytes,
            hostsnap_disk_total_bytes,
            hostsnap_disk_critical_count,
            hostsnap_ping_success,
            hostsnap_interface_up,
            hostsnap_process_count,
            hostsnap_cpu_usage_percent,
            hostsnap_memory_usage_percent,
            hostsnap_swap_usage_percent,
        }))
    }

    pub fn update_from_snapshot(&self, snapshot: &Snapshot) {
        self.hostsnap_last_collect_timestamp_seconds
            .set(now_unix() as f64);
        self.hostsnap_snapshot_failed
            .set(if snapshot.error.is_some() { 1.0 } else { 0.0 });

        self.hostsnap_disk_usage_percent.reset();
        self.hostsnap_disk_used_bytes.reset();
        self.hostsnap_disk_total_bytes.reset();
        self.hostsnap_ping_success.reset();
        self.hostsnap_interface_up.reset();

        let present = [
            snapshot.disks.is_some(),
            snapshot.network.is_some(),
            snapshot.processes.is_some(),
            snapshot.system_resources.is_some(),
        ];
        self.hostsnap_sections_collected
            .set(present.iter().filter(|p| **p).count() as f64);
        for section in snapshot.failed_sections() {
            self.hostsnap_section_errors_total
                .with_label_values(&[section])
                .inc();
        }

        if let Some(disks) = snapshot.disks.as_ref().and_then(|s| s.ok()) {
            for d in &disks.entries {
                self.hostsnap_disk_usage_percent
                    .with_label_values(&[d.mountpoint.as_str(), d.severity.as_str()])
                    .set(d.usage_percent);
                self.hostsnap_disk_used_bytes
                    .with_label_values(&[d.mountpoint.as_str()])
                    .set(d.used_bytes as f64);
                self.hostsnap_disk_total_bytes
                    .with_label_values(&[d.mountpoint.as_str()])
                    .set(d.total_bytes as f64);
            }
            self.hostsnap_disk_critical_count
                .set(disks.summary.critical_disks as f64);
        }

        if let Some(network) = snapshot.network.as_ref().and_then(|s| s.ok()) {
            for (target, result) in &network.ping_stats {
                self.hostsnap_ping_success
                    .with_label_values(&[target.as_str()])
                    .set(if result.success { 1.0 } else { 0.0 });
            }
            for iface in network.interfaces.ok().into_iter().flatten() {
                let up = match iface.status() {
                    Some(LinkStatus::Up) => 1.0,
                    Some(LinkStatus::Down) => 0.0,
                    None => continue,
                };
                self.hostsnap_interface_up
                    .with_label_values(&[iface.name.as_str()])
                    .set(up);
            }
        }

        if let Some(procs) = snapshot.processes.as_ref().and_then(|s| s.ok()) {
            self.hostsnap_process_count.set(procs.total_count as f64);
        }

        if let Some(res) = snapshot.system_resources.as_ref().and_then(|s| s.ok()) {
            self.hostsnap_cpu_usage_percent.set(res.cpu_percent);
            self.hostsnap_memory_usage_percent.set(res.memory.percent);
            self.hostsnap_swap_usage_percent.set(res.swap.percent);
        }
    }

    pub fn observe_duration(&self, kind: &str, seconds: f64) {
        self.hostsnap_collection_duration_seconds
            .with_label_values(&[kind])
            .set(seconds);
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }

    // Rename over the target so a textfile collector never sees a partial file.
    pub fn write_textfile(&self, path: &Path) -> Result<(), MetricsError> {
        let body = self.encode_metrics()?;
        let tmp = path.with_extension("prom.tmp");
        let write_err = |source| MetricsError::Write {
            path: path.display().to_string(),
            source,
        };
        fs::write(&tmp, body).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
