use crate::classify::{is_critical, Severity};
use crate::collectors::CollectError;
use crate::providers::{DiskProvider, Partition, ProviderError};
use crate::snapshot::{round2, DiskEntry, DiskReport, DiskSummary};
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn collect_disks(provider: &dyn DiskProvider) -> Result<DiskReport, CollectError> {
    let mut entries = Vec::new();
    for part in provider.partitions()? {
        if !is_physical(&part) {
            debug!(mountpoint = %part.mountpoint, fstype = %part.fstype, "skipping partition");
            continue;
        }
        let usage = match provider.usage(&part.mountpoint) {
            Ok(usage) => usage,
            Err(err @ (ProviderError::NotFound(_) | ProviderError::PermissionDenied(_))) => {
                debug!(mountpoint = %part.mountpoint, error = %err, "partition usage unavailable");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        entries.push(DiskEntry {
            device: part.device,
            mountpoint: part.mountpoint,
            filesystem_type: part.fstype,
            opts: part.opts,
            total_bytes: usage.total,
            used_bytes: usage.used,
            free_bytes: usage.free,
            total_gb: to_gb(usage.total),
            used_gb: to_gb(usage.used),
            free_gb: to_gb(usage.free),
            usage_percent: usage.percent,
            is_critical: is_critical(usage.percent),
            severity: Severity::classify(usage.percent),
        });
    }

    let summary = summarize(&entries);
    Ok(DiskReport { entries, summary })
}

fn is_physical(part: &Partition) -> bool {
    !part.fstype.is_empty() && !part.opts.iter().any(|opt| opt.contains("cdrom"))
}

fn summarize(entries: &[DiskEntry]) -> DiskSummary {
    let mut summary = DiskSummary {
        total_disks: entries.len(),
        ..DiskSummary::default()
    };
    for entry in entries {
        match entry.severity {
            Severity::Critical => summary.critical_disks += 1,
            Severity::Warning => summary.warning_disks += 1,
            Severity::Normal | Severity::Caution => {}
        }
        summary.total_bytes += entry.total_bytes;
        summary.used_bytes += entry.used_bytes;
        summary.free_bytes += entry.free_bytes;
    }
    summary.total_storage_gb = to_gb(summary.total_bytes);
    summary.total_used_gb = to_gb(summary.used_bytes);
    summary.total_free_gb = to_gb(summary.free_bytes);
    summary
}

fn to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}
