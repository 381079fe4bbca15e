use crate::collectors::CollectError;
use crate::providers::{ProcessError, ProcessProvider, SessionProvider};
use crate::snapshot::{unix_to_rfc3339, ProcessEntry, ProcessReport, SessionRecord};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const TOP_N: usize = 10;
pub const UNKNOWN_USER: &str = "unknown";

pub fn collect_processes(provider: &dyn ProcessProvider) -> Result<ProcessReport, CollectError> {
    let mut process_list = Vec::new();
    for pid in provider.processes()? {
        let raw = match provider.base(pid) {
            Ok(raw) => raw,
            Err(err) if is_transient(&err) => {
                debug!(pid, error = %err, "dropping process");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let detail = match provider.extended(pid) {
            Ok(detail) => Some(detail),
            Err(err) if is_transient(&err) => {
                debug!(pid, error = %err, "extended process info unavailable");
                None
            }
            Err(err) => return Err(err.into()),
        };

        process_list.push(ProcessEntry {
            pid: raw.pid,
            name: raw.name,
            username: raw.username,
            cpu_percent: raw.cpu_percent,
            memory_percent: raw.memory_percent,
            status: raw.status,
            create_time: unix_to_rfc3339(raw.start_time_unix),
            detail,
        });
    }

    let mut by_user: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &process_list {
        let user = entry.username.as_deref().unwrap_or(UNKNOWN_USER);
        *by_user.entry(user.to_string()).or_default() += 1;
    }

    Ok(ProcessReport {
        total_count: process_list.len(),
        by_user,
        top_cpu: top_by(&process_list, |p| p.cpu_percent),
        top_memory: top_by(&process_list, |p| p.memory_percent),
        process_list,
    })
}

fn is_transient(err: &ProcessError) -> bool {
    matches!(
        err,
        ProcessError::NoSuchProcess(_) | ProcessError::AccessDenied(_) | ProcessError::Zombie(_)
    )
}

// Missing values rank as zero; ties keep enumeration order.
pub fn top_by(list: &[ProcessEntry], key: impl Fn(&ProcessEntry) -> Option<f64>) -> Vec<ProcessEntry> {
    let mut ranked: Vec<&ProcessEntry> = list.iter().collect();
    ranked.sort_by(|a, b| {
        let (a, b) = (key(a).unwrap_or(0.0), key(b).unwrap_or(0.0));
        b.total_cmp(&a)
    });
    ranked.into_iter().take(TOP_N).cloned().collect()
}

pub fn collect_sessions(provider: &dyn SessionProvider) -> Vec<SessionRecord> {
    match provider.sessions() {
        Ok(sessions) => sessions.into_iter().map(SessionRecord::Session).collect(),
        Err(err) => {
            warn!(error = %err, "session table unavailable");
            vec![SessionRecord::Error {
                error: format!("Failed to get logged-in users: {err}"),
            }]
        }
    }
}
