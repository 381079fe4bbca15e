use crate::providers::{
    DiskProvider, DiskUsage, HostProvider, Partition, ProcessError, ProcessProvider,
    ProviderError, RawProcess, ResourceProvider, SessionProvider,
};
use crate::snapshot::{
    percent_of, HostInfo, MemoryInfo, MemoryStats, ProcessDetail, SessionEntry, SwapStats,
};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::process::Command;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use sysinfo::{
    CpuExt, DiskExt, Pid, PidExt, ProcessExt, ProcessStatus, System, SystemExt, UserExt,
};
use tracing::debug;

// Per-process CPU usage is a delta between two refreshes.
const PROCESS_CPU_WINDOW: Duration = Duration::from_millis(200);

pub struct SysinfoHost;

impl HostProvider for SysinfoHost {
    fn host_info(&self) -> Result<HostInfo, ProviderError> {
        let system = System::new();
        let node = system
            .host_name()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ProviderError::Other("unable to determine host name".to_string()))?;

        Ok(HostInfo {
            system: platform_system().to_string(),
            node,
            release: system.kernel_version().unwrap_or_default(),
            version: system
                .long_os_version()
                .or_else(|| system.os_version())
                .unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
        })
    }
}

fn platform_system() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        other => other,
    }
}

pub struct SysinfoDisks {
    system: Mutex<System>,
}

impl SysinfoDisks {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoDisks {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskProvider for SysinfoDisks {
    fn partitions(&self) -> Result<Vec<Partition>, ProviderError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| ProviderError::Other(format!("disk state lock poisoned: {e}")))?;
        system.refresh_disks_list();
        system.refresh_disks();

        let mount_opts = read_mount_options();
        Ok(system
            .disks()
            .iter()
            .map(|d| {
                let mountpoint = d.mount_point().to_string_lossy().to_string();
                Partition {
                    device: d.name().to_string_lossy().to_string(),
                    fstype: String::from_utf8_lossy(d.file_system()).to_string(),
                    opts: mount_opts.get(&mountpoint).cloned().unwrap_or_default(),
                    mountpoint,
                }
            })
            .collect())
    }

    fn usage(&self, mountpoint: &str) -> Result<DiskUsage, ProviderError> {
        // Surfaces vanished or unreadable mounts with their io error kind intact.
        std::fs::metadata(mountpoint).map_err(|err| ProviderError::from_io(mountpoint, err))?;

        let system = self
            .system
            .lock()
            .map_err(|e| ProviderError::Other(format!("disk state lock poisoned: {e}")))?;
        let disk = system
            .disks()
            .iter()
            .find(|d| d.mount_point().to_string_lossy() == mountpoint)
            .ok_or_else(|| ProviderError::NotFound(format!("{mountpoint}: not mounted")))?;

        let total = disk.total_space();
        // sysinfo exposes only available space, so root-reserved blocks count as used.
        let free = disk.available_space().min(total);
        let used = total - free;
        Ok(DiskUsage {
            total,
            used,
            free,
            percent: round1(percent_of(used, used + free)),
        })
    }
}

#[cfg(target_os = "linux")]
fn read_mount_options() -> HashMap<String, Vec<String>> {
    match fs::read_to_string("/proc/mounts") {
        Ok(text) => parse_proc_mounts(&text),
        Err(err) => {
            debug!(error = %err, "mount options unavailable");
            HashMap::new()
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn read_mount_options() -> HashMap<String, Vec<String>> {
    HashMap::new()
}

fn parse_proc_mounts(text: &str) -> HashMap<String, Vec<String>> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let _device = parts.next()?;
            let mountpoint = parts.next()?.replace("\\040", " ");
            let _fstype = parts.next()?;
            let opts = parts.next()?.split(',').map(str::to_string).collect();
            Some((mountpoint, opts))
        })
        .collect()
}

pub struct SysinfoProcesses {
    system: Mutex<System>,
}

impl SysinfoProcesses {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn lock(&self, pid: u32) -> Result<std::sync::MutexGuard<'_, System>, ProcessError> {
        self.system.lock().map_err(|e| ProcessError::Other {
            pid,
            message: format!("process state lock poisoned: {e}"),
        })
    }
}

impl Default for SysinfoProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProvider for SysinfoProcesses {
    fn processes(&self) -> Result<Vec<u32>, ProviderError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| ProviderError::Other(format!("process state lock poisoned: {e}")))?;
        system.refresh_memory();
        system.refresh_users_list();
        system.refresh_processes();
        thread::sleep(PROCESS_CPU_WINDOW);
        system.refresh_processes();

        let mut pids: Vec<u32> = system.processes().keys().map(|p| p.as_u32()).collect();
        pids.sort_unstable();
        debug!(count = pids.len(), "enumerated processes");
        Ok(pids)
    }

    fn base(&self, pid: u32) -> Result<RawProcess, ProcessError> {
        let system = self.lock(pid)?;
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(ProcessError::NoSuchProcess(pid))?;

        let username = process
            .user_id()
            .and_then(|uid| system.get_user_by_id(uid))
            .map(|user| user.name().to_string());
        let total_memory = system.total_memory();
        let memory_percent = (total_memory > 0).then(|| percent_of(process.memory(), total_memory));

        Ok(RawProcess {
            pid,
            name: process.name().to_string(),
            username,
            cpu_percent: Some(process.cpu_usage() as f64),
            memory_percent,
            status: process_status_name(process.status()).to_string(),
            start_time_unix: process.start_time(),
        })
    }

    fn extended(&self, pid: u32) -> Result<ProcessDetail, ProcessError> {
        let system = self.lock(pid)?;
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(ProcessError::NoSuchProcess(pid))?;
        if matches!(process.status(), ProcessStatus::Zombie) {
            return Err(ProcessError::Zombie(pid));
        }

        Ok(ProcessDetail {
            command_line: process.cmd().to_vec(),
            num_threads: thread_count(pid)?,
            memory_info: MemoryInfo {
                rss: process.memory(),
                vms: process.virtual_memory(),
            },
        })
    }
}

#[cfg(target_os = "linux")]
fn thread_count(pid: u32) -> Result<Option<u64>, ProcessError> {
    let entries =
        fs::read_dir(format!("/proc/{pid}/task")).map_err(|err| ProcessError::from_io(pid, err))?;
    Ok(Some(entries.filter_map(Result::ok).count() as u64))
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_pid: u32) -> Result<Option<u64>, ProcessError> {
    Ok(None)
}

fn process_status_name(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Run => "running",
        ProcessStatus::Sleep => "sleeping",
        ProcessStatus::Idle => "idle",
        ProcessStatus::Stop => "stopped",
        ProcessStatus::Zombie => "zombie",
        ProcessStatus::Tracing => "tracing-stop",
        ProcessStatus::Dead => "dead",
        ProcessStatus::Wakekill => "wake-kill",
        ProcessStatus::Waking => "waking",
        ProcessStatus::Parked => "parked",
        _ => "unknown",
    }
}

pub struct WhoSessions;

impl SessionProvider for WhoSessions {
    #[cfg(target_os = "linux")]
    fn sessions(&self) -> Result<Vec<SessionEntry>, ProviderError> {
        let output = Command::new("who")
            .output()
            .map_err(|err| ProviderError::from_io("who", err))?;
        if !output.status.success() {
            return Err(ProviderError::Other(format!(
                "who exited with {}",
                output.status
            )));
        }
        Ok(parse_who(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(not(target_os = "linux"))]
    fn sessions(&self) -> Result<Vec<SessionEntry>, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "session table is not read on {}",
            platform_system()
        )))
    }
}

fn parse_who(text: &str) -> Vec<SessionEntry> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let username = parts.first()?;
            let terminal = parts.get(1)?;
            let login_time = parts.get(2..4.min(parts.len())).unwrap_or_default().join(" ");
            let host = parts
                .get(4)
                .map(|h| h.trim_start_matches('(').trim_end_matches(')').to_string())
                .unwrap_or_else(|| "local".to_string());
            Some(SessionEntry {
                username: username.to_string(),
                terminal: terminal.to_string(),
                login_time,
                host,
            })
        })
        .collect()
}

pub struct SysinfoResources;

impl ResourceProvider for SysinfoResources {
    fn cpu_percent(&self, interval: Duration) -> Result<f64, ProviderError> {
        let mut system = System::new();
        system.refresh_cpu();
        thread::sleep(interval);
        system.refresh_cpu();
        if system.cpus().is_empty() {
            return Err(ProviderError::Other("no CPUs reported".to_string()));
        }
        Ok(round1(system.global_cpu_info().cpu_usage() as f64))
    }

    fn memory(&self) -> Result<MemoryStats, ProviderError> {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(ProviderError::Other(
                "virtual memory totals unavailable".to_string(),
            ));
        }
        let available = system.available_memory().min(total);
        Ok(MemoryStats {
            total,
            available,
            used: system.used_memory(),
            percent: round1(percent_of(total - available, total)),
        })
    }

    fn swap(&self) -> Result<SwapStats, ProviderError> {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_swap();
        let used = system.used_swap();
        Ok(SwapStats {
            total,
            used,
            percent: round1(percent_of(used, total)),
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
