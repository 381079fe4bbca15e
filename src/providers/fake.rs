use crate::providers::{
    DiskProvider, DiskUsage, Gateways, HostProvider, NetworkProvider, Partition, ProbeExecutor,
    ProbeFuture, ProbeOutput, ProcessError, ProcessProvider, ProviderError, Providers,
    RawConnection, RawInterface, RawProcess, ResourceProvider, SessionProvider,
};
use crate::snapshot::{
    HostInfo, InterfaceBindings, Ipv4Binding, MemoryInfo, MemoryStats, ProcessDetail,
    SessionEntry, SwapStats,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

pub fn host_info() -> HostInfo {
    HostInfo {
        system: "Linux".to_string(),
        node: "test-node".to_string(),
        release: "6.8.0".to_string(),
        version: "Ubuntu 24.04".to_string(),
        machine: "x86_64".to_string(),
    }
}

pub struct FakeHost(pub Result<HostInfo, ProviderError>);

impl HostProvider for FakeHost {
    fn host_info(&self) -> Result<HostInfo, ProviderError> {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct FakeDisks {
    pub partitions: Vec<Partition>,
    pub usage: HashMap<String, Result<DiskUsage, ProviderError>>,
    pub enumeration_error: Option<ProviderError>,
}

impl FakeDisks {
    pub fn with_partition(mut self, mountpoint: &str, fstype: &str, total: u64, used: u64) -> Self {
        self.partitions.push(partition(mountpoint, fstype, &["rw"]));
        self.usage
            .insert(mountpoint.to_string(), Ok(usage(total, used)));
        self
    }
}

pub fn partition(mountpoint: &str, fstype: &str, opts: &[&str]) -> Partition {
    Partition {
        device: format!("/dev/fake{}", mountpoint.replace('/', "_")),
        mountpoint: mountpoint.to_string(),
        fstype: fstype.to_string(),
        opts: opts.iter().map(|o| o.to_string()).collect(),
    }
}

pub fn usage(total: u64, used: u64) -> DiskUsage {
    DiskUsage {
        total,
        used,
        free: total - used,
        percent: (used as f64 / total as f64 * 1000.0).round() / 10.0,
    }
}

impl DiskProvider for FakeDisks {
    fn partitions(&self) -> Result<Vec<Partition>, ProviderError> {
        match &self.enumeration_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.partitions.clone()),
        }
    }

    fn usage(&self, mountpoint: &str) -> Result<DiskUsage, ProviderError> {
        self.usage
            .get(mountpoint)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::NotFound(mountpoint.to_string())))
    }
}

pub struct PanickingDisks;

impl DiskProvider for PanickingDisks {
    fn partitions(&self) -> Result<Vec<Partition>, ProviderError> {
        panic!("partition table corrupted");
    }

    fn usage(&self, _mountpoint: &str) -> Result<DiskUsage, ProviderError> {
        unreachable!()
    }
}

pub struct FakeNetwork {
    pub interfaces: Result<Vec<RawInterface>, ProviderError>,
    pub gateways: Result<Gateways, ProviderError>,
    pub dns: Result<Vec<String>, ProviderError>,
    pub connections: Result<Vec<RawConnection>, ProviderError>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self {
            interfaces: Ok(vec![
                RawInterface {
                    name: "lo".to_string(),
                    bindings: Ok(bindings_v4("127.0.0.1")),
                },
                RawInterface {
                    name: "eth0".to_string(),
                    bindings: Ok(bindings_v4("10.0.0.2")),
                },
            ]),
            gateways: Ok(Gateways::default()),
            dns: Ok(vec!["10.0.0.1".to_string()]),
            connections: Ok(vec![
                connection(443, "ESTABLISHED", Some(100)),
                connection(22, "LISTEN", Some(1)),
                connection(8080, "TIME_WAIT", None),
            ]),
        }
    }
}

pub fn bindings_v4(address: &str) -> InterfaceBindings {
    InterfaceBindings {
        mac_address: "02:00:00:00:00:01".to_string(),
        ipv4: vec![Ipv4Binding {
            address: address.to_string(),
            netmask: "255.255.255.0".to_string(),
            broadcast: String::new(),
        }],
        ipv6: vec![],
    }
}

pub fn connection(remote_port: u16, state: &str, pid: Option<u32>) -> RawConnection {
    RawConnection {
        local_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        local_port: 51000,
        remote_ip: IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
        remote_port,
        state: state.to_string(),
        pid,
    }
}

impl NetworkProvider for FakeNetwork {
    fn interfaces(&self) -> Result<Vec<RawInterface>, ProviderError> {
        self.interfaces.clone()
    }

    fn gateways(&self) -> Result<Gateways, ProviderError> {
        self.gateways.clone()
    }

    fn dns_servers(&self) -> Result<Vec<String>, ProviderError> {
        self.dns.clone()
    }

    fn connections(&self) -> Result<Vec<RawConnection>, ProviderError> {
        self.connections.clone()
    }
}

#[derive(Clone)]
pub enum ProbeBehavior {
    Reply { success: bool, stdout: String },
    Fail(ProviderError),
    Hang,
    Panic,
}

#[derive(Default)]
pub struct FakeProbes {
    pub behaviors: HashMap<String, ProbeBehavior>,
}

impl FakeProbes {
    pub fn with(mut self, target: &str, behavior: ProbeBehavior) -> Self {
        self.behaviors.insert(target.to_string(), behavior);
        self
    }
}

impl ProbeExecutor for FakeProbes {
    fn probe(&self, target: String) -> ProbeFuture {
        let behavior = self
            .behaviors
            .get(&target)
            .cloned()
            .unwrap_or(ProbeBehavior::Reply {
                success: true,
                stdout: format!("1 packets transmitted, 1 received ({target})\n"),
            });
        Box::pin(async move {
            match behavior {
                ProbeBehavior::Reply { success, stdout } => Ok(ProbeOutput { success, stdout }),
                ProbeBehavior::Fail(err) => Err(err),
                ProbeBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::Other("woke up".to_string()))
                }
                ProbeBehavior::Panic => panic!("probe blew up"),
            }
        })
    }
}

pub struct FakeProcess {
    pub base: Result<RawProcess, ProcessError>,
    pub extended: Result<ProcessDetail, ProcessError>,
}

#[derive(Default)]
pub struct FakeProcesses {
    pub entries: Vec<(u32, FakeProcess)>,
    pub enumeration_error: Option<ProviderError>,
}

impl FakeProcesses {
    pub fn push(mut self, pid: u32, process: FakeProcess) -> Self {
        self.entries.push((pid, process));
        self
    }
}

pub fn raw_process(pid: u32, user: &str, cpu: Option<f64>, mem: Option<f64>) -> RawProcess {
    RawProcess {
        pid,
        name: format!("proc{pid}"),
        username: Some(user.to_string()),
        cpu_percent: cpu,
        memory_percent: mem,
        status: "running".to_string(),
        start_time_unix: 1_700_000_000,
    }
}

pub fn detail(pid: u32) -> ProcessDetail {
    ProcessDetail {
        command_line: vec![format!("/usr/bin/proc{pid}"), "--serve".to_string()],
        num_threads: Some(4),
        memory_info: MemoryInfo {
            rss: 4096,
            vms: 8192,
        },
    }
}

pub fn healthy(pid: u32, user: &str, cpu: f64, mem: f64) -> FakeProcess {
    FakeProcess {
        base: Ok(raw_process(pid, user, Some(cpu), Some(mem))),
        extended: Ok(detail(pid)),
    }
}

impl ProcessProvider for FakeProcesses {
    fn processes(&self) -> Result<Vec<u32>, ProviderError> {
        match &self.enumeration_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.entries.iter().map(|(pid, _)| *pid).collect()),
        }
    }

    fn base(&self, pid: u32) -> Result<RawProcess, ProcessError> {
        self.find(pid)?.base.clone()
    }

    fn extended(&self, pid: u32) -> Result<ProcessDetail, ProcessError> {
        self.find(pid)?.extended.clone()
    }
}

impl FakeProcesses {
    fn find(&self, pid: u32) -> Result<&FakeProcess, ProcessError> {
        self.entries
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, proc)| proc)
            .ok_or(ProcessError::NoSuchProcess(pid))
    }
}

pub struct FakeSessions(pub Result<Vec<SessionEntry>, ProviderError>);

impl SessionProvider for FakeSessions {
    fn sessions(&self) -> Result<Vec<SessionEntry>, ProviderError> {
        self.0.clone()
    }
}

pub struct FakeResources {
    pub cpu: Result<f64, ProviderError>,
    pub memory: Result<MemoryStats, ProviderError>,
    pub swap: Result<SwapStats, ProviderError>,
}

impl Default for FakeResources {
    fn default() -> Self {
        Self {
            cpu: Ok(12.5),
            memory: Ok(MemoryStats {
                total: 16 * 1024 * 1024 * 1024,
                available: 8 * 1024 * 1024 * 1024,
                used: 7 * 1024 * 1024 * 1024,
                percent: 50.0,
            }),
            swap: Ok(SwapStats {
                total: 2 * 1024 * 1024 * 1024,
                used: 0,
                percent: 0.0,
            }),
        }
    }
}

impl ResourceProvider for FakeResources {
    fn cpu_percent(&self, _interval: Duration) -> Result<f64, ProviderError> {
        self.cpu.clone()
    }

    fn memory(&self) -> Result<MemoryStats, ProviderError> {
        self.memory.clone()
    }

    fn swap(&self) -> Result<SwapStats, ProviderError> {
        self.swap.clone()
    }
}

pub fn providers() -> Providers {
    Providers {
        host: Arc::new(FakeHost(Ok(host_info()))),
        disks: Arc::new(
            FakeDisks::default()
                .with_partition("/", "ext4", 100 * GIB, 40 * GIB)
                .with_partition("/data", "xfs", 200 * GIB, 190 * GIB),
        ),
        network: Arc::new(FakeNetwork::default()),
        probes: Arc::new(FakeProbes::default()),
        processes: Arc::new(
            FakeProcesses::default()
                .push(1, healthy(1, "root", 0.1, 0.5))
                .push(200, healthy(200, "alice", 35.0, 12.0))
                .push(300, healthy(300, "alice", 2.0, 3.0)),
        ),
        sessions: Arc::new(FakeSessions(Ok(vec![SessionEntry {
            username: "alice".to_string(),
            terminal: "pts/0".to_string(),
            login_time: "2026-10-19 09:12".to_string(),
            host: "10.0.0.5".to_string(),
        }]))),
        resources: Arc::new(FakeResources::default()),
    }
}

pub const GIB: u64 = 1024 * 1024 * 1024;
