use crate::classify::Severity;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SnapshotKind {
    Disk,
    Network,
    Process,
    System,
    All,
}

impl SnapshotKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Process => "process",
            Self::System => "system",
            Self::All => "all",
        }
    }

    pub const fn wants_disks(&self) -> bool {
        matches!(self, Self::Disk | Self::All)
    }

    pub const fn wants_network(&self) -> bool {
        matches!(self, Self::Network | Self::All)
    }

    pub const fn wants_processes(&self) -> bool {
        matches!(self, Self::Process | Self::All)
    }

    pub const fn wants_system_resources(&self) -> bool {
        matches!(self, Self::Process | Self::System | Self::All)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_info: Option<HostInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disks: Option<Section<DiskReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Section<NetworkReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<Section<ProcessReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_resources: Option<Section<SystemResources>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_in_users: Option<Vec<SessionRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Snapshot {
    pub fn new(timestamp: String, host_info: HostInfo) -> Self {
        Self {
            timestamp,
            host_info: Some(host_info),
            disks: None,
            network: None,
            processes: None,
            system_resources: None,
            logged_in_users: None,
            error: None,
        }
    }

    pub fn failed(timestamp: String, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            host_info: None,
            disks: None,
            network: None,
            processes: None,
            system_resources: None,
            logged_in_users: None,
            error: Some(error.into()),
        }
    }

    pub fn failed_sections(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if matches!(self.disks, Some(Section::Failed { .. })) {
            out.push("disks");
        }
        if matches!(self.network, Some(Section::Failed { .. })) {
            out.push("network");
        }
        if matches!(self.processes, Some(Section::Failed { .. })) {
            out.push("processes");
        }
        if matches!(self.system_resources, Some(Section::Failed { .. })) {
            out.push("system_resources");
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Ok(T),
    Failed { error: String },
}

impl<T> Section<T> {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Section<T> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(v) => Self::Ok(v),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    pub system: String,
    pub node: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskReport {
    pub entries: Vec<DiskEntry>,
    pub summary: DiskSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskEntry {
    pub device: String,
    pub mountpoint: String,
    pub filesystem_type: String,
    pub opts: Vec<String>,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub usage_percent: f64,
    pub is_critical: bool,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskSummary {
    pub total_disks: usize,
    pub critical_disks: usize,
    pub warning_disks: usize,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_storage_gb: f64,
    pub total_used_gb: f64,
    pub total_free_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub interfaces: Section<Vec<InterfaceInfo>>,
    pub default_gateway: GatewayInfo,
    pub dns_servers: Vec<String>,
    pub connections: Vec<ConnectionRecord>,
    pub ping_stats: BTreeMap<String, PingResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    #[serde(flatten)]
    pub state: InterfaceState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InterfaceState {
    Resolved {
        mac_address: String,
        ipv4: Vec<Ipv4Binding>,
        ipv6: Vec<Ipv6Binding>,
        status: LinkStatus,
    },
    Failed {
        error: String,
    },
}

impl InterfaceInfo {
    pub fn resolved(name: String, bindings: InterfaceBindings) -> Self {
        let status = LinkStatus::from_ipv4_count(bindings.ipv4.len());
        Self {
            name,
            state: InterfaceState::Resolved {
                mac_address: bindings.mac_address,
                ipv4: bindings.ipv4,
                ipv6: bindings.ipv6,
                status,
            },
        }
    }

    pub fn failed(name: String, error: impl Into<String>) -> Self {
        Self {
            name,
            state: InterfaceState::Failed {
                error: error.into(),
            },
        }
    }

    pub fn status(&self) -> Option<LinkStatus> {
        match &self.state {
            InterfaceState::Resolved { status, .. } => Some(*status),
            InterfaceState::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceBindings {
    pub mac_address: String,
    pub ipv4: Vec<Ipv4Binding>,
    pub ipv6: Vec<Ipv6Binding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
}

impl LinkStatus {
    // Link state is inferred from addressing, not read from the driver.
    pub const fn from_ipv4_count(count: usize) -> Self {
        if count > 0 {
            Self::Up
        } else {
            Self::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv4Binding {
    pub address: String,
    pub netmask: String,
    pub broadcast: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv6Binding {
    pub address: String,
    pub netmask: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewayInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<GatewayRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<GatewayRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayRecord {
    pub address: String,
    pub interface: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConnectionRecord {
    Established(ConnectionEntry),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionEntry {
    pub local_address: String,
    pub remote_address: String,
    pub status: String,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PingResult {
    pub fn completed(success: bool, output: &str) -> Self {
        Self {
            success,
            output: Some(output.trim().to_string()),
            error: None,
        }
    }

    pub fn errored(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub total_count: usize,
    pub by_user: BTreeMap<String, usize>,
    pub top_cpu: Vec<ProcessEntry>,
    pub top_memory: Vec<ProcessEntry>,
    pub process_list: Vec<ProcessEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub username: Option<String>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub status: String,
    pub create_time: String,
    #[serde(flatten)]
    pub detail: Option<ProcessDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDetail {
    pub command_line: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<u64>,
    pub memory_info: MemoryInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub rss: u64,
    pub vms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SessionRecord {
    Session(SessionEntry),
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    pub username: String,
    pub terminal: String,
    pub login_time: String,
    pub host: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemResources {
    pub cpu_percent: f64,
    pub memory: MemoryStats,
    pub swap: SwapStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwapStats {
    pub total: u64,
    pub used: u64,
    pub percent: f64,
}

pub fn now_rfc3339() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

pub fn unix_to_rfc3339(secs: u64) -> String {
    humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(secs)).to_string()
}

pub fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
