pub mod net;
pub mod system;

#[cfg(test)]
pub mod fake;

use crate::config::Config;
use crate::snapshot::{
    GatewayRecord, HostInfo, InterfaceBindings, MemoryStats, ProcessDetail, SessionEntry,
    SwapStats,
};
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not supported on this platform: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn from_io(context: impl std::fmt::Display, err: io::Error) -> Self {
        let message = format!("{context}: {err}");
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(message),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(message),
            _ => Self::Other(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("process {0} no longer exists")]
    NoSuchProcess(u32),
    #[error("access denied to process {0}")]
    AccessDenied(u32),
    #[error("process {0} is a zombie")]
    Zombie(u32),
    #[error("process {pid}: {message}")]
    Other { pid: u32, message: String },
}

impl ProcessError {
    pub fn from_io(pid: u32, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NoSuchProcess(pid),
            io::ErrorKind::PermissionDenied => Self::AccessDenied(pid),
            _ => Self::Other {
                pid,
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub opts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInterface {
    pub name: String,
    pub bindings: Result<InterfaceBindings, ProviderError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gateways {
    pub ipv4: Option<GatewayRecord>,
    pub ipv6: Option<GatewayRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConnection {
    pub local_ip: IpAddr,
    pub local_port: u16,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub state: String,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    pub username: Option<String>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub status: String,
    pub start_time_unix: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutput {
    pub success: bool,
    pub stdout: String,
}

pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeOutput, ProviderError>> + Send>>;

pub trait HostProvider: Send + Sync {
    fn host_info(&self) -> Result<HostInfo, ProviderError>;
}

pub trait DiskProvider: Send + Sync {
    fn partitions(&self) -> Result<Vec<Partition>, ProviderError>;
    fn usage(&self, mountpoint: &str) -> Result<DiskUsage, ProviderError>;
}

pub trait NetworkProvider: Send + Sync {
    fn interfaces(&self) -> Result<Vec<RawInterface>, ProviderError>;
    fn gateways(&self) -> Result<Gateways, ProviderError>;
    fn dns_servers(&self) -> Result<Vec<String>, ProviderError>;
    fn connections(&self) -> Result<Vec<RawConnection>, ProviderError>;
}

// The caller bounds the future with its own timeout and drops it on expiry.
pub trait ProbeExecutor: Send + Sync {
    fn probe(&self, target: String) -> ProbeFuture;
}

pub trait ProcessProvider: Send + Sync {
    fn processes(&self) -> Result<Vec<u32>, ProviderError>;
    fn base(&self, pid: u32) -> Result<RawProcess, ProcessError>;
    fn extended(&self, pid: u32) -> Result<ProcessDetail, ProcessError>;
}

pub trait SessionProvider: Send + Sync {
    fn sessions(&self) -> Result<Vec<SessionEntry>, ProviderError>;
}

pub trait ResourceProvider: Send + Sync {
    fn cpu_percent(&self, interval: Duration) -> Result<f64, ProviderError>;
    fn memory(&self) -> Result<MemoryStats, ProviderError>;
    fn swap(&self) -> Result<SwapStats, ProviderError>;
}

#[derive(Clone)]
pub struct Providers {
    pub host: Arc<dyn HostProvider>,
    pub disks: Arc<dyn DiskProvider>,
    pub network: Arc<dyn NetworkProvider>,
    pub probes: Arc<dyn ProbeExecutor>,
    pub processes: Arc<dyn ProcessProvider>,
    pub sessions: Arc<dyn SessionProvider>,
    pub resources: Arc<dyn ResourceProvider>,
}

impl Providers {
    pub fn platform(cfg: &Config) -> Self {
        Self {
            host: Arc::new(system::SysinfoHost),
            disks: Arc::new(system::SysinfoDisks::new()),
            network: Arc::new(net::IpRouteNetwork::new(cfg.resolv_conf.clone())),
            probes: Arc::new(net::SystemPing::for_host()),
            processes: Arc::new(system::SysinfoProcesses::new()),
            sessions: Arc::new(system::WhoSessions),
            resources: Arc::new(system::SysinfoResources),
        }
    }
}
