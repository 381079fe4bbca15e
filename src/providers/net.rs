use crate::providers::{
    Gateways, NetworkProvider, ProbeExecutor, ProbeFuture, ProbeOutput, ProviderError,
    RawConnection, RawInterface,
};
use crate::snapshot::{GatewayRecord, InterfaceBindings, Ipv4Binding, Ipv6Binding};
use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

pub struct IpRouteNetwork {
    resolv_conf: PathBuf,
}

impl IpRouteNetwork {
    pub fn new(resolv_conf: impl Into<PathBuf>) -> Self {
        Self {
            resolv_conf: resolv_conf.into(),
        }
    }
}

impl NetworkProvider for IpRouteNetwork {
    fn interfaces(&self) -> Result<Vec<RawInterface>, ProviderError> {
        let text = run_ip(&["-j", "addr", "show"])?;
        parse_ip_addr(&text)
    }

    fn gateways(&self) -> Result<Gateways, ProviderError> {
        let v4 = run_ip(&["-j", "route", "show", "default"])?;
        let ipv4 = parse_default_route(&v4)?;

        // Hosts with IPv6 disabled reject `ip -6`; that only means there is no v6 route.
        let ipv6 = match run_ip(&["-6", "-j", "route", "show", "default"]) {
            Ok(text) => parse_default_route(&text)?,
            Err(err) => {
                debug!(error = %err, "ipv6 default route unavailable");
                None
            }
        };

        Ok(Gateways { ipv4, ipv6 })
    }

    fn dns_servers(&self) -> Result<Vec<String>, ProviderError> {
        let text = fs::read_to_string(&self.resolv_conf)
            .map_err(|err| ProviderError::from_io(self.resolv_conf.display(), err))?;
        Ok(parse_resolv_conf(&text))
    }

    fn connections(&self) -> Result<Vec<RawConnection>, ProviderError> {
        let sockets = get_sockets_info(
            AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
            ProtocolFlags::TCP,
        )
        .map_err(|err| {
            let message = err.to_string();
            if message.to_ascii_lowercase().contains("permission denied") {
                ProviderError::PermissionDenied(message)
            } else {
                ProviderError::Other(message)
            }
        })?;

        Ok(sockets
            .into_iter()
            .filter_map(|socket| match socket.protocol_socket_info {
                ProtocolSocketInfo::Tcp(tcp) => Some(RawConnection {
                    local_ip: tcp.local_addr,
                    local_port: tcp.local_port,
                    remote_ip: tcp.remote_addr,
                    remote_port: tcp.remote_port,
                    state: tcp_state_name(&tcp.state).to_string(),
                    pid: socket.associated_pids.first().copied(),
                }),
                ProtocolSocketInfo::Udp(_) => None,
            })
            .collect())
    }
}

fn run_ip(args: &[&str]) -> Result<String, ProviderError> {
    if !cfg!(target_os = "linux") {
        return Err(ProviderError::Unsupported(
            "interface data is read with iproute2".to_string(),
        ));
    }
    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|err| ProviderError::from_io("ip", err))?;
    if !output.status.success() {
        return Err(ProviderError::Other(format!(
            "ip {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[derive(Debug, Deserialize)]
struct IpLink {
    ifname: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    addr_info: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    family: String,
    local: String,
    prefixlen: u8,
    #[serde(default)]
    broadcast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpRoute {
    #[serde(default)]
    gateway: Option<String>,
    #[serde(default)]
    dev: Option<String>,
}

fn parse_ip_addr(text: &str) -> Result<Vec<RawInterface>, ProviderError> {
    let links: Vec<IpLink> = serde_json::from_str(text)
        .map_err(|err| ProviderError::Other(format!("unexpected `ip addr` output: {err}")))?;

    Ok(links
        .into_iter()
        .map(|link| RawInterface {
            bindings: link_bindings(&link),
            name: link.ifname,
        })
        .collect())
}

fn link_bindings(link: &IpLink) -> Result<InterfaceBindings, ProviderError> {
    let mut bindings = InterfaceBindings {
        mac_address: link.address.clone().unwrap_or_default(),
        ..InterfaceBindings::default()
    };

    for raw in &link.addr_info {
        let info: IpAddrInfo = serde_json::from_value(raw.clone()).map_err(|err| {
            ProviderError::Other(format!("{}: malformed address record: {err}", link.ifname))
        })?;
        match info.family.as_str() {
            "inet" => bindings.ipv4.push(Ipv4Binding {
                address: info.local,
                netmask: ipv4_netmask(info.prefixlen)?,
                broadcast: info.broadcast.unwrap_or_default(),
            }),
            "inet6" => bindings.ipv6.push(Ipv6Binding {
                address: info.local,
                netmask: ipv6_netmask(info.prefixlen)?,
            }),
            other => debug!(iface = %link.ifname, family = other, "skipping address family"),
        }
    }

    Ok(bindings)
}

fn ipv4_netmask(prefix: u8) -> Result<String, ProviderError> {
    if prefix > 32 {
        return Err(ProviderError::Other(format!("invalid IPv4 prefix /{prefix}")));
    }
    let bits = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    Ok(Ipv4Addr::from(bits).to_string())
}

fn ipv6_netmask(prefix: u8) -> Result<String, ProviderError> {
    if prefix > 128 {
        return Err(ProviderError::Other(format!("invalid IPv6 prefix /{prefix}")));
    }
    let bits = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
    Ok(Ipv6Addr::from(bits).to_string())
}

fn parse_default_route(text: &str) -> Result<Option<GatewayRecord>, ProviderError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let routes: Vec<IpRoute> = serde_json::from_str(text)
        .map_err(|err| ProviderError::Other(format!("unexpected `ip route` output: {err}")))?;

    Ok(routes.into_iter().find_map(|route| {
        Some(GatewayRecord {
            address: route.gateway?,
            interface: route.dev.unwrap_or_default(),
        })
    }))
}

fn parse_resolv_conf(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| l.starts_with("nameserver"))
        .filter_map(|l| l.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

fn tcp_state_name(state: &TcpState) -> &'static str {
    match state {
        TcpState::Established => "ESTABLISHED",
        TcpState::SynSent => "SYN_SENT",
        TcpState::SynReceived => "SYN_RECV",
        TcpState::FinWait1 => "FIN_WAIT1",
        TcpState::FinWait2 => "FIN_WAIT2",
        TcpState::TimeWait => "TIME_WAIT",
        TcpState::Closed => "CLOSE",
        TcpState::CloseWait => "CLOSE_WAIT",
        TcpState::LastAck => "LAST_ACK",
        TcpState::Listen => "LISTEN",
        TcpState::Closing => "CLOSING",
        _ => "NONE",
    }
}

pub struct SystemPing {
    count_flag: &'static str,
}

impl SystemPing {
    pub fn for_host() -> Self {
        Self {
            count_flag: ping_count_flag(std::env::consts::FAMILY),
        }
    }
}

// Windows takes the echo count as `-n`.
pub fn ping_count_flag(os_family: &str) -> &'static str {
    if os_family.eq_ignore_ascii_case("windows") {
        "-n"
    } else {
        "-c"
    }
}

impl ProbeExecutor for SystemPing {
    fn probe(&self, target: String) -> ProbeFuture {
        let count_flag = self.count_flag;
        Box::pin(async move {
            let output = tokio::process::Command::new("ping")
                .args([count_flag, "1", target.as_str()])
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|err| ProviderError::from_io("ping", err))?;
            Ok(ProbeOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_ADDR_JSON: &str = r#"[
        {"ifindex":1,"ifname":"lo","flags":["LOOPBACK","UP"],"address":"00:00:00:00:00:00",
         "addr_info":[{"family":"inet","local":"127.0.0.1","prefixlen":8,"scope":"host"},
                      {"family":"inet6","local":"::1","prefixlen":128,"scope":"host"}]},
        {"ifindex":2,"ifname":"eth0","address":"52:54:00:12:34:56",
         "addr_info":[{"family":"inet","local":"192.168.1.20","prefixlen":24,"broadcast":"192.168.1.255"}]},
        {"ifindex":3,"ifname":"wlan0","address":"aa:bb:cc:dd:ee:ff","addr_info":[]},
        {"ifindex":4,"ifname":"tun0","addr_info":[{"family":"inet","prefixlen":32}]}
    ]"#;

    #[test]
    fn ip_addr_json_yields_bindings_per_interface() {
        let ifaces = parse_ip_addr(IP_ADDR_JSON).unwrap();
        let names: Vec<&str> = ifaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["lo", "eth0", "wlan0", "tun0"]);

        let lo = ifaces[0].bindings.as_ref().unwrap();
        assert_eq!(lo.ipv4[0].netmask, "255.0.0.0");
        assert_eq!(lo.ipv6[0].address, "::1");
        assert_eq!(
            lo.ipv6[0].netmask,
            "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"
        );

        let eth0 = ifaces[1].bindings.as_ref().unwrap();
        assert_eq!(eth0.mac_address, "52:54:00:12:34:56");
        assert_eq!(eth0.ipv4[0].broadcast, "192.168.1.255");
        assert_eq!(eth0.ipv4[0].netmask, "255.255.255.0");

        let wlan0 = ifaces[2].bindings.as_ref().unwrap();
        assert!(wlan0.ipv4.is_empty());

        // A malformed record only poisons its own interface.
        assert!(ifaces[3].bindings.is_err());
    }

    #[test]
    fn netmask_edges() {
        assert_eq!(ipv4_netmask(0).unwrap(), "0.0.0.0");
        assert_eq!(ipv4_netmask(32).unwrap(), "255.255.255.255");
        assert!(ipv4_netmask(33).is_err());
        assert_eq!(ipv6_netmask(64).unwrap(), "ffff:ffff:ffff:ffff::");
        assert_eq!(ipv6_netmask(0).unwrap(), "::");
    }

    #[test]
    fn default_route_picks_first_gateway() {
        let text = r#"[{"dst":"default","gateway":"192.168.1.1","dev":"eth0","flags":[]}]"#;
        let gw = parse_default_route(text).unwrap().unwrap();
        assert_eq!(gw.address, "192.168.1.1");
        assert_eq!(gw.interface, "eth0");

        assert_eq!(parse_default_route("[]").unwrap(), None);
        assert_eq!(parse_default_route("").unwrap(), None);
        assert!(parse_default_route("not json").is_err());
    }

    #[test]
    fn resolv_conf_nameservers_in_order() {
        let text = "# generated\nsearch example.org\nnameserver 10.0.0.1\nnameserver 1.1.1.1\noptions edns0\n";
        assert_eq!(parse_resolv_conf(text), vec!["10.0.0.1", "1.1.1.1"]);
    }

    #[test]
    fn missing_resolv_conf_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = IpRouteNetwork::new(dir.path().join("resolv.conf"));
        let err = provider.dns_servers().unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn ping_flag_depends_on_os_family() {
        assert_eq!(ping_count_flag("windows"), "-n");
        assert_eq!(ping_count_flag("unix"), "-c");
    }
}
