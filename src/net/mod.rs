//! Connectivity seam
//!
//! Network association (Wi-Fi join, DHCP) happens outside this crate; the
//! pipeline only asks whether the host is online and at which address, so
//! it knows when and where to advertise the stream URL.

use std::net::IpAddr;

/// Link status of the host network interface.
pub trait Connectivity: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Address clients should use to reach this host, if known.
    fn address(&self) -> Option<IpAddr>;
}

/// Fixed connectivity for hosts with ambient networking.
#[derive(Debug, Clone)]
pub struct StaticConnectivity {
    addr: IpAddr,
}

impl StaticConnectivity {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }

    pub fn loopback() -> Self {
        Self {
            addr: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        }
    }
}

impl Connectivity for StaticConnectivity {
    fn is_connected(&self) -> bool {
        true
    }

    fn address(&self) -> Option<IpAddr> {
        Some(self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_connectivity_reports_its_address() {
        let conn = StaticConnectivity::loopback();
        assert!(conn.is_connected());
        assert_eq!(conn.address(), Some("127.0.0.1".parse().unwrap()));
    }
}
