//! The address-resolution seam. `flow` never resolves DNS names itself;
//! it only needs *something* it can turn into a concrete `IpAddr`/port
//! pair to hand to a TCP/UDP connector.

use std::net::SocketAddr;

use flow_core::event::IpServiceDescriptor;

/// A name that can be turned into a concrete socket address. Applications
/// with a DNS resolver implement this against their own lookup; `flow`
/// ships [`SocketIpService`] so the crate is usable standalone.
pub trait IpService: Send + Sync {
    fn resolve(&self) -> std::io::Result<IpServiceDescriptor>;
}

/// The trivial [`IpService`]: a socket address that is already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketIpService(pub SocketAddr);

impl From<SocketAddr> for SocketIpService {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl IpService for SocketIpService {
    fn resolve(&self) -> std::io::Result<IpServiceDescriptor> {
        Ok(IpServiceDescriptor {
            address: self.0.ip(),
            port: self.0.port(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_ip_service_resolves_to_itself() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let svc = SocketIpService::from(addr);
        let resolved = svc.resolve().unwrap();
        assert_eq!(resolved.address, addr.ip());
        assert_eq!(resolved.port, addr.port());
    }
}
