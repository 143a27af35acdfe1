//! UDP connector: binds a [`flow_shunt::udp::UdpShunt`] and wraps it as a
//! [`Connector`].

use flow_core::event::UdpConnectOp;
use flow_shunt::error::{Result as ShuntResult, ShuntError};
use flow_shunt::options::ShuntOptions;
use flow_shunt::udp::UdpShunt;

use crate::connector::{Connector, ConnectivityMonitor};
use crate::ip_service::IpService;

pub struct UdpConnector;

impl UdpConnector {
    pub fn bind(
        name: impl Into<String>,
        local: Option<&dyn IpService>,
        remote: &dyn IpService,
        options: ShuntOptions,
    ) -> ShuntResult<(Connector, ConnectivityMonitor)> {
        let local = local.map(IpService::resolve).transpose().map_err(ShuntError::Registration)?;
        let remote = remote.resolve().map_err(ShuntError::Registration)?;
        let op = UdpConnectOp { local, remote };
        let name = name.into();
        let shunt = UdpShunt::bind(&name, &op, options)?;
        Ok(Connector::new(name, Box::new(shunt)))
    }
}
