//! TCP client connector: connects a [`flow_shunt::tcp::TcpShunt`] and
//! wraps it as a [`Connector`].

use flow_core::event::TcpConnectOp;
use flow_shunt::error::{Result as ShuntResult, ShuntError};
use flow_shunt::options::ShuntOptions;
use flow_shunt::tcp::TcpShunt;

use crate::connector::{Connector, ConnectivityMonitor};
use crate::ip_service::IpService;

pub struct TcpConnector;

impl TcpConnector {
    pub fn connect(
        name: impl Into<String>,
        remote: &dyn IpService,
        options: ShuntOptions,
    ) -> ShuntResult<(Connector, ConnectivityMonitor)> {
        let remote = remote.resolve().map_err(ShuntError::Registration)?;
        let op = TcpConnectOp { remote, local_port: None };
        let name = name.into();
        let shunt = TcpShunt::connect(&name, &op, options)?;
        Ok(Connector::new(name, Box::new(shunt)))
    }
}
