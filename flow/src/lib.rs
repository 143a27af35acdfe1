//! # Flow
//!
//! A streaming data-pipeline library: graphs of small, single-purpose
//! elements connected by pads, with I/O against files, pipes, TCP, UDP, TLS
//! and subprocesses handled by a shared async substrate (`flow-shunt`)
//! instead of by each element re-implementing its own event loop.
//!
//! ## Architecture
//!
//! - **`flow-core`**: the pipeline runtime — packets, pads, elements, and
//!   the `Graph` arena that dispatches between them.
//! - **`flow-shunt`**: the transports — every OS-level stream (file, pipe,
//!   TCP, UDP, subprocess, SSH tunnel) exposed as a plain `ElementObject`.
//! - **`flow-tls`**: TLS as a protocol element sitting between a plaintext
//!   pad pair and a ciphertext pad pair, independent of which shunt
//!   produces the ciphertext.
//! - **`flow`** (this crate): the facade applications actually build
//!   against — [`Connector`] (a shunt wrapped as a graph element with a
//!   connectivity-state monitor), the per-transport connector
//!   constructors, [`TcpListenerConnector`], [`UserAdapter`] (the
//!   application/pipeline boundary), and [`IpService`] (the address
//!   resolution seam).
//!
//! ## Quick start
//!
//! ```no_run
//! use flow::prelude::*;
//! use flow_core::element::Graph;
//! use flow_core::pad::PadRef;
//!
//! # fn example() -> flow_shunt::error::Result<()> {
//! let mut graph = Graph::new();
//! let remote = SocketIpService::from("93.184.216.34:80".parse().unwrap());
//! let (connector, monitor) = TcpConnector::connect("origin", &remote, Default::default())?;
//! let connector_id = graph.insert(Box::new(connector));
//!
//! let (adapter, to_user, from_user) = UserAdapter::new("app");
//! let adapter_id = graph.insert(Box::new(adapter));
//! graph.connect(PadRef::output(connector_id, 0), PadRef::input(adapter_id, 0));
//! graph.connect(PadRef::output(adapter_id, 0), PadRef::input(connector_id, 0));
//!
//! let _ = (monitor, to_user, from_user);
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod file_connector;
pub mod ip_service;
pub mod tcp_connector;
pub mod tcp_listener_connector;
pub mod udp_connector;
pub mod user_adapter;

pub mod prelude {
    pub use crate::connector::{connectivity_monitor, Connector, ConnectivityEvent, ConnectivityMonitor, ConnectivityState};
    pub use crate::file_connector::FileConnector;
    pub use crate::ip_service::{IpService, SocketIpService};
    pub use crate::tcp_connector::TcpConnector;
    pub use crate::tcp_listener_connector::{NewConnection, NewConnectionMonitor, TcpListenerConnector};
    pub use crate::udp_connector::UdpConnector;
    pub use crate::user_adapter::{FromUserSender, ToUserMonitor, UserAdapter};

    pub use flow_core::prelude::*;
    pub use flow_shunt::options::ShuntOptions;
    pub use flow_tls::prelude::*;
}
