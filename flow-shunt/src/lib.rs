//! Unified async I/O substrate for `flow`: every transport kind — files,
//! pipes, TCP, UDP, subprocess stdio, SSH-forwarded tunnels — is exposed as
//! a [`flow_core::element::ElementObject`] so the pipeline core never needs
//! to know which one it's talking to.
//!
//! Sockets and pipes share one background watcher thread polling a single
//! `mio::Poll` (see [`runtime`]); files and subprocesses get a dedicated
//! worker thread each, since blocking I/O can't be multiplexed the same
//! way. Either way, OS-side results cross into the pipeline thread through
//! a `flume` channel and are only applied to the `Graph` when the owning
//! element's [`flow_core::element::ElementObject::pump`] hook runs.

pub mod errno_map;
pub mod error;
pub mod file;
pub mod options;
pub mod runtime;
pub mod shunt;
pub mod tcp;
pub mod tcp_listener;
pub mod udp;
pub mod worker;

#[cfg(unix)]
pub mod pipe;
#[cfg(unix)]
pub mod process;
#[cfg(unix)]
pub mod ssh;

pub mod prelude {
    pub use crate::error::{Result, ShuntError};
    pub use crate::file::FileShunt;
    pub use crate::options::ShuntOptions;
    pub use crate::runtime::Runtime;
    pub use crate::tcp::TcpShunt;
    pub use crate::tcp_listener::{AcceptedSocket, TcpListenerShunt};
    pub use crate::udp::UdpShunt;
    pub use crate::worker::WorkerShunt;

    #[cfg(unix)]
    pub use crate::pipe::{PipeDirection, PipeShunt};
    #[cfg(unix)]
    pub use crate::process::ProcessShunts;
    #[cfg(unix)]
    pub use crate::ssh::{spawn_forward, ForwardDirection, SshForwardSpec};
}
