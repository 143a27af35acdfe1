//! SSH-forwarded shunt: spawns `ssh` with a local or remote port-forwarding
//! request and treats its stdio as a pipe shunt, tunneling a stream through
//! an external `ssh` binary rather than linking an SSH implementation in.

use std::process::Command;

use crate::options::ShuntOptions;
use crate::process::ProcessShunts;

/// Direction of an SSH `-L`/`-R` forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDirection {
    /// `-L`: a local port forwarded to a host reachable from the remote end.
    Local,
    /// `-R`: a remote port forwarded back to a host reachable locally.
    Remote,
}

#[derive(Debug, Clone)]
pub struct SshForwardSpec {
    pub direction: ForwardDirection,
    pub bind_port: u16,
    pub target_host: String,
    pub target_port: u16,
    pub ssh_host: String,
    pub identity_file: Option<String>,
}

impl SshForwardSpec {
    fn forward_flag(&self) -> String {
        let letter = match self.direction {
            ForwardDirection::Local => 'L',
            ForwardDirection::Remote => 'R',
        };
        format!("-{letter}{}:{}:{}", self.bind_port, self.target_host, self.target_port)
    }
}

/// Spawns `ssh -N <forward> <host>` (`-N`: no remote command, just hold the
/// tunnel open) and exposes its stdio as pipe shunts via [`ProcessShunts`].
/// The actual forwarded traffic never touches this process's stdio — only
/// `ssh`'s own diagnostic/keepalive channel does — so the stdin/stdout
/// shunts here exist mainly to detect the tunnel dying (EOF on stdout, a
/// nonzero exit status) rather than to carry data.
pub fn spawn_forward(spec: &SshForwardSpec, options: ShuntOptions) -> crate::error::Result<ProcessShunts> {
    let mut command = Command::new("ssh");
    command.arg("-N").arg(spec.forward_flag());
    if let Some(identity) = &spec.identity_file {
        command.arg("-i").arg(identity);
    }
    command.arg(&spec.ssh_host);

    ProcessShunts::spawn(command, true, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_flag_formats_local_and_remote() {
        let local = SshForwardSpec {
            direction: ForwardDirection::Local,
            bind_port: 8080,
            target_host: "internal.example".into(),
            target_port: 80,
            ssh_host: "bastion".into(),
            identity_file: None,
        };
        assert_eq!(local.forward_flag(), "-L8080:internal.example:80");

        let remote = SshForwardSpec {
            direction: ForwardDirection::Remote,
            ..local
        };
        assert_eq!(remote.forward_flag(), "-R8080:internal.example:80");
    }
}
