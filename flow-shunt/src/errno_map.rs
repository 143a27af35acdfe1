//! Maps OS error conditions onto the universal event vocabulary, so every
//! transport reports the same `(domain, code)` pairs regardless of which
//! syscall produced them.

use std::io;

use flow_core::event::{codes, DetailedEvent};

/// Classifies an I/O error from a read/write/connect/accept/bind call into
/// a [`DetailedEvent`]. Errors with no more specific mapping fall back to a
/// generic `stream.physical_error`.
#[must_use]
pub fn map_io_error(context: &str, err: &io::Error) -> DetailedEvent {
    use io::ErrorKind as K;

    let description = format!("{context}: {err}");
    match err.kind() {
        K::NotFound => DetailedEvent::new(description, [(codes::FILE, codes::FILE_DOES_NOT_EXIST)]),
        K::PermissionDenied => DetailedEvent::new(description, [(codes::FILE, codes::FILE_PERMISSION_DENIED)]),
        K::ConnectionRefused => {
            DetailedEvent::new(description, [(codes::SOCKET, codes::SOCKET_CONNECTION_REFUSED)])
        }
        K::ConnectionReset | K::ConnectionAborted | K::BrokenPipe => DetailedEvent::new(
            description,
            [
                (codes::SOCKET, codes::SOCKET_CONNECTION_RESET),
                (codes::STREAM, codes::STREAM_END),
            ],
        ),
        K::AddrInUse => DetailedEvent::new(description, [(codes::SOCKET, codes::SOCKET_ADDRESS_IN_USE)]),
        K::AddrNotAvailable => {
            DetailedEvent::new(description, [(codes::SOCKET, codes::SOCKET_ADDRESS_DOES_NOT_EXIST)])
        }
        K::AlreadyExists => DetailedEvent::new(description, [(codes::FILE, codes::FILE_IS_LOCKED)]),
        K::StorageFull | K::QuotaExceeded => DetailedEvent::new(
            description,
            [
                (codes::FILE, codes::FILE_NO_SPACE),
                (codes::STREAM, codes::STREAM_RESOURCE_ERROR),
            ],
        ),
        K::InvalidFilename => DetailedEvent::new(description, [(codes::FILE, codes::FILE_PATH_TOO_LONG)]),
        _ => match err.raw_os_error() {
            Some(code) if is_too_many_links(code) => {
                DetailedEvent::new(description, [(codes::FILE, codes::FILE_TOO_MANY_LINKS)])
            }
            Some(code) if is_out_of_handles(code) => {
                DetailedEvent::new(description, [(codes::FILE, codes::FILE_OUT_OF_HANDLES)])
            }
            Some(code) if is_network_unreachable(code) => {
                DetailedEvent::new(description, [(codes::SOCKET, codes::SOCKET_NETWORK_UNREACHABLE)])
            }
            _ => DetailedEvent::new(description, [(codes::STREAM, codes::STREAM_PHYSICAL_ERROR)]),
        },
    }
}

#[cfg(unix)]
fn is_too_many_links(code: i32) -> bool {
    code == libc::EMLINK
}
#[cfg(not(unix))]
fn is_too_many_links(_code: i32) -> bool {
    false
}

#[cfg(unix)]
fn is_out_of_handles(code: i32) -> bool {
    code == libc::EMFILE || code == libc::ENFILE
}
#[cfg(not(unix))]
fn is_out_of_handles(_code: i32) -> bool {
    false
}

#[cfg(unix)]
fn is_network_unreachable(code: i32) -> bool {
    code == libc::ENETUNREACH || code == libc::EHOSTUNREACH
}
#[cfg(not(unix))]
fn is_network_unreachable(_code: i32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_reset_maps_to_socket_and_stream_tags() {
        let err = io::Error::from(io::ErrorKind::ConnectionReset);
        let ev = map_io_error("recv", &err);
        assert!(ev.matches(codes::SOCKET, codes::SOCKET_CONNECTION_RESET));
        assert!(ev.matches(codes::STREAM, codes::STREAM_END));
    }

    #[test]
    fn unmapped_error_falls_back_to_physical_error() {
        let err = io::Error::new(io::ErrorKind::Other, "weird");
        let ev = map_io_error("write", &err);
        assert!(ev.matches(codes::STREAM, codes::STREAM_PHYSICAL_ERROR));
    }
}
