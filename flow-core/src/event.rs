//! The universal stream-event vocabulary.
//!
//! Every transport and protocol element in `flow` negotiates connection
//! lifecycle, partial reads, and error recovery through this small, closed
//! set of typed control events rather than ad hoc signals. An event travels
//! through the pipeline exactly like data: wrapped in [`crate::packet::Packet::Object`].

use std::fmt;
use std::sync::Arc;

/// A short ASCII namespace for an event code, e.g. `"stream"`, `"file"`.
pub type Domain = &'static str;

/// A small integer (represented as a `&'static str` tag for readability in
/// logs and tests) identifying a condition within a [`Domain`].
pub type Code = &'static str;

/// Well-known `(domain, code)` pairs for the events below.
pub mod codes {
    use super::{Code, Domain};

    pub const STREAM: Domain = "stream";
    pub const FILE: Domain = "file";
    pub const SOCKET: Domain = "socket";
    pub const LOOKUP: Domain = "lookup";
    pub const EXEC: Domain = "exec";

    pub const STREAM_BEGIN: Code = "begin";
    pub const STREAM_END: Code = "end";
    pub const STREAM_END_CONVERSE: Code = "end_converse";
    pub const STREAM_DENIED: Code = "denied";
    pub const STREAM_SEGMENT_BEGIN: Code = "segment_begin";
    pub const STREAM_SEGMENT_END: Code = "segment_end";
    pub const STREAM_ERROR: Code = "error";
    pub const STREAM_APP_ERROR: Code = "app_error";
    pub const STREAM_PHYSICAL_ERROR: Code = "physical_error";
    pub const STREAM_RESOURCE_ERROR: Code = "resource_error";

    pub const FILE_REACHED_END: Code = "reached_end";
    pub const FILE_NO_SPACE: Code = "no_space";
    pub const FILE_PERMISSION_DENIED: Code = "permission_denied";
    pub const FILE_DOES_NOT_EXIST: Code = "does_not_exist";
    pub const FILE_IS_NOT_A_FILE: Code = "is_not_a_file";
    pub const FILE_TOO_MANY_LINKS: Code = "too_many_links";
    pub const FILE_OUT_OF_HANDLES: Code = "out_of_handles";
    pub const FILE_PATH_TOO_LONG: Code = "path_too_long";
    pub const FILE_IS_READ_ONLY: Code = "is_read_only";
    pub const FILE_IS_LOCKED: Code = "is_locked";
    pub const FILE_RESTART: Code = "restart";

    pub const SOCKET_ADDRESS_IN_USE: Code = "address_in_use";
    pub const SOCKET_ADDRESS_PROTECTED: Code = "address_protected";
    pub const SOCKET_ADDRESS_DOES_NOT_EXIST: Code = "address_does_not_exist";
    pub const SOCKET_CONNECTION_REFUSED: Code = "connection_refused";
    pub const SOCKET_CONNECTION_RESET: Code = "connection_reset";
    pub const SOCKET_NETWORK_UNREACHABLE: Code = "network_unreachable";
    pub const SOCKET_ACCEPT_ERROR: Code = "accept_error";
    pub const SOCKET_OVERSIZED_PACKET: Code = "oversized_packet";

    pub const LOOKUP_NO_RECORDS: Code = "no_records";
    pub const LOOKUP_TEMPORARY_SERVER_FAILURE: Code = "temporary_server_failure";
    pub const LOOKUP_PERMANENT_SERVER_FAILURE: Code = "permanent_server_failure";

    pub const EXEC_PARSE_ERROR: Code = "parse_error";
    pub const EXEC_RUN_ERROR: Code = "run_error";
}

/// A detailed event: a human-readable description plus an ordered list of
/// `(domain, code)` classifications. A single failing syscall can carry more
/// than one classification (e.g. a disk-full write is both `file.no_space`
/// and `stream.resource_error`).
#[derive(Debug, Clone)]
pub struct DetailedEvent {
    description: String,
    tags: Vec<(Domain, Code)>,
}

impl DetailedEvent {
    #[must_use]
    pub fn new(description: impl Into<String>, tags: impl IntoIterator<Item = (Domain, Code)>) -> Self {
        Self {
            description: description.into(),
            tags: tags.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn tags(&self) -> &[(Domain, Code)] {
        &self.tags
    }

    /// True if any of this event's tags match `(domain, code)`.
    #[must_use]
    pub fn matches(&self, domain: Domain, code: Code) -> bool {
        self.tags.iter().any(|&(d, c)| d == domain && c == code)
    }

    pub fn stream_begin() -> Self {
        Self::new("stream began", [(codes::STREAM, codes::STREAM_BEGIN)])
    }

    pub fn stream_end() -> Self {
        Self::new("stream ended", [(codes::STREAM, codes::STREAM_END)])
    }

    pub fn stream_end_converse() -> Self {
        Self::new(
            "peer closed its direction",
            [(codes::STREAM, codes::STREAM_END_CONVERSE)],
        )
    }

    pub fn stream_segment_begin() -> Self {
        Self::new(
            "segment began",
            [(codes::STREAM, codes::STREAM_SEGMENT_BEGIN)],
        )
    }

    pub fn stream_segment_end() -> Self {
        Self::new("segment ended", [(codes::STREAM, codes::STREAM_SEGMENT_END)])
    }

    pub fn stream_denied(description: impl Into<String>, extra: impl IntoIterator<Item = (Domain, Code)>) -> Self {
        let mut tags = vec![(codes::STREAM, codes::STREAM_DENIED)];
        tags.extend(extra);
        Self::new(description, tags)
    }

    pub fn file_reached_end() -> Self {
        Self::new(
            "end of file reached",
            [(codes::FILE, codes::FILE_REACHED_END)],
        )
    }
}

impl fmt::Display for DetailedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)?;
        for (d, c) in &self.tags {
            write!(f, " [{d}.{c}]")?;
        }
        Ok(())
    }
}

/// A seek anchor for [`Position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekAnchor {
    Current,
    Begin,
    End,
}

/// Emitted by a seek request, and by file shunts after a seek completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub anchor: SeekAnchor,
    pub offset: i64,
}

/// Bounds the next read segment on a file shunt. A negative `length` means
/// "read to end of file".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRequest {
    pub length: i64,
}

impl SegmentRequest {
    #[must_use]
    pub const fn to_end() -> Self {
        Self { length: -1 }
    }

    #[must_use]
    pub const fn is_to_end(&self) -> bool {
        self.length < 0
    }
}

/// File-open access mode for [`FileConnectOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessMode {
    Read,
    Write,
    ReadWrite,
}

/// Delivered to a file connector to open a file.
#[derive(Debug, Clone)]
pub struct FileConnectOp {
    pub path: std::path::PathBuf,
    pub access_mode: FileAccessMode,
    pub create: bool,
    pub replace: bool,
    pub creation_permissions: u32,
}

/// A remote endpoint as an already-resolved address/port pair. DNS
/// resolution itself is an external collaborator's job, not this crate's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpServiceDescriptor {
    pub address: std::net::IpAddr,
    pub port: u16,
}

impl fmt::Display for IpServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Delivered to a TCP connector to initiate an outbound connection.
#[derive(Debug, Clone)]
pub struct TcpConnectOp {
    pub remote: IpServiceDescriptor,
    pub local_port: Option<u16>,
}

/// Delivered to a UDP connector to (re)bind and/or fix a destination.
#[derive(Debug, Clone)]
pub struct UdpConnectOp {
    pub local: Option<IpServiceDescriptor>,
    pub remote: IpServiceDescriptor,
}

/// The object payload carried by an `Object` packet, see
/// [`crate::packet::Packet`]. One boxed, immutable event per packet.
#[derive(Debug, Clone)]
pub enum Event {
    Detailed(Arc<DetailedEvent>),
    Anonymous(Arc<AnonymousEvent>),
    Position(Position),
    SegmentRequest(SegmentRequest),
    FileConnectOp(Arc<FileConnectOp>),
    TcpConnectOp(Arc<TcpConnectOp>),
    UdpConnectOp(Arc<UdpConnectOp>),
    IpService(Arc<IpServiceDescriptor>),
    /// Selects the active input/output index for [`crate::elements::Mux`]
    /// and [`crate::elements::Demux`].
    MuxSelect(usize),
}

impl Event {
    #[must_use]
    pub fn detailed(event: DetailedEvent) -> Self {
        Self::Detailed(Arc::new(event))
    }

    #[must_use]
    pub fn as_detailed(&self) -> Option<&DetailedEvent> {
        match self {
            Self::Detailed(d) => Some(d),
            _ => None,
        }
    }

    /// True if this is a detailed event matching `(domain, code)`.
    #[must_use]
    pub fn matches(&self, domain: Domain, code: Code) -> bool {
        self.as_detailed().is_some_and(|d| d.matches(domain, code))
    }
}

/// A single owned pointer with an optional destructor, used to transfer
/// out-of-band objects (such as a newly accepted shunt) across the pipeline.
///
/// The payload is set exactly once, at construction, from the
/// constructor's own argument; there is no setter, so it can never be
/// reassigned to something other than what it was built with.
pub struct AnonymousEvent {
    payload: Box<dyn std::any::Any + Send + Sync>,
    description: String,
}

impl AnonymousEvent {
    #[must_use]
    pub fn new(description: impl Into<String>, payload: Box<dyn std::any::Any + Send + Sync>) -> Self {
        Self {
            payload,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn payload(&self) -> &(dyn std::any::Any + Send + Sync) {
        self.payload.as_ref()
    }

    /// Downcast and take ownership of the payload, consuming the Arc's
    /// contents if this is the last reference.
    pub fn downcast<T: 'static>(self: Arc<Self>) -> Result<Box<T>, Arc<Self>> {
        match Arc::try_unwrap(self) {
            Ok(inner) => inner.payload.downcast::<T>().map_err(|payload| {
                Arc::new(Self {
                    payload,
                    description: String::new(),
                })
            }),
            Err(arc) => Err(arc),
        }
    }
}

impl fmt::Debug for AnonymousEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymousEvent")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_event_matches_multiple_tags() {
        let ev = DetailedEvent::new(
            "disk full",
            [
                (codes::FILE, codes::FILE_NO_SPACE),
                (codes::STREAM, codes::STREAM_RESOURCE_ERROR),
            ],
        );
        assert!(ev.matches(codes::FILE, codes::FILE_NO_SPACE));
        assert!(ev.matches(codes::STREAM, codes::STREAM_RESOURCE_ERROR));
        assert!(!ev.matches(codes::STREAM, codes::STREAM_DENIED));
    }

    #[test]
    fn segment_request_to_end() {
        let r = SegmentRequest::to_end();
        assert!(r.is_to_end());
        assert!(!SegmentRequest { length: 4 }.is_to_end());
    }

    #[test]
    fn anonymous_event_payload_is_set_once() {
        let ev = Arc::new(AnonymousEvent::new("new connection", Box::new(42i32)));
        assert_eq!(ev.description(), "new connection");
        let boxed = ev.downcast::<i32>().unwrap();
        assert_eq!(*boxed, 42);
    }
}
