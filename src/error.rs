use std::fmt;
use std::io;

/// Failure to turn user input into an IPv4 address.
#[derive(Debug)]
pub enum ResolveError {
    Empty,
    Lookup { host: String, source: io::Error },
    NoIpv4Address { host: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Empty => write!(f, "empty host name"),
            ResolveError::Lookup { host, source } => write!(f, "lookup of {} failed: {}", host, source),
            ResolveError::NoIpv4Address { host } => write!(f, "{} has no IPv4 address", host),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Lookup { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures of the raw ICMP socket.
#[derive(Debug)]
pub enum TransportError {
    /// Raw sockets are usually reserved for privileged processes.
    PermissionDenied(io::Error),
    Open(io::Error),
    InvalidRequest { len: usize },
    Send(io::Error),
    PartialWrite { written: usize, expected: usize },
    Receive(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::PermissionDenied(e) => write!(
                f,
                "permission denied opening raw ICMP socket ({}): run as root or grant CAP_NET_RAW",
                e
            ),
            TransportError::Open(e) => write!(f, "unable to open ICMP socket: {}", e),
            TransportError::InvalidRequest { len } => write!(f, "request of {} bytes is not an ICMP message", len),
            TransportError::Send(e) => write!(f, "send failed: {}", e),
            TransportError::PartialWrite { written, expected } => {
                write!(f, "partial write: sent {} of {} bytes", written, expected)
            }
            TransportError::Receive(e) => write!(f, "receive failed: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::PermissionDenied(e)
            | TransportError::Open(e)
            | TransportError::Send(e)
            | TransportError::Receive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => TransportError::PermissionDenied(e),
            _ => TransportError::Open(e),
        }
    }
}

/// Received bytes that do not form a usable IPv4 ICMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Truncated { len: usize },
    UnknownType { icmp_type: u8, code: u8 },
    UnknownCode { icmp_type: u8, code: u8 },
    Checksum { expected: u16, actual: u16 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Truncated { len } => write!(f, "message too short ({} bytes)", len),
            ParseError::UnknownType { icmp_type, code } => {
                write!(f, "unknown ICMP type {} (code {})", icmp_type, code)
            }
            ParseError::UnknownCode { icmp_type, code } => {
                write!(f, "unknown code {} for ICMP type {}", code, icmp_type)
            }
            ParseError::Checksum { expected, actual } => {
                write!(f, "bad checksum 0x{:04x}, expected 0x{:04x}", actual, expected)
            }
        }
    }
}

impl std::error::Error for ParseError {}
