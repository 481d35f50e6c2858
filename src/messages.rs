use crate::dns_resolver::Target;
use crate::error::{ParseError, ResolveError, TransportError};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Sent from the signal handler to the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoSuccess {
    pub target: Target,
    pub peer: Ipv4Addr,
    pub sequence: u16,
    pub bytes: usize,
    pub round_trip_time: Duration,
    /// Byte ratio of reply to request for this single exchange, not a count
    /// of dropped packets.
    pub loss_percent: f64,
}

/// Why a received message was not an answer we could use.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    Malformed { peer: Ipv4Addr, error: ParseError },
    UnexpectedType { received_type: u8, code: u8, peer: Ipv4Addr },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Malformed { peer, error } => write!(f, "malformed message from {}: {}", peer, error),
            Mismatch::UnexpectedType { received_type, code, peer } => {
                write!(f, "{} from {} (type {}, code {})", type_name(*received_type), peer, received_type, code)
            }
        }
    }
}

fn type_name(icmp_type: u8) -> &'static str {
    match icmp_type {
        3 => "Destination Unreachable",
        5 => "Redirect",
        8 => "Echo Request",
        11 => "Time Exceeded",
        12 => "Parameter Problem",
        _ => "ICMP message",
    }
}

/// Result of one probe cycle.
#[derive(Debug)]
pub enum ProbeOutcome {
    Success(EchoSuccess),
    Timeout { target: Target },
    ResolutionFailure { host: String, error: ResolveError },
    TransportFailure { target: Target, error: TransportError },
    ProtocolMismatch { target: Target, mismatch: Mismatch },
}

impl ProbeOutcome {
    /// The ICMP type of an unexpected or unknown reply, if that is what this
    /// outcome is.
    #[cfg(test)]
    pub fn received_type(&self) -> Option<u8> {
        let ProbeOutcome::ProtocolMismatch { mismatch, .. } = self else {
            return None;
        };
        match mismatch {
            Mismatch::UnexpectedType { received_type, .. } => Some(*received_type),
            Mismatch::Malformed { error: ParseError::UnknownType { icmp_type, .. }, .. }
            | Mismatch::Malformed { error: ParseError::UnknownCode { icmp_type, .. }, .. } => Some(*icmp_type),
            Mismatch::Malformed { .. } => None,
        }
    }
}
