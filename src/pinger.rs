use crate::dns_resolver;
use crate::messages::{EchoSuccess, Mismatch, ProbeOutcome};
use crate::packet;
use crate::parser::{self, IcmpKind};
use crate::transport::{self, ExchangeError, Transport};

use log::{debug, warn};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One probe of a host, as seen by the session loop.
#[cfg_attr(test, mockall::automock)]
pub trait Probe {
    fn probe(&mut self, hostname: &str) -> ProbeOutcome;
}

/// Runs single Echo Request/Reply cycles over a transport it owns.
pub struct Pinger<T: Transport> {
    transport: T,
    identifier: u16,
    sequence: u16,
    timeout: Duration,
}

impl<T: Transport> Pinger<T> {

    /// The identifier is the low 16 bits of the process id, so concurrent
    /// instances can tell their replies apart.
    pub fn new(transport: T, timeout: Duration) -> Pinger<T> {
        let identifier = (std::process::id() & 0xffff) as u16;
        Pinger { transport, identifier, sequence: 0, timeout }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Resolves `hostname`, sends one Echo Request and classifies what comes back.
    pub fn run_once(&mut self, hostname: &str) -> ProbeOutcome {
        let target = match dns_resolver::resolve(hostname) {
            Ok(target) => target,
            Err(error) => return ProbeOutcome::ResolutionFailure { host: hostname.to_string(), error },
        };

        self.sequence = self.sequence.wrapping_add(1);
        let (identifier, sequence) = (self.identifier, self.sequence);
        let request = packet::build_echo_request(identifier, sequence, &[]);
        debug!("echo request id={} seq={} to {}", identifier, sequence, target);

        let accept = |raw: &[u8]| match parser::parse_message(raw) {
            Ok(msg) => msg.is_reply_to(identifier, sequence),
            Err(_) => true,
        };

        let exchange = match transport::exchange(&mut self.transport, target.address, &request, self.timeout, accept) {
            Ok(exchange) => exchange,
            Err(ExchangeError::Timeout) => return ProbeOutcome::Timeout { target },
            Err(ExchangeError::Transport(error)) => {
                warn!("probe of {} failed: {}", target, error);
                return ProbeOutcome::TransportFailure { target, error };
            }
        };

        let peer = exchange.peer;
        let msg = match parser::parse_message(&exchange.reply) {
            Ok(msg) => msg,
            Err(error) => return ProbeOutcome::ProtocolMismatch { target, mismatch: Mismatch::Malformed { peer, error } },
        };

        debug!(
            "{:?} from {} checksum=0x{:04x} payload={} bytes",
            msg.kind, peer, msg.checksum, msg.payload_len()
        );
        if msg.kind != IcmpKind::EchoReply {
            let mismatch = Mismatch::UnexpectedType { received_type: msg.kind.type_code(), code: msg.code, peer };
            return ProbeOutcome::ProtocolMismatch { target, mismatch };
        }

        ProbeOutcome::Success(EchoSuccess {
            loss_percent: loss_percent(exchange.reply.len(), request.len()),
            bytes: exchange.reply.len(),
            round_trip_time: exchange.elapsed,
            sequence,
            peer,
            target,
        })
    }

}

impl<T: Transport> Probe for Pinger<T> {
    fn probe(&mut self, hostname: &str) -> ProbeOutcome {
        self.run_once(hostname)
    }
}

/// Loss metric of a single exchange: how much of the request's size came back.
///
/// This is a byte ratio, not dropped-packet loss. A reply larger than the
/// request yields a negative value.
pub fn loss_percent(received_bytes: usize, sent_bytes: usize) -> f64 {
    if sent_bytes == 0 {
        return 0.0;
    }
    let ratio = received_bytes as f64 / sent_bytes as f64;
    if ratio == 1.0 {
        0.0
    } else {
        (1.0 - ratio) * 100.0
    }
}
