use crate::error::TransportError;

use log::{debug, trace};
use pnet::packet::Packet;
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::TransportChannelType::Layer4;
use pnet::transport::TransportProtocol::Ipv4;
use pnet::transport::{icmp_packet_iter, transport_channel, TransportReceiver, TransportSender};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

const RECV_BUFFER_SIZE: usize = 1500;

/// Shortest wait handed to the socket. pnet turns the wait into a
/// microsecond `SO_RCVTIMEO`, where zero means block forever.
pub const MIN_WAIT: Duration = Duration::from_micros(1);

/// Send/receive half of a raw ICMP endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Writes one ICMP message, returning the number of bytes written.
    fn send(&mut self, request: &[u8], target: Ipv4Addr) -> Result<usize, TransportError>;

    /// Waits up to `timeout` for the next ICMP message.
    ///
    /// Returns `None` when the deadline passes without a datagram.
    fn receive(&mut self, timeout: Duration) -> Result<Option<(Vec<u8>, Ipv4Addr)>, TransportError>;
}

/// Raw IPv4 ICMP socket pair. Both sockets close when this is dropped.
pub struct IcmpTransport {
    sender: TransportSender,
    receiver: TransportReceiver,
}

impl IcmpTransport {

    pub fn open() -> Result<IcmpTransport, TransportError> {
        let (sender, receiver) = transport_channel(RECV_BUFFER_SIZE, Layer4(Ipv4(IpNextHeaderProtocols::Icmp)))?;
        debug!("opened raw ICMP transport channel");
        Ok(IcmpTransport { sender, receiver })
    }

}

impl Transport for IcmpTransport {

    fn send(&mut self, request: &[u8], target: Ipv4Addr) -> Result<usize, TransportError> {
        let icmp_packet = IcmpPacket::new(request).ok_or(TransportError::InvalidRequest { len: request.len() })?;
        self.sender.send_to(icmp_packet, IpAddr::V4(target)).map_err(TransportError::Send)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<(Vec<u8>, Ipv4Addr)>, TransportError> {
        if timeout < MIN_WAIT {
            return Ok(None);
        }
        let mut iter = icmp_packet_iter(&mut self.receiver);
        match iter.next_with_timeout(timeout) {
            Ok(Some((icmp_packet, IpAddr::V4(source)))) => Ok(Some((icmp_packet.packet().to_vec(), source))),
            Ok(Some((_, IpAddr::V6(source)))) => Err(TransportError::Receive(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected IPv6 source {}", source),
            ))),
            Ok(None) => Ok(None),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(TransportError::Receive(e)),
        }
    }

}

/// A reply accepted by [`exchange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub reply: Vec<u8>,
    pub elapsed: Duration,
    pub peer: Ipv4Addr,
}

#[derive(Debug)]
pub enum ExchangeError {
    Timeout,
    Transport(TransportError),
}

impl From<TransportError> for ExchangeError {
    fn from(e: TransportError) -> Self {
        ExchangeError::Transport(e)
    }
}

/// Sends `request` to `target` and waits up to `timeout` for a datagram that
/// `accept` approves of.
///
/// Datagrams rejected by `accept` are dropped and the wait continues with
/// whatever time is left, as is a read interrupted by a signal. A short write
/// is an error and is not retried.
pub fn exchange<T, F>(
    transport: &mut T,
    target: Ipv4Addr,
    request: &[u8],
    timeout: Duration,
    mut accept: F,
) -> Result<Exchange, ExchangeError>
where
    T: Transport + ?Sized,
    F: FnMut(&[u8]) -> bool,
{
    let start = Instant::now();
    let written = transport.send(request, target)?;
    if written != request.len() {
        return Err(TransportError::PartialWrite { written, expected: request.len() }.into());
    }

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining < MIN_WAIT {
            return Err(ExchangeError::Timeout);
        }

        let received = match transport.receive(remaining) {
            Err(TransportError::Receive(e)) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("receive interrupted, waiting out the remaining {:?}", remaining);
                continue;
            }
            other => other?,
        };

        match received {
            Some((reply, peer)) => {
                let elapsed = start.elapsed();
                if accept(&reply) {
                    return Ok(Exchange { reply, elapsed, peer });
                }
                trace!("skipping {} byte datagram from {}", reply.len(), peer);
            }
            None => return Err(ExchangeError::Timeout),
        }
    }
}
