use pnet::packet::Packet;
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{IcmpCode, IcmpTypes};
use pnet::packet::util;

/// Length of the ICMP header shared by every message we send or accept.
pub const ICMP_HEADER_LEN: usize = 8;

/// Encodes an Echo Request with a valid checksum.
pub fn build_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; EchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut echo_packet = MutableEchoRequestPacket::new(&mut buf)
        .expect("buffer is sized for an echo request");

    echo_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_packet.set_icmp_code(IcmpCode::new(0));
    echo_packet.set_identifier(identifier);
    echo_packet.set_sequence_number(sequence);
    echo_packet.set_payload(payload);

    let echo_checksum = internet_checksum(echo_packet.packet());
    echo_packet.set_checksum(echo_checksum);
    buf
}

/// The Internet checksum of an ICMP message, computed as if its checksum
/// field were zero.
pub fn internet_checksum(message: &[u8]) -> u16 {
    // word 1 holds the checksum field
    util::checksum(message, 1)
}

/// Checks the stored checksum against the message contents.
pub fn verify_checksum(message: &[u8]) -> bool {
    if message.len() < 4 {
        return false;
    }
    stored_checksum(message) == internet_checksum(message)
}

pub(crate) fn stored_checksum(message: &[u8]) -> u16 {
    u16::from_be_bytes([message[2], message[3]])
}
