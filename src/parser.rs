use crate::error::ParseError;
use crate::packet::{self, ICMP_HEADER_LEN};

use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::EchoRequestPacket;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;

/// ICMP message kinds understood by the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    EchoReply,
    DestinationUnreachable,
    Redirect,
    EchoRequest,
    TimeExceeded,
    ParameterProblem,
}

impl IcmpKind {
    fn from_type(icmp_type: u8) -> Option<IcmpKind> {
        match icmp_type {
            0 => Some(IcmpKind::EchoReply),
            3 => Some(IcmpKind::DestinationUnreachable),
            5 => Some(IcmpKind::Redirect),
            8 => Some(IcmpKind::EchoRequest),
            11 => Some(IcmpKind::TimeExceeded),
            12 => Some(IcmpKind::ParameterProblem),
            _ => None,
        }
    }

    pub fn type_code(self) -> u8 {
        match self {
            IcmpKind::EchoReply => 0,
            IcmpKind::DestinationUnreachable => 3,
            IcmpKind::Redirect => 5,
            IcmpKind::EchoRequest => 8,
            IcmpKind::TimeExceeded => 11,
            IcmpKind::ParameterProblem => 12,
        }
    }

    fn max_code(self) -> u8 {
        match self {
            IcmpKind::EchoReply | IcmpKind::EchoRequest => 0,
            IcmpKind::DestinationUnreachable => 15,
            IcmpKind::Redirect => 3,
            IcmpKind::TimeExceeded => 1,
            IcmpKind::ParameterProblem => 2,
        }
    }

    /// Error messages quote the header of the datagram that caused them.
    pub fn is_error(self) -> bool {
        !matches!(self, IcmpKind::EchoReply | IcmpKind::EchoRequest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoIds {
    pub identifier: u16,
    pub sequence: u16,
}

/// Borrowed view of a received ICMP message.
///
/// For echo messages `echo` holds the message's own identifier and sequence.
/// For error messages it holds those of the quoted Echo Request, if the quoted
/// datagram was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage<'a> {
    pub kind: IcmpKind,
    pub code: u8,
    pub checksum: u16,
    pub echo: Option<EchoIds>,
    pub payload: &'a [u8],
}

impl DecodedMessage<'_> {
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Whether this message answers the Echo Request `identifier`/`sequence`.
    ///
    /// Error messages only need to quote our identifier, the sequence is not
    /// always preserved by routers.
    pub fn is_reply_to(&self, identifier: u16, sequence: u16) -> bool {
        match (self.kind, self.echo) {
            (IcmpKind::EchoReply, Some(ids)) => ids.identifier == identifier && ids.sequence == sequence,
            (IcmpKind::EchoRequest, _) => false,
            (kind, Some(ids)) if kind.is_error() => ids.identifier == identifier,
            _ => false,
        }
    }
}

/// Decodes an ICMP message (IP header already stripped).
pub fn parse_message(raw: &[u8]) -> Result<DecodedMessage<'_>, ParseError> {
    if raw.len() < ICMP_HEADER_LEN {
        return Err(ParseError::Truncated { len: raw.len() });
    }
    let icmp_packet = IcmpPacket::new(raw).ok_or(ParseError::Truncated { len: raw.len() })?;
    let icmp_type = icmp_packet.get_icmp_type().0;
    let code = icmp_packet.get_icmp_code().0;

    let kind = IcmpKind::from_type(icmp_type).ok_or(ParseError::UnknownType { icmp_type, code })?;
    if code > kind.max_code() {
        return Err(ParseError::UnknownCode { icmp_type, code });
    }

    let checksum = icmp_packet.get_checksum();
    if !packet::verify_checksum(raw) {
        return Err(ParseError::Checksum { expected: packet::internet_checksum(raw), actual: packet::stored_checksum(raw) });
    }

    let (echo, payload) = match kind {
        IcmpKind::EchoReply | IcmpKind::EchoRequest => (Some(echo_ids(raw)), &raw[ICMP_HEADER_LEN..]),
        _ => (quoted_echo_ids(&raw[ICMP_HEADER_LEN..]), &raw[ICMP_HEADER_LEN..]),
    };

    Ok(DecodedMessage { kind, code, checksum, echo, payload })
}

fn echo_ids(raw: &[u8]) -> EchoIds {
    // echo request and reply share the identifier/sequence layout
    match EchoReplyPacket::new(raw) {
        Some(erp) => EchoIds { identifier: erp.get_identifier(), sequence: erp.get_sequence_number() },
        None => EchoIds { identifier: 0, sequence: 0 },
    }
}

/// Pulls the identifier and sequence out of the original datagram quoted by an
/// ICMP error, when that datagram was an Echo Request.
fn quoted_echo_ids(quoted: &[u8]) -> Option<EchoIds> {
    let original_ip = Ipv4Packet::new(quoted)?;
    if original_ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let header_len = original_ip.get_header_length() as usize * 4;
    if header_len < Ipv4Packet::minimum_packet_size() || quoted.len() < header_len + ICMP_HEADER_LEN {
        return None;
    }

    let original_icmp = IcmpPacket::new(&quoted[header_len..])?;
    if original_icmp.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }
    let original_echo_request = EchoRequestPacket::new(original_icmp.packet())?;
    Some(EchoIds {
        identifier: original_echo_request.get_identifier(),
        sequence: original_echo_request.get_sequence_number(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::packet::build_echo_request;

    /// Builds an ICMP message with a valid checksum.
    pub(crate) fn icmp_message(icmp_type: u8, code: u8, rest: [u8; 4], body: &[u8]) -> Vec<u8> {
        let mut message = vec![icmp_type, code, 0, 0];
        message.extend_from_slice(&rest);
        message.extend_from_slice(body);
        let checksum = packet::internet_checksum(&message);
        message[2..4].copy_from_slice(&checksum.to_be_bytes());
        message
    }

    pub(crate) fn echo_reply(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
        let mut rest = [0u8; 4];
        rest[..2].copy_from_slice(&identifier.to_be_bytes());
        rest[2..].copy_from_slice(&sequence.to_be_bytes());
        icmp_message(0, 0, rest, payload)
    }

    /// A Destination Unreachable quoting our echo request.
    pub(crate) fn unreachable_for(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut quoted = vec![0u8; 20];
        quoted[0] = 0x45; // version 4, IHL 5
        quoted[8] = 64;
        quoted[9] = 1; // ICMP
        quoted[12..16].copy_from_slice(&[10, 0, 0, 1]);
        quoted[16..20].copy_from_slice(&[10, 0, 0, 2]);
        quoted.extend_from_slice(&build_echo_request(identifier, sequence, &[]));
        icmp_message(3, 1, [0; 4], &quoted)
    }

    #[test]
    fn round_trip_echo_request() {
        let payload = b"probe payload";
        let bytes = build_echo_request(0x4242, 99, payload);
        let msg = parse_message(&bytes).unwrap();
        assert_eq!(msg.kind, IcmpKind::EchoRequest);
        assert_eq!(msg.code, 0);
        assert_eq!(msg.echo, Some(EchoIds { identifier: 0x4242, sequence: 99 }));
        assert_eq!(msg.payload, payload);
    }

    #[test]
    fn echo_reply_fields() {
        let bytes = echo_reply(7, 3, &[1, 2, 3]);
        let msg = parse_message(&bytes).unwrap();
        assert_eq!(msg.kind, IcmpKind::EchoReply);
        assert_eq!(msg.payload_len(), 3);
        assert!(msg.is_reply_to(7, 3));
        assert!(!msg.is_reply_to(7, 4));
        assert!(!msg.is_reply_to(8, 3));
    }

    #[test]
    fn own_request_is_not_a_reply() {
        let bytes = build_echo_request(7, 3, &[]);
        assert!(!parse_message(&bytes).unwrap().is_reply_to(7, 3));
    }

    #[test]
    fn unreachable_quotes_original_request() {
        let bytes = unreachable_for(0x0102, 5);
        let msg = parse_message(&bytes).unwrap();
        assert_eq!(msg.kind, IcmpKind::DestinationUnreachable);
        assert_eq!(msg.echo, Some(EchoIds { identifier: 0x0102, sequence: 5 }));
        assert!(msg.is_reply_to(0x0102, 6));
        assert!(!msg.is_reply_to(0x0103, 5));
    }

    #[test]
    fn time_exceeded_without_quote() {
        let bytes = icmp_message(11, 0, [0; 4], &[]);
        let msg = parse_message(&bytes).unwrap();
        assert_eq!(msg.kind, IcmpKind::TimeExceeded);
        assert_eq!(msg.echo, None);
        assert!(!msg.is_reply_to(0, 0));
    }

    #[test]
    fn short_input_is_truncated() {
        assert_eq!(parse_message(&[0, 0, 0]), Err(ParseError::Truncated { len: 3 }));
    }

    #[test]
    fn unknown_type_is_reported() {
        let bytes = icmp_message(42, 0, [0; 4], &[]);
        assert_eq!(parse_message(&bytes), Err(ParseError::UnknownType { icmp_type: 42, code: 0 }));
    }

    #[test]
    fn unknown_code_is_reported() {
        let bytes = icmp_message(0, 9, [0; 4], &[]);
        assert_eq!(parse_message(&bytes), Err(ParseError::UnknownCode { icmp_type: 0, code: 9 }));
    }

    #[test]
    fn corrupted_message_fails_checksum() {
        let mut bytes = echo_reply(1, 1, b"data");
        bytes[9] ^= 0x10;
        assert!(matches!(parse_message(&bytes), Err(ParseError::Checksum { .. })));
    }

    #[test]
    fn checksum_error_reports_both_values() {
        let mut bytes = echo_reply(1, 1, &[]);
        let stored = u16::from_be_bytes([bytes[2], bytes[3]]);
        bytes[2..4].copy_from_slice(&(stored ^ 0x0100).to_be_bytes());
        assert_eq!(
            parse_message(&bytes),
            Err(ParseError::Checksum { expected: stored, actual: stored ^ 0x0100 })
        );
    }
}
