//! SNMPv1/v2c request decoding

use crate::ber::{self, TAG_GET_NEXT_REQUEST, TAG_GET_REQUEST, TAG_INTEGER, TAG_OBJECT_ID, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    Get,
    GetNext,
}

/// A decoded request: version, community and request-id are carried only to
/// be mirrored back into the response, per RFC 1157.
#[derive(Debug)]
pub struct Request<'a> {
    pub version: i32,
    pub community: &'a [u8],
    pub request_id: i32,
    pub pdu_type: PduType,
    pub oid: &'a [u8],
}

/// Parse one UDP datagram's worth of BER-encoded SNMP message.
///
/// Mirrors `snmp_decode_request`: sequence envelope, version, community,
/// PDU header, request-id/error-status/error-index triple, varbind list
/// with exactly one varbind, whose value is always expected to be NULL on
/// the wire (GET/GETNEXT requests never carry a value).
pub fn decode_request(pkt: &[u8]) -> Result<Request<'_>> {
    let msg = ber::expect_tlv_tag(pkt, 0, TAG_SEQUENCE)?;
    let msg_body = &pkt[msg.value_at..msg.value_at + msg.len];

    let version_tlv = ber::expect_tlv_tag(msg_body, 0, TAG_INTEGER)?;
    let version = ber::decode_int32(&msg_body[version_tlv.value_at..version_tlv.value_at + version_tlv.len])?;
    let mut pos = version_tlv.value_at + version_tlv.len;

    let community_tlv = ber::expect_tlv_tag(msg_body, pos, TAG_OCTET_STRING)?;
    let community = &msg_body[community_tlv.value_at..community_tlv.value_at + community_tlv.len];
    pos = community_tlv.value_at + community_tlv.len;

    let pdu_tag = *msg_body.get(pos).ok_or(Error::InvalidPdu)?;
    let pdu_type = match pdu_tag {
        TAG_GET_REQUEST => PduType::Get,
        TAG_GET_NEXT_REQUEST => PduType::GetNext,
        _ => return Err(Error::InvalidPdu),
    };
    pos += 1;
    let (pdu_len, len_bytes) = ber::read_len(msg_body, pos)?;
    pos += len_bytes;
    let pdu_end = pos + pdu_len;
    if pdu_end > msg_body.len() {
        return Err(Error::InvalidPdu);
    }

    let request_id_tlv = ber::expect_tlv_tag(msg_body, pos, TAG_INTEGER)?;
    let request_id =
        ber::decode_int32(&msg_body[request_id_tlv.value_at..request_id_tlv.value_at + request_id_tlv.len])?;
    pos = request_id_tlv.value_at + request_id_tlv.len;

    let error_status_tlv = ber::expect_tlv_tag(msg_body, pos, TAG_INTEGER)?;
    pos = error_status_tlv.value_at + error_status_tlv.len;

    let error_index_tlv = ber::expect_tlv_tag(msg_body, pos, TAG_INTEGER)?;
    pos = error_index_tlv.value_at + error_index_tlv.len;

    let vb_list_tlv = ber::expect_tlv_tag(msg_body, pos, TAG_SEQUENCE)?;
    let vb_list_body = &msg_body[vb_list_tlv.value_at..vb_list_tlv.value_at + vb_list_tlv.len];

    let vb_tlv = ber::expect_tlv_tag(vb_list_body, 0, TAG_SEQUENCE)?;
    let vb_body = &vb_list_body[vb_tlv.value_at..vb_tlv.value_at + vb_tlv.len];

    let oid_tlv = ber::expect_tlv_tag(vb_body, 0, TAG_OBJECT_ID)?;
    let oid = &vb_body[oid_tlv.value_at..oid_tlv.value_at + oid_tlv.len];

    Ok(Request {
        version,
        community,
        request_id,
        pdu_type,
        oid,
    })
}

/// Test-only packet builders shared with other modules' unit tests.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::tests::build_get_request;
    use crate::ber::TAG_GET_REQUEST;

    pub fn build_get(version: i32, community: &[u8], request_id: i32, oid: &[u8]) -> Vec<u8> {
        build_get_request(TAG_GET_REQUEST, version, community, request_id, oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::{put_int32, put_null, put_octets, put_oid, put_tlv_header};

    pub(super) fn build_get_request(pdu_tag: u8, version: i32, community: &[u8], request_id: i32, oid: &[u8]) -> Vec<u8> {
        let mut varbind = Vec::new();
        put_oid(&mut varbind, oid);
        put_null(&mut varbind);
        let mut varbind_tlv = Vec::new();
        put_tlv_header(&mut varbind_tlv, TAG_SEQUENCE, varbind.len());
        varbind_tlv.extend_from_slice(&varbind);

        let mut vb_list_tlv = Vec::new();
        put_tlv_header(&mut vb_list_tlv, TAG_SEQUENCE, varbind_tlv.len());
        vb_list_tlv.extend_from_slice(&varbind_tlv);

        let mut pdu_body = Vec::new();
        put_int32(&mut pdu_body, request_id);
        put_int32(&mut pdu_body, 0);
        put_int32(&mut pdu_body, 0);
        pdu_body.extend_from_slice(&vb_list_tlv);

        let mut pdu = Vec::new();
        put_tlv_header(&mut pdu, pdu_tag, pdu_body.len());
        pdu.extend_from_slice(&pdu_body);

        let mut msg_body = Vec::new();
        put_int32(&mut msg_body, version);
        put_octets(&mut msg_body, community);
        msg_body.extend_from_slice(&pdu);

        let mut msg = Vec::new();
        put_tlv_header(&mut msg, TAG_SEQUENCE, msg_body.len());
        msg.extend_from_slice(&msg_body);
        msg
    }

    #[test]
    fn test_decode_get_request() {
        let pkt = build_get_request(TAG_GET_REQUEST, 0, b"public", 42, crate::snmp::oid::OID_SYS_DESCR);
        let req = decode_request(&pkt).unwrap();
        assert_eq!(req.version, 0);
        assert_eq!(req.community, b"public");
        assert_eq!(req.request_id, 42);
        assert_eq!(req.pdu_type, PduType::Get);
        assert_eq!(req.oid, crate::snmp::oid::OID_SYS_DESCR);
    }

    #[test]
    fn test_decode_get_next_request() {
        let pkt = build_get_request(TAG_GET_NEXT_REQUEST, 1, b"public", 7, crate::snmp::oid::OID_SYS_NAME);
        let req = decode_request(&pkt).unwrap();
        assert_eq!(req.pdu_type, PduType::GetNext);
    }

    #[test]
    fn test_decode_rejects_truncated_packet() {
        let pkt = build_get_request(TAG_GET_REQUEST, 0, b"public", 1, crate::snmp::oid::OID_SYS_DESCR);
        assert!(decode_request(&pkt[..pkt.len() - 4]).is_err());
    }
}
