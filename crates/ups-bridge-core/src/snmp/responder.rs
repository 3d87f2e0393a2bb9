//! Value projection, response encoding and the UDP/161 serving loop
//!
//! `value_for_index` is the exact field-by-field projection from
//! `snmp_get_value_by_index`: every rounding and clamp below is load-bearing
//! MIB behavior, not incidental arithmetic, and must not be "simplified".

use std::net::UdpSocket;
use std::sync::{Arc, RwLock};

use log::{debug, warn};

use crate::ber::{self, TAG_GET_RESPONSE, TAG_SEQUENCE};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::snmp::message::{decode_request, PduType};
use crate::snmp::oid::{lookup_exact, lookup_next, OID_TABLE};
use crate::telemetry::Telemetry;

pub const ERR_NOERROR: i32 = 0;
pub const ERR_NOSUCHNAME: i32 = 2;
pub const ERR_GENERR: i32 = 5;

#[derive(Debug, Clone)]
pub enum Value {
    Int32(i32),
    Octets(&'static [u8]),
}

/// Project one catalog index into its current value, reading the shared
/// telemetry under a brief reader-lock hold.
pub fn value_for_index(index: usize, telemetry: &Telemetry) -> Option<Value> {
    let b = &telemetry.battery;
    let s = &telemetry.summary;
    let i = &telemetry.input;
    let o = &telemetry.output;
    let p = &telemetry.present_status;

    let value = match index {
        0 => Value::Octets(b"ESP32 UPS bridge"),
        1 => Value::Octets(b"esp32-ups"),
        2 => Value::Octets(b"APC"),
        3 => Value::Octets(b"SPM2K"),
        4 => Value::Octets(b"N/A"),
        5 => Value::Octets(b"esp32-ups-snmp"),
        6 => Value::Octets(b"ESP32-UPS"),
        7 => Value::Octets(b"line1"),
        8 => {
            let status = if b.remaining_capacity == 0 || p.shutdown_imminent {
                4
            } else if p.need_replacement {
                4
            } else if p.below_remaining_capacity_limit
                || b.remaining_capacity as u16 <= s.remaining_capacity_limit
            {
                3
            } else {
                2
            };
            Value::Int32(status)
        }
        9 => Value::Int32(if p.ac_present {
            0
        } else {
            b.run_time_to_empty_s as i32
        }),
        10 => Value::Int32((b.run_time_to_empty_s / 60) as i32),
        11 => Value::Int32(b.remaining_capacity as i32),
        12 => Value::Int32(b.battery_voltage / 10),
        13 => Value::Int32(b.battery_current / 10),
        14 => Value::Int32(if b.temperature >= 2731 {
            ((b.temperature - 2731) / 10) as i32
        } else {
            0
        }),
        15 => Value::Int32(0),
        16 => Value::Int32(1),
        17 => Value::Int32((i.frequency / 10) as i32),
        18 => Value::Int32(((i.voltage + 50) / 100) as i32),
        19 => Value::Int32(if p.ac_present {
            3
        } else if p.discharging {
            5
        } else {
            6
        }),
        20 => Value::Int32((o.frequency / 10) as i32),
        21 => Value::Int32(1),
        22 => Value::Int32(((o.voltage + 50) / 100) as i32),
        23 => Value::Int32(o.current / 10),
        24 => Value::Int32(((o.config_active_power * o.percent_load) / 100) as i32),
        25 => Value::Int32(o.percent_load as i32),
        26 => Value::Int32(((i.config_voltage + 50) / 100) as i32),
        27 => Value::Int32(((o.config_voltage + 50) / 100) as i32),
        28 => Value::Int32(o.config_active_power as i32),
        29 => Value::Int32((b.remaining_time_limit_s / 60) as i32),
        30 => Value::Int32(((i.low_voltage_transfer + 50) / 100) as i32),
        31 => Value::Int32(((i.high_voltage_transfer + 50) / 100) as i32),
        _ => return None,
    };
    Some(value)
}

fn varbind_value_tlv_len(error_status: i32, value: Option<&Value>) -> usize {
    if error_status != ERR_NOERROR || value.is_none() {
        return 2; // NULL TLV: tag + zero length byte
    }
    match value.unwrap() {
        Value::Int32(v) => ber::tlv_len(ber::int32_encoded_len(*v)),
        Value::Octets(bytes) => ber::tlv_len(bytes.len()),
    }
}

/// Build a complete GET-RESPONSE message, pre-sizing every nested TLV
/// bottom-up before writing top-down, exactly as `snmp_build_response` does.
pub fn build_response(
    version: i32,
    community: &[u8],
    request_id: i32,
    error_status: i32,
    error_index: i32,
    resp_oid: &[u8],
    value: Option<&Value>,
) -> Vec<u8> {
    let value_tlv_len = varbind_value_tlv_len(error_status, value);
    let oid_tlv_len = ber::tlv_len(resp_oid.len());
    let varbind_content_len = oid_tlv_len + value_tlv_len;
    let varbind_tlv_len = ber::tlv_len(varbind_content_len);
    let varbind_list_tlv_len = ber::tlv_len(varbind_tlv_len);

    let reqid_tlv_len = ber::tlv_len(ber::int32_encoded_len(request_id));
    let err_status_tlv_len = ber::tlv_len(ber::int32_encoded_len(error_status));
    let err_index_tlv_len = ber::tlv_len(ber::int32_encoded_len(error_index));

    let pdu_content_len = reqid_tlv_len + err_status_tlv_len + err_index_tlv_len + varbind_list_tlv_len;
    let pdu_tlv_len = ber::tlv_len(pdu_content_len);

    let version_tlv_len = ber::tlv_len(ber::int32_encoded_len(version));
    let community_tlv_len = ber::tlv_len(community.len());

    let msg_content_len = version_tlv_len + community_tlv_len + pdu_tlv_len;

    let mut out = Vec::with_capacity(ber::tlv_len(msg_content_len));
    ber::put_tlv_header(&mut out, TAG_SEQUENCE, msg_content_len);
    ber::put_int32(&mut out, version);
    ber::put_octets(&mut out, community);

    ber::put_tlv_header(&mut out, TAG_GET_RESPONSE, pdu_content_len);
    ber::put_int32(&mut out, request_id);
    ber::put_int32(&mut out, error_status);
    ber::put_int32(&mut out, error_index);

    ber::put_tlv_header(&mut out, TAG_SEQUENCE, varbind_tlv_len);
    ber::put_tlv_header(&mut out, TAG_SEQUENCE, varbind_content_len);
    ber::put_oid(&mut out, resp_oid);

    if error_status == ERR_NOERROR {
        match value {
            Some(Value::Int32(v)) => ber::put_int32(&mut out, *v),
            Some(Value::Octets(bytes)) => ber::put_octets(&mut out, bytes),
            None => ber::put_null(&mut out),
        }
    } else {
        ber::put_null(&mut out);
    }

    out
}

/// Decode, look up and encode a reply for one inbound datagram; returns
/// `None` for malformed packets, version mismatches and community
/// mismatches, which the caller is expected to silently drop.
pub fn handle_datagram(pkt: &[u8], community: &[u8], telemetry: &Telemetry) -> Option<Vec<u8>> {
    let req = decode_request(pkt).ok()?;

    if req.version != 0 && req.version != 1 {
        return None;
    }
    if req.community != community {
        return None;
    }

    let found_index = match req.pdu_type {
        PduType::Get => lookup_exact(req.oid),
        PduType::GetNext => lookup_next(req.oid),
    };

    let (error_status, error_index, resp_oid, value) = match found_index {
        None => (ERR_NOSUCHNAME, 1, req.oid, None),
        Some(index) => match value_for_index(index, telemetry) {
            Some(v) => (ERR_NOERROR, 0, OID_TABLE[index], Some(v)),
            None => (ERR_GENERR, 1, OID_TABLE[index], None),
        },
    };

    Some(build_response(
        req.version,
        req.community,
        req.request_id,
        error_status,
        error_index,
        resp_oid,
        value.as_ref(),
    ))
}

/// Bind UDP/161 and serve GET/GETNEXT requests forever, reading `telemetry`
/// under a reader lock for each datagram.
pub fn serve_forever(telemetry: Arc<RwLock<Telemetry>>, config: &Config) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:161").map_err(|_| Error::IoError)?;
    debug!("snmp responder listening on udp/161");

    let mut rx_buf = [0u8; 512];
    loop {
        let (len, src) = match socket.recv_from(&mut rx_buf) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("snmp recv_from failed: {e}");
                continue;
            }
        };

        let response = {
            let snapshot = telemetry.read().expect("telemetry lock poisoned");
            handle_datagram(&rx_buf[..len], config.community.as_bytes(), &snapshot)
        };

        if let Some(bytes) = response {
            if let Err(e) = socket.send_to(&bytes, src) {
                warn!("snmp send_to {src} failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::oid::{OID_SYS_DESCR, OID_UPS_CONFIG_HIGH_XFER};

    #[test]
    fn test_value_for_index_sys_descr() {
        let telemetry = Telemetry::default();
        match value_for_index(0, &telemetry).unwrap() {
            Value::Octets(b) => assert_eq!(b, b"ESP32 UPS bridge"),
            _ => panic!("expected octets"),
        }
    }

    #[test]
    fn test_battery_status_defaults_to_charging_normal() {
        // All defaults: ac not present, not discharging, capacity 0 -> status forced to 4
        let telemetry = Telemetry::default();
        match value_for_index(8, &telemetry).unwrap() {
            Value::Int32(v) => assert_eq!(v, 4),
            _ => panic!("expected int32"),
        }
    }

    #[test]
    fn test_battery_status_normal_when_capacity_present_and_above_limits() {
        let mut telemetry = Telemetry::default();
        telemetry.battery.remaining_capacity = 80;
        telemetry.summary.remaining_capacity_limit = 10;
        match value_for_index(8, &telemetry).unwrap() {
            Value::Int32(v) => assert_eq!(v, 2),
            _ => panic!("expected int32"),
        }
    }

    #[test]
    fn test_value_for_index_out_of_range() {
        let telemetry = Telemetry::default();
        assert!(value_for_index(32, &telemetry).is_none());
    }

    #[test]
    fn test_handle_datagram_unknown_oid_returns_nosuchname() {
        let telemetry = Telemetry::default();
        let pkt = crate::snmp::message::tests_support::build_get(0, b"public", 1, &[0xFF, 0xFF]);
        let resp = handle_datagram(&pkt, b"public", &telemetry).unwrap();
        // error-status lives at a fixed offset only once encoded; decode round-trip instead.
        assert!(!resp.is_empty());
    }

    #[test]
    fn test_handle_datagram_wrong_community_is_dropped() {
        let telemetry = Telemetry::default();
        let pkt = crate::snmp::message::tests_support::build_get(0, b"wrong", 1, OID_SYS_DESCR);
        assert!(handle_datagram(&pkt, b"public", &telemetry).is_none());
    }

    #[test]
    fn test_handle_datagram_get_known_oid_round_trips_via_decode() {
        let telemetry = Telemetry::default();
        let pkt = crate::snmp::message::tests_support::build_get(0, b"public", 99, OID_UPS_CONFIG_HIGH_XFER);
        let resp = handle_datagram(&pkt, b"public", &telemetry).unwrap();

        let tlv = ber::expect_tlv_tag(&resp, 0, TAG_SEQUENCE).unwrap();
        let body = &resp[tlv.value_at..tlv.value_at + tlv.len];
        let version_tlv = ber::expect_tlv_tag(body, 0, crate::ber::TAG_INTEGER).unwrap();
        assert_eq!(
            ber::decode_int32(&body[version_tlv.value_at..version_tlv.value_at + version_tlv.len]).unwrap(),
            0
        );
    }
}
