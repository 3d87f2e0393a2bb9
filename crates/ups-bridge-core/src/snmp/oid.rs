//! The fixed 32-entry OID catalog this agent answers for
//!
//! Subidentifier bytes are reproduced exactly (system group plus RFC 1628
//! UPS-MIB), so GET/GETNEXT behavior is bit-identical to the original agent.

pub const OID_SYS_DESCR: &[u8] = &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00];
pub const OID_SYS_NAME: &[u8] = &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x05, 0x00];

pub const OID_UPS_IDENT_MANUFACTURER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x01, 0x01, 0x00];
pub const OID_UPS_IDENT_MODEL: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x01, 0x02, 0x00];
pub const OID_UPS_IDENT_UPS_SW_VER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x01, 0x03, 0x00];
pub const OID_UPS_IDENT_AGENT_SW_VER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x01, 0x04, 0x00];
pub const OID_UPS_IDENT_NAME: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x01, 0x05, 0x00];
pub const OID_UPS_IDENT_ATTACHED_DEVICES: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x01, 0x06, 0x00];

pub const OID_UPS_BATTERY_STATUS: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x01, 0x00];
pub const OID_UPS_SECONDS_ON_BATTERY: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x02, 0x00];
pub const OID_UPS_EST_MINUTES_REMAINING: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x03, 0x00];
pub const OID_UPS_EST_CHARGE_REMAINING: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x04, 0x00];
pub const OID_UPS_BATTERY_VOLTAGE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x05, 0x00];
pub const OID_UPS_BATTERY_CURRENT: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x06, 0x00];
pub const OID_UPS_BATTERY_TEMPERATURE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x02, 0x07, 0x00];

pub const OID_UPS_INPUT_LINE_BADS: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x03, 0x01, 0x00];
pub const OID_UPS_INPUT_NUM_LINES: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x03, 0x02, 0x00];
pub const OID_UPS_INPUT_FREQUENCY: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x03, 0x03, 0x01, 0x02, 0x01];
pub const OID_UPS_INPUT_VOLTAGE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x03, 0x03, 0x01, 0x03, 0x01];

pub const OID_UPS_OUTPUT_SOURCE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x01, 0x00];
pub const OID_UPS_OUTPUT_FREQUENCY: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x02, 0x00];
pub const OID_UPS_OUTPUT_NUM_LINES: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x03, 0x00];
pub const OID_UPS_OUTPUT_VOLTAGE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x04, 0x01, 0x02, 0x01];
pub const OID_UPS_OUTPUT_CURRENT: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x04, 0x01, 0x03, 0x01];
pub const OID_UPS_OUTPUT_POWER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x04, 0x01, 0x04, 0x01];
pub const OID_UPS_OUTPUT_PERCENT_LOAD: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x04, 0x04, 0x01, 0x05, 0x01];

pub const OID_UPS_CONFIG_INPUT_VOLTAGE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x09, 0x01, 0x00];
pub const OID_UPS_CONFIG_OUTPUT_VOLTAGE: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x09, 0x03, 0x00];
pub const OID_UPS_CONFIG_OUTPUT_POWER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x09, 0x06, 0x00];
pub const OID_UPS_CONFIG_LOW_BATT_TIME: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x09, 0x07, 0x00];
pub const OID_UPS_CONFIG_LOW_XFER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x09, 0x09, 0x00];
pub const OID_UPS_CONFIG_HIGH_XFER: &[u8] =
    &[0x2B, 0x06, 0x01, 0x02, 0x01, 0x21, 0x01, 0x09, 0x0A, 0x00];

/// Catalog order matters: the index doubles as the value-projection
/// selector in [`crate::snmp::responder::value_for_index`] and as the walk
/// order for GETNEXT.
pub const OID_TABLE: [&[u8]; 32] = [
    OID_SYS_DESCR,
    OID_SYS_NAME,
    OID_UPS_IDENT_MANUFACTURER,
    OID_UPS_IDENT_MODEL,
    OID_UPS_IDENT_UPS_SW_VER,
    OID_UPS_IDENT_AGENT_SW_VER,
    OID_UPS_IDENT_NAME,
    OID_UPS_IDENT_ATTACHED_DEVICES,
    OID_UPS_BATTERY_STATUS,
    OID_UPS_SECONDS_ON_BATTERY,
    OID_UPS_EST_MINUTES_REMAINING,
    OID_UPS_EST_CHARGE_REMAINING,
    OID_UPS_BATTERY_VOLTAGE,
    OID_UPS_BATTERY_CURRENT,
    OID_UPS_BATTERY_TEMPERATURE,
    OID_UPS_INPUT_LINE_BADS,
    OID_UPS_INPUT_NUM_LINES,
    OID_UPS_INPUT_FREQUENCY,
    OID_UPS_INPUT_VOLTAGE,
    OID_UPS_OUTPUT_SOURCE,
    OID_UPS_OUTPUT_FREQUENCY,
    OID_UPS_OUTPUT_NUM_LINES,
    OID_UPS_OUTPUT_VOLTAGE,
    OID_UPS_OUTPUT_CURRENT,
    OID_UPS_OUTPUT_POWER,
    OID_UPS_OUTPUT_PERCENT_LOAD,
    OID_UPS_CONFIG_INPUT_VOLTAGE,
    OID_UPS_CONFIG_OUTPUT_VOLTAGE,
    OID_UPS_CONFIG_OUTPUT_POWER,
    OID_UPS_CONFIG_LOW_BATT_TIME,
    OID_UPS_CONFIG_LOW_XFER,
    OID_UPS_CONFIG_HIGH_XFER,
];

/// Lexicographic compare, shorter-common-prefix sorts first; matches the
/// ordering GETNEXT walks the catalog in.
pub fn oid_compare(lhs: &[u8], rhs: &[u8]) -> std::cmp::Ordering {
    let min_len = lhs.len().min(rhs.len());
    for i in 0..min_len {
        match lhs[i].cmp(&rhs[i]) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    lhs.len().cmp(&rhs.len())
}

/// Exact match lookup, used for GET.
pub fn lookup_exact(oid: &[u8]) -> Option<usize> {
    OID_TABLE.iter().position(|candidate| *candidate == oid)
}

/// First catalog entry strictly greater than `oid`, used for GETNEXT.
pub fn lookup_next(oid: &[u8]) -> Option<usize> {
    OID_TABLE
        .iter()
        .position(|candidate| oid_compare(candidate, oid) == std::cmp::Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_32_entries() {
        assert_eq!(OID_TABLE.len(), 32);
    }

    #[test]
    fn test_lookup_exact_finds_known_oid() {
        assert_eq!(lookup_exact(OID_SYS_DESCR), Some(0));
        assert_eq!(lookup_exact(OID_UPS_CONFIG_HIGH_XFER), Some(31));
        assert_eq!(lookup_exact(&[0xFF]), None);
    }

    #[test]
    fn test_lookup_next_walks_catalog_order() {
        assert_eq!(lookup_next(OID_SYS_DESCR), Some(1));
        assert_eq!(lookup_next(OID_UPS_CONFIG_HIGH_XFER), None);
    }

    #[test]
    fn test_oid_compare_shorter_prefix_is_less() {
        assert_eq!(
            oid_compare(&[0x2B, 0x06], &[0x2B, 0x06, 0x01]),
            std::cmp::Ordering::Less
        );
    }
}
