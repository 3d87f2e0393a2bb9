//! A concrete [`Adapter`](crate::request::Adapter) for the SPM2K-class UPS
//! family referenced throughout the catalog's identity strings.
//!
//! The exact command bytes and framing are illustrative: the original
//! firmware's adapter layer was selected at compile time by preprocessor
//! macro, one sub-adapter per UPS family. This module plays that role for a
//! single representative family so the engine and scheduler have a complete,
//! runtime-selectable table to drive against.

use std::sync::Arc;

use crate::request::{expect_exact, Adapter, CmdBits, EndingBytes, HeartbeatConfig, RequestDescriptor, ResponseShape};
use crate::telemetry::Telemetry;

const HEARTBEAT_CMD: u16 = 0x01;
const HEARTBEAT_REPLY: &[u8] = &[0x06];

const CMD_MODEL: u16 = 0x10;
const CMD_FIRMWARE: u16 = 0x11;

const CMD_BATTERY: u16 = 0x20;
const CMD_INPUT: u16 = 0x21;
const CMD_OUTPUT: u16 = 0x22;

fn parse_battery(_cmd: u16, rx: &[u8], telemetry: &mut Telemetry) -> bool {
    if rx.len() < 8 {
        return false;
    }
    telemetry.battery.battery_voltage = i32::from(i16::from_be_bytes([rx[0], rx[1]]));
    telemetry.battery.battery_current = i32::from(i16::from_be_bytes([rx[2], rx[3]]));
    telemetry.battery.temperature = u32::from(u16::from_be_bytes([rx[4], rx[5]]));
    telemetry.battery.remaining_capacity = rx[6];
    telemetry.present_status.battery_present = rx[7] != 0;
    true
}

fn parse_input(_cmd: u16, rx: &[u8], telemetry: &mut Telemetry) -> bool {
    if rx.len() < 6 {
        return false;
    }
    telemetry.input.voltage = u32::from(u16::from_be_bytes([rx[0], rx[1]]));
    telemetry.input.frequency = u32::from(u16::from_be_bytes([rx[2], rx[3]]));
    telemetry.present_status.ac_present = rx[4] != 0;
    telemetry.present_status.discharging = !telemetry.present_status.ac_present;
    let _ = rx[5];
    true
}

fn parse_output(_cmd: u16, rx: &[u8], telemetry: &mut Telemetry) -> bool {
    if rx.len() < 6 {
        return false;
    }
    telemetry.output.voltage = u32::from(u16::from_be_bytes([rx[0], rx[1]]));
    telemetry.output.frequency = u32::from(u16::from_be_bytes([rx[2], rx[3]]));
    telemetry.output.percent_load = u32::from(rx[4]);
    telemetry.output.current = i32::from(rx[5] as i8);
    true
}

/// A representative single-family adapter built for a UPS that frames every
/// reply with a trailing `0x0D 0x0A` and answers the heartbeat command with
/// a single ACK byte.
pub struct Spm2kAdapter {
    constant: Vec<RequestDescriptor>,
    dynamic: Vec<RequestDescriptor>,
    heartbeat: RequestDescriptor,
}

impl Spm2kAdapter {
    pub fn new() -> Self {
        let ending = EndingBytes::new(&[0x0D, 0x0A]);

        let constant = vec![
            RequestDescriptor {
                cmd: CMD_MODEL,
                cmd_bits: CmdBits::Eight,
                response: ResponseShape::Framed { max_len: 0, ending },
                timeout_ms: 200,
                max_retries: 2,
                parser: Arc::new(|_cmd, _rx, _telemetry| true),
            },
            RequestDescriptor {
                cmd: CMD_FIRMWARE,
                cmd_bits: CmdBits::Eight,
                response: ResponseShape::Framed { max_len: 0, ending },
                timeout_ms: 200,
                max_retries: 2,
                parser: Arc::new(|_cmd, _rx, _telemetry| true),
            },
        ];

        let dynamic = vec![
            RequestDescriptor {
                cmd: CMD_BATTERY,
                cmd_bits: CmdBits::Eight,
                response: ResponseShape::Fixed { len: 8 },
                timeout_ms: 200,
                max_retries: 2,
                parser: Arc::new(parse_battery),
            },
            RequestDescriptor {
                cmd: CMD_INPUT,
                cmd_bits: CmdBits::Eight,
                response: ResponseShape::Fixed { len: 6 },
                timeout_ms: 200,
                max_retries: 2,
                parser: Arc::new(parse_input),
            },
            RequestDescriptor {
                cmd: CMD_OUTPUT,
                cmd_bits: CmdBits::Eight,
                response: ResponseShape::Fixed { len: 6 },
                timeout_ms: 200,
                max_retries: 2,
                parser: Arc::new(parse_output),
            },
        ];

        let heartbeat = RequestDescriptor {
            cmd: HEARTBEAT_CMD,
            cmd_bits: CmdBits::Eight,
            response: ResponseShape::Fixed { len: HEARTBEAT_REPLY.len() as u16 },
            timeout_ms: 100,
            max_retries: 0,
            parser: expect_exact(HEARTBEAT_REPLY.to_vec()),
        };

        Self {
            constant,
            dynamic,
            heartbeat,
        }
    }

    /// The heartbeat request packaged with the engine's heartbeat config,
    /// ready to hand to [`crate::engine::Engine::set_heartbeat`].
    pub fn heartbeat_config(&self, interval_ms: u32, failure_threshold: u8) -> HeartbeatConfig {
        HeartbeatConfig {
            req: self.heartbeat.clone(),
            interval_ms,
            failure_threshold,
        }
    }
}

impl Default for Spm2kAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for Spm2kAdapter {
    fn constant_table(&self) -> &[RequestDescriptor] {
        &self.constant
    }

    fn dynamic_table(&self) -> &[RequestDescriptor] {
        &self.dynamic
    }

    fn heartbeat_descriptor(&self) -> &RequestDescriptor {
        &self.heartbeat
    }

    fn heartbeat_expected_reply(&self) -> &[u8] {
        HEARTBEAT_REPLY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_non_empty_and_valid() {
        let adapter = Spm2kAdapter::new();
        assert!(!adapter.constant_table().is_empty());
        assert!(!adapter.dynamic_table().is_empty());
        for req in adapter.constant_table().iter().chain(adapter.dynamic_table()) {
            assert!(req.validate(256, 8).is_ok());
        }
    }

    #[test]
    fn test_parse_battery_populates_telemetry() {
        let mut telemetry = Telemetry::default();
        let rx = [0x00, 0x64, 0xFF, 0xF6, 0x0A, 0xBB, 80, 0x01];
        assert!(parse_battery(CMD_BATTERY, &rx, &mut telemetry));
        assert_eq!(telemetry.battery.battery_voltage, 100);
        assert_eq!(telemetry.battery.battery_current, -10);
        assert_eq!(telemetry.battery.remaining_capacity, 80);
        assert!(telemetry.present_status.battery_present);
    }

    #[test]
    fn test_heartbeat_descriptor_matches_expected_reply() {
        let adapter = Spm2kAdapter::new();
        assert_eq!(adapter.heartbeat_expected_reply(), &[0x06]);
        let cfg = adapter.heartbeat_config(1000, 5);
        assert_eq!(cfg.interval_ms, 1000);
        assert_eq!(cfg.failure_threshold, 5);
    }
}
