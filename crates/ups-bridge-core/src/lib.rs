//! UART-to-SNMP bridge core
//!
//! Bridges a serially attached UPS to an SNMPv1/v2c UDP responder exposing a
//! subset of RFC 1628 (UPS-MIB). The crate is host-testable `std` code; the
//! `esp32-app` binary (outside this workspace) wires it to real hardware.

pub mod adapter;
pub mod ber;
pub mod config;
pub mod engine;
pub mod error;
pub mod request;
pub mod scheduler;
pub mod serial;
pub mod snmp;
pub mod supervisor;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
pub use request::{Adapter, CmdBits, EndingBytes, HeartbeatConfig, RequestDescriptor, ResponseShape};
pub use serial::SerialPort;
pub use supervisor::Supervisor;
pub use telemetry::Telemetry;
