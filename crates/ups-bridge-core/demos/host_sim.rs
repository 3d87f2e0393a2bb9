//! Host-side demo: runs the bridge against a canned-reply UPS double and a
//! real UDP/161 socket, so `snmpget`/`snmpwalk` can be pointed at localhost.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use ups_bridge_core::adapter::Spm2kAdapter;
use ups_bridge_core::config::Config;
use ups_bridge_core::engine::Engine;
use ups_bridge_core::error::Result;
use ups_bridge_core::scheduler::Scheduler;
use ups_bridge_core::serial::SerialPort;
use ups_bridge_core::snmp::responder;
use ups_bridge_core::telemetry::Telemetry;

/// A fake UART that answers every command byte it sees with a scripted
/// reply, standing in for a real SPM2K-class UPS on the other end of the
/// wire. Good enough to exercise the full engine/scheduler/responder path
/// end to end without real hardware.
struct DemoUps {
    locked: bool,
    tx_in_flight: bool,
    tx_done_flag: bool,
    pending_reply: VecDeque<u8>,
    started_at: Instant,
}

impl DemoUps {
    fn new() -> Self {
        Self {
            locked: false,
            tx_in_flight: false,
            tx_done_flag: false,
            pending_reply: VecDeque::new(),
            started_at: Instant::now(),
        }
    }

    fn reply_for(cmd: u8) -> Vec<u8> {
        match cmd {
            0x01 => vec![0x06],                                              // heartbeat ack
            0x10 => b"SPM2K\r\n".to_vec(),                                    // model
            0x11 => b"1.0.3\r\n".to_vec(),                                    // firmware
            0x20 => vec![0x00, 0x64, 0xFF, 0xF6, 0x0A, 0xBB, 92, 0x01],       // battery
            0x21 => vec![0x09, 0x00, 0x02, 0x58, 0x01, 0x00],                 // input
            0x22 => vec![0x08, 0xFC, 0x02, 0x58, 40, 0x05],                   // output
            _ => Vec::new(),
        }
    }
}

impl SerialPort for DemoUps {
    fn try_lock(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn send_async(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending_reply = Self::reply_for(bytes[0]).into_iter().collect();
        self.tx_in_flight = true;
        self.tx_done_flag = true; // instantaneous for the demo
        Ok(())
    }

    fn tx_done(&mut self) -> bool {
        self.tx_done_flag
    }

    fn tx_done_clear(&mut self) {
        self.tx_done_flag = false;
        self.tx_in_flight = false;
    }

    fn discard_input(&mut self) {
        self.pending_reply.clear();
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut n = 0;
        while n < dst.len() {
            match self.pending_reply.pop_front() {
                Some(b) => {
                    dst[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn tick_ms(&self) -> u32 {
        self.started_at.elapsed().as_millis() as u32
    }
}

fn main() {
    env_logger::init();

    let mut config = Config::default();
    config.apply_env_overrides();

    let telemetry = Arc::new(RwLock::new(Telemetry::default()));
    let mut engine = Engine::new(DemoUps::new(), telemetry.clone(), &config);
    let mut scheduler = Scheduler::new(Spm2kAdapter::new(), telemetry.clone(), &config);

    let responder_telemetry = telemetry.clone();
    let responder_config = config.clone();
    thread::spawn(move || {
        if let Err(e) = responder::serve_forever(responder_telemetry, &responder_config) {
            eprintln!("snmp responder exited: {e}");
        }
    });

    println!("host_sim: SNMP responder on udp/161, community '{}'", config.community);
    println!("try: snmpwalk -v2c -c {} 127.0.0.1 .1.3.6.1.2.1.33", config.community);

    let start = Instant::now();
    loop {
        engine.tick();
        let now_ms = start.elapsed().as_millis() as u32;
        scheduler.tick(&mut engine, now_ms);
        thread::sleep(Duration::from_millis(1));
    }
}
