//! Process-level glue: owns the engine, scheduler and shared telemetry, and
//! runs the SNMP responder on its own thread. Mirrors `app_main`'s shape
//! (bring up collaborators, then loop ticking the engine and scheduler).

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::info;

use crate::config::Config;
use crate::engine::Engine;
use crate::request::Adapter;
use crate::scheduler::Scheduler;
use crate::serial::SerialPort;
use crate::telemetry::Telemetry;

/// Owns the engine and scheduler for one serial-attached UPS and serves SNMP
/// for it on a background thread.
pub struct Supervisor<S: SerialPort, A: Adapter> {
    engine: Engine<S>,
    scheduler: Scheduler<S, A>,
    telemetry: Arc<RwLock<Telemetry>>,
    config: Config,
    started_at: Instant,
}

impl<S: SerialPort, A: Adapter> Supervisor<S, A> {
    pub fn new(serial: S, adapter: A, config: Config) -> Self {
        let telemetry = Arc::new(RwLock::new(Telemetry::default()));
        let engine = Engine::new(serial, telemetry.clone(), &config);
        let scheduler = Scheduler::new(adapter, telemetry.clone(), &config);
        Self {
            engine,
            scheduler,
            telemetry,
            config,
            started_at: Instant::now(),
        }
    }

    pub fn telemetry(&self) -> Arc<RwLock<Telemetry>> {
        self.telemetry.clone()
    }

    fn now_ms(&self) -> u32 {
        self.started_at.elapsed().as_millis() as u32
    }

    /// Run one tick of the engine followed by one tick of the scheduler.
    /// Exposed directly so embedders with their own event loop (e.g. the
    /// ESP32 firmware's FreeRTOS task) can interleave it with other work.
    pub fn tick(&mut self) {
        self.engine.tick();
        let now = self.now_ms();
        self.scheduler.tick(&mut self.engine, now);
    }

    /// Spawn the SNMP responder thread and loop ticking the engine and
    /// scheduler every millisecond, mirroring `app_main`'s
    /// `while(1) { ...; ups_loop_delay_safe(1); }`. Never returns.
    pub fn run_forever(mut self) -> ! {
        let telemetry = self.telemetry.clone();
        let config = self.config.clone();
        thread::spawn(move || {
            if let Err(e) = crate::snmp::responder::serve_forever(telemetry, &config) {
                log::error!("snmp responder exited: {e}");
            }
        });

        info!("supervisor entering main loop");
        loop {
            self.tick();
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Spm2kAdapter;
    use crate::serial::MockSerialPort;

    #[test]
    fn test_supervisor_tick_does_not_panic() {
        let config = Config::default();
        let mut supervisor = Supervisor::new(MockSerialPort::new(), Spm2kAdapter::new(), config);
        for _ in 0..10 {
            supervisor.tick();
        }
    }

    #[test]
    fn test_telemetry_handle_is_shared() {
        let config = Config::default();
        let supervisor = Supervisor::new(MockSerialPort::new(), Spm2kAdapter::new(), config);
        let handle = supervisor.telemetry();
        assert_eq!(handle.read().unwrap().battery.remaining_capacity, 0);
    }
}
