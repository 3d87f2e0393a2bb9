//! Bootstrap and dynamic-refresh scheduler
//!
//! Drives the engine's queue from an [`Adapter`]'s tables: first a heartbeat
//! link check, then the constant table pumped once, then the dynamic table
//! pumped once, then periodic re-enqueue of the dynamic table on a fixed
//! period. Mirrors `ups_bootstrap_task` / `ups_dynamic_update_task`'s state
//! machine.

use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::request::Adapter;
use crate::serial::{reached, SerialPort};
use crate::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootstrapState {
    EnqueueHeartbeat,
    WaitHeartbeatDrain,
    HeartbeatVerify,
    WaitRetry,
    EnqueueConstant,
    EnqueueDynamic,
    WaitDrain,
    SanityCheck,
    Done,
}

/// Drives one engine through bootstrap, then periodic dynamic refresh.
pub struct Scheduler<S: SerialPort, A: Adapter> {
    state: BootstrapState,
    adapter: A,
    telemetry: Arc<RwLock<Telemetry>>,
    enqueue_burst_per_tick: u8,
    init_retry_period_ms: u32,
    dynamic_update_period_ms: u32,
    retry_not_before_ms: u32,
    next_dynamic_due_ms: u32,
    constant_cursor: usize,
    dynamic_cursor: usize,
    /// Reply bytes captured by the bootstrap heartbeat's one-shot capture
    /// parser, compared against the adapter's expected reply in
    /// `HeartbeatVerify`. `None` until a capture job completes.
    heartbeat_capture: Arc<Mutex<Option<Vec<u8>>>>,
    _marker: std::marker::PhantomData<S>,
}

impl<S: SerialPort, A: Adapter> Scheduler<S, A> {
    pub fn new(adapter: A, telemetry: Arc<RwLock<Telemetry>>, config: &Config) -> Self {
        Self {
            state: BootstrapState::EnqueueHeartbeat,
            adapter,
            telemetry,
            enqueue_burst_per_tick: config.enqueue_burst_per_tick,
            init_retry_period_ms: config.init_retry_period_ms(),
            dynamic_update_period_ms: config.dynamic_update_period_ms(),
            retry_not_before_ms: 0,
            next_dynamic_due_ms: 0,
            constant_cursor: 0,
            dynamic_cursor: 0,
            heartbeat_capture: Arc::new(Mutex::new(None)),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn is_bootstrapped(&self) -> bool {
        matches!(self.state, BootstrapState::EnqueueDynamic | BootstrapState::WaitDrain | BootstrapState::SanityCheck | BootstrapState::Done)
    }

    fn reset_for_retry(&mut self, now_ms: u32) {
        self.state = BootstrapState::WaitRetry;
        self.retry_not_before_ms = now_ms.wrapping_add(self.init_retry_period_ms);
        self.constant_cursor = 0;
        self.dynamic_cursor = 0;
    }

    /// Pump up to `enqueue_burst_per_tick` descriptors from `table[*cursor..]`
    /// into the engine, advancing the cursor. Returns `true` once exhausted.
    fn pump_table(engine: &mut Engine<S>, table: &[crate::request::RequestDescriptor], cursor: &mut usize, burst: u8) -> bool {
        let mut pumped = 0u8;
        while *cursor < table.len() && pumped < burst {
            if engine.enqueue(table[*cursor].clone()).is_err() {
                break;
            }
            *cursor += 1;
            pumped += 1;
        }
        *cursor >= table.len()
    }

    /// Advance the scheduler by one tick. Must be called after `engine.tick()`.
    pub fn tick(&mut self, engine: &mut Engine<S>, now_ms: u32) {
        match self.state {
            BootstrapState::EnqueueHeartbeat => {
                *self.heartbeat_capture.lock().expect("heartbeat capture lock poisoned") = None;

                let mut hb_req = self.adapter.heartbeat_descriptor().clone();
                let capture = self.heartbeat_capture.clone();
                hb_req.parser = std::sync::Arc::new(move |_cmd, rx, _telemetry| {
                    *capture.lock().expect("heartbeat capture lock poisoned") = Some(rx.to_vec());
                    true
                });

                if engine.enqueue(hb_req).is_ok() {
                    self.state = BootstrapState::WaitHeartbeatDrain;
                } else {
                    self.reset_for_retry(now_ms);
                }
            }
            BootstrapState::WaitHeartbeatDrain => {
                if !engine.is_busy() {
                    self.state = BootstrapState::HeartbeatVerify;
                }
            }
            BootstrapState::HeartbeatVerify => {
                let expected = self.adapter.heartbeat_expected_reply();
                let matches = self
                    .heartbeat_capture
                    .lock()
                    .expect("heartbeat capture lock poisoned")
                    .as_deref()
                    == Some(expected);
                if matches {
                    info!("heartbeat verified, proceeding to constant table bootstrap");
                    self.state = BootstrapState::EnqueueConstant;
                } else {
                    warn!("heartbeat verification failed, backing off");
                    self.reset_for_retry(now_ms);
                }
            }
            BootstrapState::WaitRetry => {
                if reached(now_ms, self.retry_not_before_ms) {
                    self.state = BootstrapState::EnqueueHeartbeat;
                }
            }
            BootstrapState::EnqueueConstant => {
                let table_len = self.adapter.constant_table().len();
                let done = Self::pump_table(
                    engine,
                    self.adapter.constant_table(),
                    &mut self.constant_cursor,
                    self.enqueue_burst_per_tick,
                );
                debug!("bootstrap: enqueued {}/{} constant entries", self.constant_cursor, table_len);
                if done {
                    self.state = BootstrapState::EnqueueDynamic;
                }
            }
            BootstrapState::EnqueueDynamic => {
                let done = Self::pump_table(
                    engine,
                    self.adapter.dynamic_table(),
                    &mut self.dynamic_cursor,
                    self.enqueue_burst_per_tick,
                );
                if done {
                    self.dynamic_cursor = 0;
                    self.state = BootstrapState::WaitDrain;
                }
            }
            BootstrapState::WaitDrain => {
                if !engine.is_busy() {
                    self.state = BootstrapState::SanityCheck;
                }
            }
            BootstrapState::SanityCheck => {
                let healthy = self
                    .telemetry
                    .read()
                    .expect("telemetry lock poisoned")
                    .battery
                    .remaining_capacity
                    > 0;
                if healthy {
                    info!("bootstrap complete, entering dynamic refresh cycle");
                    self.next_dynamic_due_ms = now_ms.wrapping_add(self.dynamic_update_period_ms);
                    self.state = BootstrapState::Done;
                } else {
                    warn!("sanity check failed (remaining_capacity=0), backing off");
                    self.reset_for_retry(now_ms);
                }
            }
            BootstrapState::Done => {
                if reached(now_ms, self.next_dynamic_due_ms) {
                    self.next_dynamic_due_ms = now_ms.wrapping_add(self.dynamic_update_period_ms);
                    self.state = BootstrapState::EnqueueDynamic;
                }
            }
        }
    }
}
