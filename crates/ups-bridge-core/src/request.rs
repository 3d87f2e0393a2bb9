//! Request descriptors, the bounded job queue and the per-adapter catalog
//! they are drawn from.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::telemetry::Telemetry;

/// Maximum length of a framed response's terminator sequence
pub const MAX_ENDING_LEN: usize = 8;

/// Command id width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdBits {
    Eight,
    Sixteen,
}

/// How the receive phase recognizes a complete response
#[derive(Debug, Clone)]
pub enum ResponseShape {
    /// Exactly `len` bytes (0 is legal: the response is empty)
    Fixed { len: u16 },
    /// Up to `max_len` bytes (0 meaning "use the configured cap"), terminated
    /// by `ending` appearing as the tail of what has been received so far.
    Framed { max_len: u16, ending: EndingBytes },
}

/// A small fixed-capacity byte sequence used as a framing terminator
#[derive(Debug, Clone, Copy)]
pub struct EndingBytes {
    bytes: [u8; MAX_ENDING_LEN],
    len: u8,
}

impl EndingBytes {
    /// Build from a slice; panics if longer than [`MAX_ENDING_LEN`]. Use
    /// [`EndingBytes::try_new`] when the length is not known to be in range.
    pub fn new(slice: &[u8]) -> Self {
        Self::try_new(slice).expect("ending sequence too long")
    }

    /// Fallible constructor used by request tables built at runtime.
    pub fn try_new(slice: &[u8]) -> Option<Self> {
        if slice.is_empty() || slice.len() > MAX_ENDING_LEN {
            return None;
        }
        let mut bytes = [0u8; MAX_ENDING_LEN];
        bytes[..slice.len()].copy_from_slice(slice);
        Some(Self {
            bytes,
            len: slice.len() as u8,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Parser invoked once a response is complete: given the command id and the
/// bytes received, it may commit a value into the shared telemetry and
/// reports whether the transaction is to be considered successful.
///
/// This replaces the original's untyped `out_value` pointer: rather than the
/// engine handing the callback a raw slot, the callback itself captures
/// (by closure) which telemetry field it targets and writes through the
/// `&mut Telemetry` the engine hands it while the write lock is held.
pub type ParserFn = Arc<dyn Fn(u16, &[u8], &mut Telemetry) -> bool + Send + Sync>;

/// An immutable description of one request/response transaction
#[derive(Clone)]
pub struct RequestDescriptor {
    pub cmd: u16,
    pub cmd_bits: CmdBits,
    pub response: ResponseShape,
    pub timeout_ms: u32,
    pub max_retries: u8,
    pub parser: ParserFn,
}

impl RequestDescriptor {
    /// Validate bit-width, expected-length cap and framing terminator
    /// bounds, exactly as the engine's `enqueue` does before accepting a job.
    pub(crate) fn validate(&self, max_expected_len: u16, max_ending_len: u8) -> Result<()> {
        match self.response {
            ResponseShape::Fixed { len } => {
                if len > max_expected_len {
                    return Err(Error::BadParam);
                }
            }
            ResponseShape::Framed { max_len, ending } => {
                if max_len > max_expected_len {
                    return Err(Error::BadParam);
                }
                if ending.is_empty() || ending.len() > max_ending_len as usize {
                    return Err(Error::BadParam);
                }
            }
        }
        Ok(())
    }

    /// Encode the command into big-endian bytes (1 or 2 bytes).
    pub(crate) fn encode_cmd(&self) -> ([u8; 2], usize) {
        match self.cmd_bits {
            CmdBits::Eight => ([self.cmd as u8, 0], 1),
            CmdBits::Sixteen => ([(self.cmd >> 8) as u8, self.cmd as u8], 2),
        }
    }

    /// Receive-phase capacity: fixed length, or the framed cap (falling back
    /// to `max_expected_len` when the descriptor leaves it at 0).
    pub(crate) fn rx_cap(&self, max_expected_len: u16) -> u16 {
        match self.response {
            ResponseShape::Fixed { len } => len,
            ResponseShape::Framed { max_len, .. } => {
                if max_len == 0 {
                    max_expected_len
                } else {
                    max_len
                }
            }
        }
    }

    pub(crate) fn ending(&self) -> Option<EndingBytes> {
        match self.response {
            ResponseShape::Framed { ending, .. } => Some(ending),
            ResponseShape::Fixed { .. } => None,
        }
    }
}

/// A built-in parser that compares the received bytes to a fixed reference,
/// ignoring the telemetry handle entirely. Used for heartbeat verification
/// and for adapter-constant requests that only need an acknowledgement.
pub fn expect_exact(expected: Vec<u8>) -> ParserFn {
    Arc::new(move |_cmd, rx, _telemetry| rx == expected.as_slice())
}

/// One in-flight or queued unit of work
#[derive(Clone)]
pub(crate) struct Job {
    pub req: RequestDescriptor,
    pub retries_left: u8,
    pub is_heartbeat: bool,
}

impl Job {
    pub fn new(req: RequestDescriptor, is_heartbeat: bool) -> Self {
        let retries_left = req.max_retries;
        Self {
            req,
            retries_left,
            is_heartbeat,
        }
    }
}

/// Bounded FIFO queue of jobs, backing the engine's "at most one active job"
/// discipline.
pub(crate) struct Queue {
    items: std::collections::VecDeque<Job>,
    capacity: usize,
}

impl Queue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: std::collections::VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn push(&mut self, job: Job) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push_back(job);
        true
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Heartbeat configuration installed on the engine
#[derive(Clone)]
pub struct HeartbeatConfig {
    pub req: RequestDescriptor,
    pub interval_ms: u32,
    pub failure_threshold: u8,
}

/// A runtime-selected per-adapter request catalog, replacing the original's
/// preprocessor-selected sub-adapter.
pub trait Adapter: Send + Sync {
    /// One-shot requests enqueued exactly once during bootstrap.
    fn constant_table(&self) -> &[RequestDescriptor];

    /// Requests re-enqueued on every dynamic refresh cycle.
    fn dynamic_table(&self) -> &[RequestDescriptor];

    /// The heartbeat descriptor used to verify the link during bootstrap.
    fn heartbeat_descriptor(&self) -> &RequestDescriptor;

    /// The exact bytes a healthy UPS replies with to the heartbeat command.
    fn heartbeat_expected_reply(&self) -> &[u8];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_parser() -> ParserFn {
        Arc::new(|_cmd, _rx, _telemetry| true)
    }

    #[test]
    fn test_ending_bytes_rejects_empty_and_oversized() {
        assert!(EndingBytes::try_new(&[]).is_none());
        assert!(EndingBytes::try_new(&[0u8; MAX_ENDING_LEN + 1]).is_none());
        assert!(EndingBytes::try_new(&[0x0D, 0x0A]).is_some());
    }

    #[test]
    fn test_validate_rejects_oversized_fixed_len() {
        let req = RequestDescriptor {
            cmd: 0x01,
            cmd_bits: CmdBits::Eight,
            response: ResponseShape::Fixed { len: 300 },
            timeout_ms: 100,
            max_retries: 0,
            parser: noop_parser(),
        };
        assert_eq!(req.validate(256, 8), Err(Error::BadParam));
    }

    #[test]
    fn test_validate_accepts_framed_within_bounds() {
        let req = RequestDescriptor {
            cmd: 0x01,
            cmd_bits: CmdBits::Sixteen,
            response: ResponseShape::Framed {
                max_len: 0,
                ending: EndingBytes::new(&[0x0D, 0x0A]),
            },
            timeout_ms: 200,
            max_retries: 2,
            parser: noop_parser(),
        };
        assert!(req.validate(256, 8).is_ok());
    }

    #[test]
    fn test_encode_cmd_big_endian() {
        let req16 = RequestDescriptor {
            cmd: 0x1234,
            cmd_bits: CmdBits::Sixteen,
            response: ResponseShape::Fixed { len: 0 },
            timeout_ms: 0,
            max_retries: 0,
            parser: noop_parser(),
        };
        let (bytes, len) = req16.encode_cmd();
        assert_eq!((&bytes[..len], len), (&[0x12, 0x34][..], 2));

        let req8 = RequestDescriptor {
            cmd: 0xAB,
            cmd_bits: CmdBits::Eight,
            ..req16
        };
        let (bytes, len) = req8.encode_cmd();
        assert_eq!((&bytes[..len], len), (&[0xAB][..], 1));
    }

    #[test]
    fn test_queue_bounded_fifo() {
        let mut q = Queue::new(2);
        let req = RequestDescriptor {
            cmd: 0,
            cmd_bits: CmdBits::Eight,
            response: ResponseShape::Fixed { len: 0 },
            timeout_ms: 0,
            max_retries: 0,
            parser: noop_parser(),
        };
        assert!(q.push(Job::new(req.clone(), false)));
        assert!(q.push(Job::new(req.clone(), false)));
        assert!(!q.push(Job::new(req.clone(), false)));
        assert_eq!(q.len(), 2);
        assert!(q.pop().is_some());
        assert!(q.push(Job::new(req, false)));
    }

    #[test]
    fn test_expect_exact_parser() {
        let parser = expect_exact(vec![0xAA, 0xBB]);
        let mut telemetry = Telemetry::default();
        assert!(parser(0, &[0xAA, 0xBB], &mut telemetry));
        assert!(!parser(0, &[0xAA, 0xBC], &mut telemetry));
    }
}
