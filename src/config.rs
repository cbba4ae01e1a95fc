//! Connection configuration. No environment variables, no persisted state —
//! every knob is a constructor argument, mirroring the original `TCPConfig`.

use crate::error::Error;

pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// The TIME_WAIT interval is this many multiples of `initial_rto_ms`.
pub const LINGER_MULTIPLIER: u32 = 10;

/// The default excessive-retransmission threshold (`MAX_RETX_ATTEMPTS`).
pub const DEFAULT_MAX_RETX_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Bytes buffered by each direction's byte stream.
    pub capacity: usize,
    /// Initial retransmission timeout, in milliseconds.
    pub initial_rto_ms: u64,
    /// Number of consecutive retransmissions tolerated before giving up.
    pub max_retx_attempts: u32,
}

impl Config {
    pub fn new(capacity: usize, initial_rto_ms: u64, max_retx_attempts: u32) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if max_retx_attempts == 0 {
            return Err(Error::ZeroRetxAttempts);
        }
        Ok(Config {
            capacity,
            initial_rto_ms,
            max_retx_attempts,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity: 64_000,
            initial_rto_ms: 1000,
            max_retx_attempts: DEFAULT_MAX_RETX_ATTEMPTS,
        }
    }
}
