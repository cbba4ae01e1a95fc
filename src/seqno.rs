//! Wrapping 32-bit wire sequence numbers and their conversion to/from the
//! 64-bit absolute offsets the rest of the engine reasons about.

use std::fmt;

/// A 32-bit wrapping sequence (or acknowledgment) number, as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seqno(u32);

impl Seqno {
    pub fn new(raw: u32) -> Self {
        Seqno(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn wrapping_add(self, delta: u32) -> Self {
        Seqno(self.0.wrapping_add(delta))
    }

    /// Absolute sequence number `n` expressed relative to this Seqno as `isn`.
    pub fn wrap(n: u64, isn: Seqno) -> Self {
        Seqno(isn.0.wrapping_add(n as u32))
    }

    /// The 64-bit absolute sequence number nearest `checkpoint` that wraps to
    /// this Seqno relative to `isn`.
    pub fn unwrap(self, isn: Seqno, checkpoint: u64) -> u64 {
        let offset = self.0.wrapping_sub(isn.0) as u64;
        // The raw offset is correct modulo 2^32; find the representative
        // nearest the checkpoint by adjusting by whole wraps of 2^32.
        let span = 1i128 << 32;
        let base = (checkpoint as i128) - (checkpoint as i128) % span + (offset as i128);

        [base - span, base, base + span]
            .into_iter()
            .filter(|c| *c >= 0)
            .min_by_key(|c| (*c - checkpoint as i128).abs())
            .unwrap_or(base) as u64
    }
}

impl fmt::Display for Seqno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True if, on a 32-bit wrapping number line, `lhs` precedes `rhs`.
///
/// From RFC 1323: TCP determines if a data segment is "old" or "new" by
/// testing whether its sequence number is within 2**31 bytes of the left
/// edge of the window.
pub fn wrapping_lt(lhs: u32, rhs: u32) -> bool {
    lhs.wrapping_sub(rhs) > (1 << 31)
}

pub fn is_between_wrapped(start: u32, x: u32, end: u32) -> bool {
    wrapping_lt(start, x) && wrapping_lt(x, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_picks_value_nearest_checkpoint() {
        let isn = Seqno::new(0);
        // seqno 0 could be absolute 0, 2^32, 2*2^32, ...
        assert_eq!(Seqno::new(0).unwrap(isn, 0), 0);
        assert_eq!(Seqno::new(0).unwrap(isn, 1u64 << 32), 1u64 << 32);
        assert_eq!(
            Seqno::new(0).unwrap(isn, (1u64 << 32) + (1u64 << 31)),
            1u64 << 32
        );
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let isn = Seqno::new(0xFFFF_FFF0);
        for n in [0u64, 1, 20, 1 << 31, (1u64 << 32) + 5] {
            let wrapped = Seqno::wrap(n, isn);
            assert_eq!(wrapped.unwrap(isn, n), n);
        }
    }

    #[test]
    fn wrapping_lt_handles_wraparound() {
        assert!(wrapping_lt(u32::MAX, 0));
        assert!(!wrapping_lt(0, u32::MAX));
    }
}
