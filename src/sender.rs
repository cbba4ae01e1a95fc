//! Packetizes an outbound byte stream, tracks bytes in flight against the
//! peer's advertised window, and retransmits with exponential backoff.

use std::collections::{BTreeMap, VecDeque};

use rand::RngCore;

use crate::byte_stream::ByteStream;
use crate::config::MAX_PAYLOAD_SIZE;
use crate::segment::Segment;
use crate::seqno::Seqno;

#[derive(Debug)]
struct RetransmissionTimer {
    initial_timeout_ms: u64,
    current_timeout_ms: u64,
    elapsed_ms: u64,
    consecutive_retx_count: u32,
}

impl RetransmissionTimer {
    fn new(initial_timeout_ms: u64) -> Self {
        RetransmissionTimer {
            initial_timeout_ms,
            current_timeout_ms: initial_timeout_ms,
            elapsed_ms: 0,
            consecutive_retx_count: 0,
        }
    }

    fn reset(&mut self) {
        self.current_timeout_ms = self.initial_timeout_ms;
        self.elapsed_ms = 0;
    }
}

#[derive(Debug)]
pub struct Sender {
    isn: Seqno,
    next_seqno: u64,
    outgoing_bytes: usize,
    /// Outstanding segments, oldest first, keyed by absolute seqno.
    outgoing_map: BTreeMap<u64, Segment>,
    last_window_size: u16,
    syn_sent: bool,
    fin_sent: bool,
    timer: RetransmissionTimer,
    stream: ByteStream,
    segments_out: VecDeque<Segment>,
}

impl Sender {
    pub fn new(capacity: usize, initial_rto_ms: u64, fixed_isn: Option<Seqno>) -> Self {
        let isn = fixed_isn.unwrap_or_else(|| Seqno::new(rand::thread_rng().next_u32()));
        Sender {
            isn,
            next_seqno: 0,
            outgoing_bytes: 0,
            outgoing_map: BTreeMap::new(),
            // Assumed open until the peer actually advertises otherwise, so
            // the first RTO expiry still backs off normally rather than
            // being mistaken for a zero-window probe.
            last_window_size: 1,
            syn_sent: false,
            fin_sent: false,
            timer: RetransmissionTimer::new(initial_rto_ms),
            stream: ByteStream::new(capacity),
            segments_out: VecDeque::new(),
        }
    }

    pub fn stream_in(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    pub fn stream_in_ref(&self) -> &ByteStream {
        &self.stream
    }

    pub fn segments_out(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    pub fn bytes_in_flight(&self) -> usize {
        self.outgoing_bytes
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.timer.consecutive_retx_count
    }

    pub fn syn_sent(&self) -> bool {
        self.syn_sent
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    /// All outstanding segments have been acknowledged and FIN has gone out.
    pub fn fin_acked(&self) -> bool {
        self.fin_sent && self.outgoing_map.is_empty()
    }

    fn next_seqno(&self) -> Seqno {
        self.isn.wrapping_add(self.next_seqno as u32)
    }

    pub fn fill_window(&mut self) {
        let window = if self.last_window_size > 0 {
            self.last_window_size as usize
        } else {
            1
        };

        while window > self.outgoing_bytes {
            let mut seg = Segment::new(self.next_seqno());

            if !self.syn_sent {
                seg.flags.syn = true;
                self.syn_sent = true;
            }

            let payload_budget = window
                .saturating_sub(self.outgoing_bytes)
                .saturating_sub(seg.flags.syn as usize)
                .min(MAX_PAYLOAD_SIZE);
            seg.payload = self.stream.read(payload_budget);

            if !self.fin_sent
                && self.stream.eof()
                && seg.payload.len() + self.outgoing_bytes + seg.flags.syn as usize < window
            {
                seg.flags.fin = true;
                self.fin_sent = true;
            }

            if seg.length_in_sequence_space() == 0 {
                break;
            }

            if self.outgoing_map.is_empty() {
                self.timer.reset();
            }

            log::trace!(
                "sender: sending seqno={} len={} syn={} fin={}",
                self.next_seqno,
                seg.length_in_sequence_space(),
                seg.flags.syn,
                seg.flags.fin
            );

            self.segments_out.push_back(seg.clone());
            self.outgoing_bytes += seg.length_in_sequence_space();
            self.outgoing_map.insert(self.next_seqno, seg.clone());
            self.next_seqno += seg.length_in_sequence_space() as u64;

            if seg.flags.fin {
                break;
            }
        }
    }

    pub fn ack_received(&mut self, ackno: Seqno, window: u16) {
        let abs_ackno = ackno.unwrap(self.isn, self.next_seqno);
        if abs_ackno > self.next_seqno {
            log::debug!("sender: ignoring ack beyond next_seqno ({abs_ackno} > {})", self.next_seqno);
            return;
        }

        self.last_window_size = window;

        let mut newly_acked = false;
        loop {
            let Some((&key, seg)) = self.outgoing_map.iter().next() else {
                break;
            };
            if key + seg.length_in_sequence_space() as u64 > abs_ackno {
                break;
            }
            let seg = self.outgoing_map.remove(&key).unwrap();
            self.outgoing_bytes -= seg.length_in_sequence_space();
            self.timer.reset();
            newly_acked = true;
        }

        if newly_acked {
            self.timer.consecutive_retx_count = 0;
        }

        self.fill_window();
    }

    /// Advances the retransmission timer. Callers check
    /// [`Sender::consecutive_retransmissions`] against their own threshold
    /// afterward to decide whether to give up on the connection.
    pub fn tick(&mut self, ms: u64) {
        self.timer.elapsed_ms += ms;

        if self.outgoing_map.is_empty() || self.timer.elapsed_ms < self.timer.current_timeout_ms {
            return;
        }

        if let Some((_, seg)) = self.outgoing_map.iter().next() {
            log::debug!("sender: retransmitting segment at {:?}", seg.seqno);
            self.segments_out.push_back(seg.clone());
        }

        if self.last_window_size > 0 {
            self.timer.current_timeout_ms *= 2;
        }
        self.timer.elapsed_ms = 0;
        self.timer.consecutive_retx_count += 1;
    }

    pub fn send_empty_segment(&mut self) {
        let seg = Segment::new(self.next_seqno());
        self.segments_out.push_back(seg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(capacity: usize, rto: u64) -> Sender {
        Sender::new(capacity, rto, Some(Seqno::new(0)))
    }

    #[test]
    fn fill_window_sends_syn_first() {
        let mut s = sender(1000, 1000);
        s.fill_window();
        let seg = s.segments_out().pop_front().unwrap();
        assert!(seg.flags.syn);
        assert_eq!(seg.seqno, Seqno::new(0));
        assert_eq!(s.bytes_in_flight(), 1);
    }

    #[test]
    fn zero_window_probes_a_single_byte() {
        let mut s = sender(1000, 1000);
        s.fill_window();
        s.segments_out().clear();
        s.ack_received(Seqno::new(1), 0);
        s.stream_in().write(b"0123456789");
        s.fill_window();

        let sent: usize = s.segments_out().iter().map(|seg| seg.payload.len()).sum();
        assert_eq!(sent, 1);
    }

    #[test]
    fn retransmission_backs_off_exponentially() {
        let mut s = sender(1000, 1000);
        s.stream_in().write(b"abc");
        s.fill_window();
        s.segments_out().clear();

        s.tick(999);
        assert_eq!(s.consecutive_retransmissions(), 0);

        s.tick(1);
        assert_eq!(s.consecutive_retransmissions(), 1);
        assert_eq!(s.timer.current_timeout_ms, 2000);

        s.tick(2000);
        assert_eq!(s.consecutive_retransmissions(), 2);
        assert_eq!(s.timer.current_timeout_ms, 4000);
    }

    #[test]
    fn zero_window_probe_does_not_back_off() {
        let mut s = sender(1000, 1000);
        s.fill_window();
        s.ack_received(Seqno::new(1), 0);
        s.stream_in().write(b"0123456789");
        s.fill_window();
        s.segments_out().clear();

        s.tick(1000);
        assert_eq!(s.timer.current_timeout_ms, 1000);
    }

    #[test]
    fn duplicate_ack_does_not_clear_retx_count() {
        let mut s = sender(1000, 1000);
        s.stream_in().write(b"abc");
        s.fill_window();
        s.segments_out().clear();
        s.tick(1000);
        assert_eq!(s.consecutive_retransmissions(), 1);

        // Same window, nothing newly acked: must not reset the retx count.
        s.ack_received(Seqno::new(0), 1000);
        assert_eq!(s.consecutive_retransmissions(), 1);
    }
}
