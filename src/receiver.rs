//! Translates wire-level wrapping sequence numbers into stream offsets,
//! drives the [`Reassembler`], and advertises a flow-control window.

use crate::reassembler::Reassembler;
use crate::segment::Segment;
use crate::seqno::Seqno;

#[derive(Debug)]
pub struct Receiver {
    isn: Option<Seqno>,
    reassembler: Reassembler,
}

impl Receiver {
    pub fn new(capacity: usize) -> Self {
        Receiver {
            isn: None,
            reassembler: Reassembler::new(capacity),
        }
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn reassembler_mut(&mut self) -> &mut Reassembler {
        &mut self.reassembler
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    /// Whether the inbound stream has seen its SYN.
    pub fn syn_seen(&self) -> bool {
        self.isn.is_some()
    }

    /// Whether the inbound stream has been fully delivered (FIN consumed).
    pub fn stream_ended(&self) -> bool {
        self.reassembler.output().input_ended()
    }

    pub fn segment_received(&mut self, seg: &Segment) {
        if self.isn.is_none() {
            if !seg.flags.syn {
                log::debug!("receiver: dropping segment before SYN seen");
                return;
            }
            self.isn = Some(seg.seqno);
        }
        let isn = self.isn.unwrap();

        let checkpoint = self.reassembler.output().bytes_written() + 1;
        let absolute_seqno = seg.seqno.unwrap(isn, checkpoint);
        // Wrapping: a non-SYN segment whose seqno unwraps nearest-checkpoint
        // to 0 (corrupted/malformed, not just reordered) must not panic.
        let stream_index = absolute_seqno
            .wrapping_add(seg.flags.syn as u64)
            .wrapping_sub(1);

        self.reassembler
            .push(&seg.payload, stream_index, seg.flags.fin);
    }

    /// `None` until the SYN has been seen.
    pub fn ackno(&self) -> Option<Seqno> {
        let isn = self.isn?;
        let mut delta = self.reassembler.output().bytes_written() + 1;
        if self.stream_ended() {
            delta += 1;
        }
        Some(Seqno::wrap(delta, isn))
    }

    pub fn window_size(&self) -> usize {
        self.reassembler.output().remaining_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Flags;

    fn syn(seqno: u32) -> Segment {
        Segment {
            seqno: Seqno::new(seqno),
            ackno: Seqno::new(0),
            window: 0,
            flags: Flags {
                syn: true,
                ..Default::default()
            },
            payload: Vec::new(),
        }
    }

    fn data(seqno: u32, payload: &[u8], fin: bool) -> Segment {
        Segment {
            seqno: Seqno::new(seqno),
            ackno: Seqno::new(0),
            window: 0,
            flags: Flags {
                fin,
                ..Default::default()
            },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn ignores_data_before_syn() {
        let mut r = Receiver::new(100);
        r.segment_received(&data(5, b"hi", false));
        assert_eq!(r.ackno(), None);
        assert_eq!(r.unassembled_bytes(), 0);
    }

    #[test]
    fn syn_then_data_advances_ackno() {
        let mut r = Receiver::new(100);
        r.segment_received(&syn(100));
        assert_eq!(r.ackno(), Some(Seqno::new(101)));

        r.segment_received(&data(101, b"abc", false));
        assert_eq!(r.ackno(), Some(Seqno::new(104)));
    }

    #[test]
    fn fin_adds_one_more_to_ackno() {
        let mut r = Receiver::new(100);
        r.segment_received(&syn(0));
        r.segment_received(&data(1, b"ab", true));
        assert_eq!(r.ackno(), Some(Seqno::new(4)));
        assert!(r.stream_ended());
    }

    #[test]
    fn window_size_tracks_capacity_minus_buffered() {
        let mut r = Receiver::new(10);
        r.segment_received(&syn(0));
        assert_eq!(r.window_size(), 10);
        r.segment_received(&data(1, b"abc", false));
        assert_eq!(r.window_size(), 7);
    }
}
