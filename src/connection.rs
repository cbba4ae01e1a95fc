//! The joint state machine: owns a [`Sender`] and [`Receiver`], decides when
//! segments need acks stamped onto them, and when the connection is done.

use std::collections::VecDeque;

use crate::config::{Config, LINGER_MULTIPLIER};
use crate::receiver::Receiver;
use crate::segment::Segment;
use crate::sender::Sender;
use crate::seqno::Seqno;

#[derive(Debug)]
pub struct Connection {
    sender: Sender,
    receiver: Receiver,
    config: Config,
    active: bool,
    /// Whether to linger in TIME_WAIT after both streams finish. Cleared the
    /// moment we know the peer already lingered for us (we got a clean FIN
    /// after having sent ours first).
    linger_after_streams_finish: bool,
    time_since_last_segment_ms: u64,
    segments_out: VecDeque<Segment>,
}

impl Connection {
    pub fn new(config: Config) -> Self {
        Connection {
            sender: Sender::new(config.capacity, config.initial_rto_ms, None),
            receiver: Receiver::new(config.capacity),
            config,
            active: true,
            linger_after_streams_finish: true,
            time_since_last_segment_ms: 0,
            segments_out: VecDeque::new(),
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in_ref().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> usize {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_ms
    }

    pub fn segments_out(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    pub fn inbound_stream(&self) -> &crate::byte_stream::ByteStream {
        self.receiver.reassembler().output()
    }

    /// Opens the connection: sends the initial SYN.
    pub fn connect(&mut self) {
        self.sender.fill_window();
        self.flush_sender();
    }

    /// Queues `data` for transmission. Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let written = self.sender.stream_in().write(data);
        self.sender.fill_window();
        self.flush_sender();
        written
    }

    pub fn end_input_stream(&mut self) {
        self.sender.stream_in().end_input();
        self.sender.fill_window();
        self.flush_sender();
    }

    pub fn segment_received(&mut self, seg: &Segment) {
        self.time_since_last_segment_ms = 0;
        let mut need_ack = seg.length_in_sequence_space() > 0;

        self.receiver.segment_received(seg);

        if seg.flags.rst {
            log::warn!("connection: received RST, aborting");
            self.peer_abort();
            return;
        }

        if seg.flags.ack {
            let queued_before = self.sender.segments_out().len();
            self.sender.ack_received(seg.ackno, seg.window);
            if need_ack && self.sender.segments_out().len() > queued_before {
                need_ack = false;
            }
        }

        if self.receiver.syn_seen() && !self.sender.syn_sent() {
            // Passive open: our SYN doubles as the SYN+ACK.
            self.connect();
            return;
        }

        // The peer closed before we even sent our own FIN: a passive close
        // we shouldn't linger in TIME_WAIT for.
        if self.receiver.stream_ended() && !self.sender.fin_sent() {
            self.linger_after_streams_finish = false;
        }

        if self.receiver.stream_ended() && self.sender.fin_acked() && !self.linger_after_streams_finish {
            self.active = false;
            return;
        }

        // Any segment occupying sequence space must be acknowledged, even if
        // we otherwise have nothing new to say.
        if need_ack && self.sender.segments_out().is_empty() {
            self.sender.send_empty_segment();
        }

        self.flush_sender();
    }

    pub fn tick(&mut self, ms: u64) {
        self.sender.tick(ms);

        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts {
            self.sender.segments_out().pop_back();
            self.local_abort();
            return;
        }

        self.flush_sender();
        self.time_since_last_segment_ms += ms;

        let linger_budget = LINGER_MULTIPLIER as u64 * self.config.initial_rto_ms;
        if self.receiver.stream_ended()
            && self.sender.fin_acked()
            && self.linger_after_streams_finish
            && self.time_since_last_segment_ms >= linger_budget
        {
            self.active = false;
            self.linger_after_streams_finish = false;
        }
    }

    /// Incoming RST: both streams are marked errored, no reply is sent.
    fn peer_abort(&mut self) {
        self.sender.stream_in().set_error();
        self.receiver.reassembler_mut().output_mut().set_error();
        self.linger_after_streams_finish = false;
        self.active = false;
    }

    /// Excessive retransmissions: both streams are marked errored and an
    /// outbound RST is queued.
    fn local_abort(&mut self) {
        log::warn!(
            "connection: giving up after {} consecutive retransmissions",
            self.sender.consecutive_retransmissions()
        );
        self.sender.send_empty_segment();
        if let Some(seg) = self.sender.segments_out().back_mut() {
            seg.flags.rst = true;
        }
        self.sender.stream_in().set_error();
        self.receiver.reassembler_mut().output_mut().set_error();
        self.linger_after_streams_finish = false;
        self.active = false;
        self.flush_sender();
    }

    /// Moves every segment the sender queued up into our outbound queue,
    /// stamping ack/window/rst fields the sender itself has no opinion on.
    fn flush_sender(&mut self) {
        while let Some(mut seg) = self.sender.segments_out().pop_front() {
            if let Some(ackno) = self.receiver.ackno() {
                seg.ackno = ackno;
                seg.flags.ack = true;
            }
            seg.window = self.receiver.window_size().min(u16::MAX as usize) as u16;
            self.segments_out.push_back(seg);
        }
    }

    #[cfg(test)]
    fn new_with_isn(config: Config, isn: Seqno) -> Self {
        Connection {
            sender: Sender::new(config.capacity, config.initial_rto_ms, Some(isn)),
            receiver: Receiver::new(config.capacity),
            config,
            active: true,
            linger_after_streams_finish: true,
            time_since_last_segment_ms: 0,
            segments_out: VecDeque::new(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.active {
            log::debug!("connection: dropped while still active, sending RST");
            self.local_abort();
        }
    }
}
