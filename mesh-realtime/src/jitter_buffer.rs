//! Reorders sequence-numbered real-time audio frames and synthesizes
//! placeholder frames for gaps (packet-loss concealment). There is no
//! single teacher file this is grounded on — the corpus's handshake/session
//! code is all reliable-delivery — so this follows the spec's own
//! operational description directly, in the same `Config`-plus-`Stats`
//! shape the rest of this workspace uses for stateful components.

use std::collections::BTreeMap;

use tracing::trace;

use crate::config::JitterBufferConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterBufferEvent {
    Overflow,
    Underrun,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JitterBufferStats {
    pub received: u64,
    pub played: u64,
    pub dropped: u64,
    pub plc: u64,
}

#[derive(Debug)]
pub struct PushOutcome {
    pub stored: bool,
    pub event: Option<JitterBufferEvent>,
}

#[derive(Debug)]
pub struct PopResult {
    pub frame: Option<Vec<u8>>,
    pub sequence_number: u64,
    pub is_plc: bool,
    pub event: Option<JitterBufferEvent>,
}

pub struct JitterBuffer {
    config: JitterBufferConfig,
    buffer: BTreeMap<u64, Vec<u8>>,
    next_play_seq: Option<u64>,
    stats: JitterBufferStats,
}

impl JitterBuffer {
    pub fn new(config: JitterBufferConfig) -> Self {
        JitterBuffer { config, buffer: BTreeMap::new(), next_play_seq: None, stats: JitterBufferStats::default() }
    }

    /// Stores `frame` at `seq`. Initializes `next_play_seq` to `seq` on the
    /// very first push. Drops (and counts as dropped) frames older than
    /// `next_play_seq`, duplicates of an already-buffered `seq`, and
    /// arrivals that would push the buffer past `max_depth` — the last case
    /// also emits `Overflow`.
    pub fn push(&mut self, frame: Vec<u8>, seq: u64) -> PushOutcome {
        self.stats.received += 1;

        if self.next_play_seq.is_none() {
            self.next_play_seq = Some(seq);
        }
        let next_play_seq = self.next_play_seq.unwrap();

        if seq < next_play_seq {
            trace!(seq, next_play_seq, "dropping frame older than playback cursor");
            self.stats.dropped += 1;
            return PushOutcome { stored: false, event: None };
        }

        if self.buffer.contains_key(&seq) {
            trace!(seq, "dropping duplicate frame");
            self.stats.dropped += 1;
            return PushOutcome { stored: false, event: None };
        }

        if self.buffer.len() >= self.config.max_depth {
            // Drop the newly-arrived frame; the already-buffered set is
            // left untouched so earlier-arriving frames aren't penalized.
            trace!(seq, max_depth = self.config.max_depth, "buffer full, dropping newest frame");
            self.stats.dropped += 1;
            return PushOutcome { stored: false, event: Some(JitterBufferEvent::Overflow) };
        }

        self.buffer.insert(seq, frame);
        PushOutcome { stored: true, event: None }
    }

    /// Returns the frame at the current playback cursor if present, else a
    /// PLC placeholder. Always advances the cursor by one. Emits
    /// `Underrun` when the buffer becomes empty as a result.
    pub fn pop(&mut self) -> PopResult {
        let seq = *self.next_play_seq.get_or_insert(0);
        let frame = self.buffer.remove(&seq);
        let is_plc = frame.is_none();

        if is_plc {
            self.stats.plc += 1;
        } else {
            self.stats.played += 1;
        }
        self.next_play_seq = Some(seq + 1);

        let event = if self.buffer.is_empty() { Some(JitterBufferEvent::Underrun) } else { None };

        PopResult { frame, sequence_number: seq, is_plc, event }
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.len() >= self.config.target_depth
    }

    pub fn stats(&self) -> JitterBufferStats {
        self.stats
    }

    pub fn level(&self) -> usize {
        self.buffer.len()
    }

    /// Drops every buffered frame and resets the playback cursor to
    /// uninitialized. Lifetime stats are left untouched.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.next_play_seq = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Vec<u8> {
        vec![tag; 4]
    }

    #[test]
    fn first_push_initializes_playback_cursor() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default());
        jb.push(frame(1), 100);
        let popped = jb.pop();
        assert_eq!(popped.sequence_number, 100);
        assert!(!popped.is_plc);
        assert_eq!(popped.frame, Some(frame(1)));
    }

    #[test]
    fn gap_produces_plc_frame() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default());
        jb.push(frame(1), 0);
        jb.push(frame(3), 2);

        assert_eq!(jb.pop().sequence_number, 0);
        let plc = jb.pop();
        assert_eq!(plc.sequence_number, 1);
        assert!(plc.is_plc);
        assert!(plc.frame.is_none());
        let resumed = jb.pop();
        assert_eq!(resumed.sequence_number, 2);
        assert!(!resumed.is_plc);
    }

    #[test]
    fn stale_and_duplicate_frames_are_dropped() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default());
        jb.push(frame(1), 5);
        let _ = jb.pop(); // cursor now at 6

        let stale = jb.push(frame(9), 5);
        assert!(!stale.stored);

        jb.push(frame(2), 6);
        let dup = jb.push(frame(3), 6);
        assert!(!dup.stored);

        assert_eq!(jb.stats().dropped, 2);
    }

    #[test]
    fn overflow_drops_newest_and_emits_event() {
        let config = JitterBufferConfig { target_depth: 1, max_depth: 2 };
        let mut jb = JitterBuffer::new(config);
        jb.push(frame(1), 0);
        jb.push(frame(2), 1);
        let overflow = jb.push(frame(3), 2);
        assert!(!overflow.stored);
        assert_eq!(overflow.event, Some(JitterBufferEvent::Overflow));
    }

    #[test]
    fn is_ready_reflects_target_depth() {
        let config = JitterBufferConfig { target_depth: 2, max_depth: 10 };
        let mut jb = JitterBuffer::new(config);
        assert!(!jb.is_ready());
        jb.push(frame(1), 0);
        assert!(!jb.is_ready());
        jb.push(frame(2), 1);
        assert!(jb.is_ready());
    }

    #[test]
    fn underrun_emitted_when_buffer_drains() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default());
        jb.push(frame(1), 0);
        let popped = jb.pop();
        assert_eq!(popped.event, Some(JitterBufferEvent::Underrun));
    }

    #[test]
    fn clear_resets_cursor_but_keeps_stats() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default());
        jb.push(frame(1), 0);
        jb.pop();
        jb.clear();
        assert_eq!(jb.level(), 0);
        assert_eq!(jb.stats().played, 1);

        jb.push(frame(9), 50);
        let popped = jb.pop();
        assert_eq!(popped.sequence_number, 50);
    }

    #[test]
    fn played_dropped_buffered_never_exceeds_received() {
        let mut jb = JitterBuffer::new(JitterBufferConfig { target_depth: 1, max_depth: 3 });
        for seq in 0..10u64 {
            jb.push(frame(seq as u8), seq);
        }
        while jb.level() > 0 {
            jb.pop();
        }
        let stats = jb.stats();
        assert!(stats.played + stats.dropped <= stats.received);
    }
}
