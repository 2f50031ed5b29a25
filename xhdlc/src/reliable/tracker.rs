//! Send and receive sequence state for a stop-and-wait link.
//!
//! Timestamps are plain milliseconds supplied by the caller so the same
//! state machine runs under `std` and on bare metal.

use alloc::vec::Vec;

use crate::core::Sequence;

/// The single outstanding DATA frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Sequence the frame was sent with. Retransmissions reuse it.
    pub sequence: Sequence,

    /// Payload, kept so retransmissions are byte-identical.
    pub payload: Vec<u8>,

    /// Transmissions so far, including the first.
    pub attempts: u8,

    /// Timestamp of the first transmission.
    pub first_sent: u64,

    /// When the current attempt times out.
    pub deadline: u64,

    /// The peer asked for this frame again with a NACK.
    pub rejected: bool,
}

/// Sequence assignment and in-flight tracking for outgoing DATA frames.
#[derive(Debug)]
pub struct SendTracker {
    next: Sequence,
    in_flight: Option<InFlight>,
}

impl SendTracker {
    pub const fn new() -> Self {
        Self {
            next: Sequence::FIRST,
            in_flight: None,
        }
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn in_flight_mut(&mut self) -> Option<&mut InFlight> {
        self.in_flight.as_mut()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Assigns the next sequence to `payload` and records it as in flight.
    ///
    /// A frame still in flight is abandoned first.
    pub fn begin(&mut self, payload: Vec<u8>, now: u64) -> Sequence {
        if self.abandon().is_some() {
            log::debug!("replacing unfinished frame");
        }

        let sequence = self.next;
        self.next = sequence.next();
        self.in_flight = Some(InFlight {
            sequence,
            payload,
            attempts: 0,
            first_sent: now,
            deadline: now,
            rejected: false,
        });

        log::trace!("frame {} in flight", sequence);
        sequence
    }

    /// Handles an ACK carrying N(R) = `next_expected`.
    ///
    /// Returns the retired record when the ACK covers the in-flight frame.
    /// Late or unknown ACKs are ignored.
    pub fn on_ack(&mut self, next_expected: Sequence) -> Option<InFlight> {
        match &self.in_flight {
            Some(frame) if frame.sequence.next() == next_expected => {
                log::trace!("frame {} acknowledged", frame.sequence);
                self.in_flight.take()
            }
            _ => {
                log::trace!("ignoring ACK {}", next_expected);
                None
            }
        }
    }

    /// Handles a NACK asking for `requested`. Returns true if it names the
    /// in-flight frame, which is then flagged for immediate retransmission.
    pub fn on_nack(&mut self, requested: Sequence) -> bool {
        match &mut self.in_flight {
            Some(frame) if frame.sequence == requested => {
                log::debug!("frame {} rejected by peer", requested);
                frame.rejected = true;
                true
            }
            _ => false,
        }
    }

    /// Drops the in-flight record without retrying.
    ///
    /// The sequence is handed out again by the next `begin`, since the peer
    /// may never have seen it and would drop anything numbered after it.
    pub fn abandon(&mut self) -> Option<InFlight> {
        let frame = self.in_flight.take()?;
        self.next = frame.sequence;
        Some(frame)
    }
}

impl Default for SendTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// How an incoming DATA frame relates to the receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The expected frame, or the last delivered sequence reused for a
    /// different payload after the sender gave up on it. Deliver and
    /// acknowledge.
    New,

    /// A repeat of the last delivered frame. Acknowledge, do not deliver.
    Duplicate,

    /// Anything else. Drop silently.
    Unexpected,
}

/// Receive-side sequence state. Only the receive path touches it.
#[derive(Debug, Clone)]
pub struct ReceiveState {
    expected: Sequence,
    last_delivered: Option<Sequence>,
    last_payload: Vec<u8>,
}

impl ReceiveState {
    pub const fn new() -> Self {
        Self {
            expected: Sequence::FIRST,
            last_delivered: None,
            last_payload: Vec::new(),
        }
    }

    pub const fn expected(&self) -> Sequence {
        self.expected
    }

    /// A sender that ran out of attempts reuses the failed sequence for its
    /// next frame. If the failed frame did arrive (only its ACKs were lost),
    /// the reused sequence shows up again with a different payload.
    pub fn classify(&self, sequence: Sequence, payload: &[u8]) -> Classification {
        if sequence == self.expected {
            Classification::New
        } else if self.last_delivered != Some(sequence) {
            Classification::Unexpected
        } else if payload == self.last_payload.as_slice() {
            Classification::Duplicate
        } else {
            Classification::New
        }
    }

    /// Records delivery of `sequence` and returns the N(R) to acknowledge with.
    pub fn accept(&mut self, sequence: Sequence, payload: &[u8]) -> Sequence {
        self.last_delivered = Some(sequence);
        self.last_payload.clear();
        self.last_payload.extend_from_slice(payload);
        self.expected = sequence.next();
        self.expected
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ReceiveState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_begin_assigns_wrapping_sequences() {
        let mut tracker = SendTracker::new();
        let mut seen = Vec::new();
        for _ in 0..9 {
            let seq = tracker.begin(vec![1], 0);
            seen.push(seq.value());
            tracker.on_ack(seq.next()).unwrap();
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 0, 1]);
    }

    #[test]
    fn test_begin_replaces_unfinished_frame() {
        let mut tracker = SendTracker::new();
        let first = tracker.begin(vec![1], 0);
        let second = tracker.begin(vec![2], 5);
        assert_eq!(first, second);
        assert_eq!(tracker.in_flight().unwrap().payload, vec![2]);
    }

    #[test]
    fn test_ack_matching() {
        let mut tracker = SendTracker::new();
        let seq = tracker.begin(vec![1, 2, 3], 10);

        // N(R) equal to the frame's own sequence does not cover it.
        assert!(tracker.on_ack(seq).is_none());
        assert!(!tracker.is_idle());

        let retired = tracker.on_ack(seq.next()).unwrap();
        assert_eq!(retired.payload, vec![1, 2, 3]);
        assert!(tracker.is_idle());

        // Late duplicate.
        assert!(tracker.on_ack(seq.next()).is_none());
    }

    #[test]
    fn test_nack_matching() {
        let mut tracker = SendTracker::new();
        let seq = tracker.begin(vec![1], 0);

        assert!(!tracker.on_nack(seq.next()));
        assert!(tracker.on_nack(seq));
        assert!(tracker.in_flight().unwrap().rejected);
    }

    #[test]
    fn test_abandon_reuses_sequence() {
        let mut tracker = SendTracker::new();
        let first = tracker.begin(vec![1], 0);
        tracker.on_ack(first.next()).unwrap();

        let failed = tracker.begin(vec![2], 0);
        assert_eq!(failed, first.next());
        assert_eq!(tracker.abandon().unwrap().sequence, failed);
        assert!(tracker.abandon().is_none());

        assert_eq!(tracker.begin(vec![3], 0), failed);
    }

    #[test]
    fn test_receive_classification() {
        let mut rx = ReceiveState::new();
        assert_eq!(rx.classify(Sequence::new(1), b"a"), Classification::New);
        assert_eq!(rx.classify(Sequence::new(0), b"a"), Classification::Unexpected);

        assert_eq!(rx.accept(Sequence::new(1), b"a"), Sequence::new(2));
        assert_eq!(rx.classify(Sequence::new(1), b"a"), Classification::Duplicate);
        assert_eq!(rx.classify(Sequence::new(2), b"a"), Classification::New);
        assert_eq!(rx.classify(Sequence::new(5), b"a"), Classification::Unexpected);
    }

    #[test]
    fn test_reused_sequence_with_new_payload_is_delivered() {
        let mut rx = ReceiveState::new();
        rx.accept(Sequence::new(1), b"lost ack");

        // Sender gave up on 1 and sent its next frame under the same number.
        assert_eq!(rx.classify(Sequence::new(1), b"next"), Classification::New);
        assert_eq!(rx.accept(Sequence::new(1), b"next"), Sequence::new(2));
        assert_eq!(rx.classify(Sequence::new(1), b"next"), Classification::Duplicate);
        assert_eq!(rx.classify(Sequence::new(1), b"lost ack"), Classification::New);
    }

    #[test]
    fn test_receive_wraps() {
        let mut rx = ReceiveState::new();
        for value in [1, 2, 3, 4, 5, 6, 7, 0, 1] {
            let seq = Sequence::new(value);
            assert_eq!(rx.classify(seq, &[value]), Classification::New);
            rx.accept(seq, &[value]);
        }
        assert_eq!(rx.expected(), Sequence::new(2));
    }
}
