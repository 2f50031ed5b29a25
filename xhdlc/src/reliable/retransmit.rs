//! Timeout-driven retransmission of the in-flight frame.
//!
//! The scheduler never touches the transport. It tells the caller what to
//! do next, and the caller re-sends or gives up.

use super::tracker::{InFlight, SendTracker};
use crate::core::Sequence;

/// Statistics about retransmission behavior.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitStats {
    /// First transmissions.
    pub frames_sent: u64,

    /// Repeat transmissions after a timeout or NACK.
    pub retransmissions: u64,

    /// Frames abandoned after the last attempt.
    pub failed_frames: u64,

    /// Frames retired by a matching ACK.
    pub successful_deliveries: u64,

    /// Time from first transmission to ACK for the last delivered frame.
    pub last_rtt_ms: Option<u64>,
}

impl RetransmitStats {
    pub const fn new() -> Self {
        Self {
            frames_sent: 0,
            retransmissions: 0,
            failed_frames: 0,
            successful_deliveries: 0,
            last_rtt_ms: None,
        }
    }

    /// Returns the retransmission rate as a percentage.
    pub fn retransmit_rate(&self) -> f32 {
        if self.frames_sent == 0 {
            0.0
        } else {
            (self.retransmissions as f32 / self.frames_sent as f32) * 100.0
        }
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f32 {
        let total = self.successful_deliveries + self.failed_frames;
        if total == 0 {
            100.0
        } else {
            (self.successful_deliveries as f32 / total as f32) * 100.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// What the sender should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing is in flight.
    Idle,

    /// Keep waiting for an ACK until `deadline`.
    Wait { deadline: u64 },

    /// Send the in-flight frame again.
    Retransmit { sequence: Sequence },

    /// The last attempt expired. The record has been dropped.
    Exhausted { sequence: Sequence, attempts: u8 },
}

/// Arms deadlines and decides between waiting, retrying and giving up.
#[derive(Debug)]
pub struct RetransmitScheduler {
    attempt_timeout: u64,
    max_attempts: u8,
    stats: RetransmitStats,
}

impl RetransmitScheduler {
    /// `max_attempts` counts every transmission including the first.
    pub const fn new(attempt_timeout: u64, max_attempts: u8) -> Self {
        Self {
            attempt_timeout,
            max_attempts,
            stats: RetransmitStats::new(),
        }
    }

    /// Counts a transmission of `frame` made at `now` and arms its deadline.
    pub fn arm(&mut self, frame: &mut InFlight, now: u64) {
        frame.attempts = frame.attempts.saturating_add(1);
        frame.deadline = now.saturating_add(self.attempt_timeout);
        frame.rejected = false;

        if frame.attempts == 1 {
            self.stats.frames_sent += 1;
        } else {
            self.stats.retransmissions += 1;
            log::debug!(
                "retransmitting frame {} (attempt {}/{})",
                frame.sequence,
                frame.attempts,
                self.max_attempts
            );
        }
    }

    /// Decides the next step for whatever `tracker` has in flight.
    ///
    /// A NACKed frame is retried at once. An expired frame is retried while
    /// attempts remain, otherwise it is removed from `tracker`.
    pub fn poll(&mut self, tracker: &mut SendTracker, now: u64) -> Action {
        let Some(frame) = tracker.in_flight() else {
            return Action::Idle;
        };

        if !frame.rejected && now < frame.deadline {
            return Action::Wait {
                deadline: frame.deadline,
            };
        }

        let sequence = frame.sequence;
        let attempts = frame.attempts;
        if attempts < self.max_attempts {
            return Action::Retransmit { sequence };
        }

        tracker.abandon();
        self.stats.failed_frames += 1;
        log::warn!("frame {} failed after {} attempts", sequence, attempts);
        Action::Exhausted { sequence, attempts }
    }

    /// Records a retired frame and returns its round-trip time.
    pub fn record_delivery(&mut self, frame: &InFlight, now: u64) -> u64 {
        let rtt = now.saturating_sub(frame.first_sent);
        self.stats.successful_deliveries += 1;
        self.stats.last_rtt_ms = Some(rtt);
        rtt
    }

    pub const fn stats(&self) -> &RetransmitStats {
        &self.stats
    }
}
