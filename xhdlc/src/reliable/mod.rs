//! Reliable delivery for a stop-and-wait link.
//!
//! - SendTracker / ReceiveState: sequence assignment, ACK/NACK matching
//!   and duplicate detection
//! - RetransmitScheduler: timeout-based retransmission with a fixed
//!   attempt limit

mod retransmit;
mod tracker;

pub use retransmit::{Action, RetransmitScheduler, RetransmitStats};
pub use tracker::{Classification, InFlight, ReceiveState, SendTracker};
