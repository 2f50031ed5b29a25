//! # xhdlc - HDLC Framing with Stop-and-Wait ARQ
//!
//! xhdlc is a `no_std` compatible implementation of an HDLC-family link
//! protocol that provides:
//!
//! - **Flag delimited framing**: `0x7E` flags with `0x7D` byte stuffing
//! - **Integrity check**: FCS-16 over address, control and payload
//! - **Reliable delivery**: one frame in flight, ACK/NACK, timed retries
//! - **Duplicate suppression**: a repeated frame is acknowledged, not redelivered
//! - **Custom transport support**: works with any byte pipe implementing [`Transport`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! ├─────────────────────────────────────────────────────────┤
//! │              Session (read / write / close)              │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ SendTracker │ │ Retransmit  │ │  ReceiveState   │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Frame Layer                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ Byte stuff  │ │   FCS-16    │ │ Control / N(S)  │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Transport Layer                       │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │            Custom Transport (Read/Write)         │   │
//! │  └─────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The frame layer and the reliable state machines build without `std`.
//! [`Session`] needs threads and clocks and is only available with the
//! `std` feature (on by default).
//!
//! ## Example
//!
//! ```rust,ignore
//! use xhdlc::{SessionBuilder, transport::StdTransport};
//!
//! let port = serialport::new("/dev/ttyUSB0", 115_200).open()?;
//! let session = SessionBuilder::new()
//!     .buffer_size(256)
//!     .timeout_ms(100)
//!     .retries(3)
//!     .build(StdTransport::new(port))?;
//!
//! session.write(b"Hello, World!")?;
//!
//! let mut buf = [0u8; 256];
//! let n = session.read(&mut buf)?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod core;
pub mod error;
pub mod reliable;
#[cfg(feature = "std")]
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use crate::core::{BROADCAST_ADDRESS, Decoded, Decoder, Encoder, Fcs16, Frame, FrameError, FrameKind, Sequence};
pub use config::{Config, DeadlinePolicy};
pub use error::{Error, Result};
#[cfg(feature = "std")]
pub use session::{Session, SessionBuilder, SessionStats};
pub use transport::Transport;

/// Default maximum payload per frame, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Default retransmission timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Default number of transmissions per write.
pub const DEFAULT_RETRIES: u8 = 1;

/// Default interval at which a blocked write polls the transport.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1;
