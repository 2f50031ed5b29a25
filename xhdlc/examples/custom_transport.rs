//! Custom transport implementation example.
//!
//! Wraps one end of an in-memory link in a transport that drops and
//! corrupts writes, then shows the session recovering through
//! retransmission and duplicate suppression.
//!
//! Run with: cargo run --example custom_transport

use std::thread;
use std::time::Duration;

use xhdlc::error::Result;
use xhdlc::transport::memory::{self, MemoryTransport};
use xhdlc::transport::Transport;
use xhdlc::{Decoded, Decoder, Encoder, Fcs16, FrameKind, Sequence, SessionBuilder};

/// A transport that randomly drops or corrupts whole writes.
///
/// Every session write is one complete frame, so a dropped write is a
/// lost frame.
pub struct UnreliableTransport<T> {
    inner: T,

    /// Loss probability (0.0 - 1.0).
    loss_rate: f32,

    /// Corruption probability (0.0 - 1.0).
    corruption_rate: f32,

    /// Simple counter for pseudo-random behavior.
    counter: u32,

    frames_dropped: usize,
    frames_corrupted: usize,
    frames_delivered: usize,
}

impl<T: Transport> UnreliableTransport<T> {
    pub fn new(inner: T, loss_rate: f32, corruption_rate: f32, seed: u32) -> Self {
        Self {
            inner,
            loss_rate,
            corruption_rate,
            counter: seed,
            frames_dropped: 0,
            frames_corrupted: 0,
            frames_delivered: 0,
        }
    }

    /// Simple pseudo-random number generator (0.0 - 1.0).
    fn random(&mut self) -> f32 {
        self.counter = self.counter.wrapping_mul(1103515245).wrapping_add(12345);
        ((self.counter >> 16) & 0x7fff) as f32 / 32767.0
    }

    /// Returns (dropped, corrupted, delivered).
    pub fn stats(&self) -> (usize, usize, usize) {
        (self.frames_dropped, self.frames_corrupted, self.frames_delivered)
    }
}

impl<T: Transport> Transport for UnreliableTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.random() < self.loss_rate {
            self.frames_dropped += 1;
            return Ok(buf.len());
        }

        let mut data = buf.to_vec();
        if self.random() < self.corruption_rate && data.len() > 2 {
            self.frames_corrupted += 1;
            // Keep the delimiting flags intact, flip one body bit.
            let last = data.len() - 2;
            let pos = 1 + (self.random() * last as f32) as usize;
            data[pos.min(last)] ^= 0x08;
        }

        self.frames_delivered += 1;
        self.inner.write_all(&data)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

fn fcs_demo() {
    println!("1. Frame integrity with FCS-16:");

    let encoder = Encoder::default();
    let mut wire = encoder
        .encode(FrameKind::Data, Sequence::FIRST, b"Test data")
        .expect("encode");
    println!("   Encoded frame: {} bytes", wire.len());
    println!("   FCS of \"123456789\": {:#06x}", Fcs16::compute(b"123456789"));

    let mut decoder = Decoder::new(256);
    match decoder.decode(&wire).0 {
        Decoded::Frame(frame) => println!("   Intact: valid frame, seq={}", frame.sequence),
        other => println!("   Intact: {:?}", other),
    }

    wire[4] ^= 0x01;
    match decoder.decode(&wire).0 {
        Decoded::Frame(frame) => println!("   Corrupted: unexpectedly valid, seq={}", frame.sequence),
        Decoded::Discarded(err) => println!("   Corrupted: discarded - {}", err),
        Decoded::NeedMoreData => println!("   Corrupted: incomplete"),
    }
    println!();
}

fn lossy_link_demo() {
    println!("2. Sessions over a lossy link (20% loss, 10% corruption):");

    let (a, b): (MemoryTransport, MemoryTransport) = memory::duplex();
    let sender = SessionBuilder::new()
        .buffer_size(64)
        .timeout_ms(20)
        .retries(10)
        .build(UnreliableTransport::new(a, 0.2, 0.1, 12345))
        .expect("sender");
    let receiver = SessionBuilder::new()
        .buffer_size(64)
        .build(UnreliableTransport::new(b, 0.2, 0.1, 54321))
        .expect("receiver");

    let messages: Vec<String> = (0..20).map(|i| format!("Packet {}", i)).collect();
    let mut received = Vec::new();

    thread::scope(|s| {
        s.spawn(|| {
            for message in &messages {
                if let Err(e) = sender.write(message.as_bytes()) {
                    println!("   write failed: {}", e);
                }
            }
        });

        let mut buf = [0u8; 64];
        let mut idle = 0;
        while received.len() < messages.len() && idle < 2000 {
            let n = receiver.read(&mut buf).expect("read");
            if n == 0 {
                idle += 1;
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            idle = 0;
            received.push(String::from_utf8_lossy(&buf[..n]).into_owned());
        }
    });

    let in_order = received.iter().zip(&messages).all(|(a, b)| a == b);
    let sent = sender.stats();
    let got = receiver.stats();

    println!("   Messages sent: {}", messages.len());
    println!("   Messages received: {} (in order: {})", received.len(), in_order);
    println!("   Retransmissions: {}", sent.retransmit.retransmissions);
    println!("   Duplicates suppressed: {}", got.duplicates);
    println!("   Corrupt frames discarded: {}", got.corrupt_frames + sent.corrupt_frames);
}

fn main() {
    env_logger::init();
    println!("=== xhdlc Custom Transport Example ===\n");

    fcs_demo();
    lossy_link_demo();
}
