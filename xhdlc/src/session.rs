//! Session facade: `read`, `write` and `close` over one transport.
//!
//! Protocol state and the transport sit behind separate mutexes. Transport
//! reads happen with only the transport locked, so a slow read never holds
//! up `close`, statistics or a writer waiting for its deadline. When two
//! threads lock both, the transport is always taken first.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use crate::config::{Config, DeadlinePolicy};
use crate::core::{
    Decoded, Decoder, Encoder, FRAME_OVERHEAD, Frame, FrameError, FrameKind, Sequence,
    SupervisoryFrame,
};
use crate::error::{Error, Result};
use crate::reliable::{
    Action, Classification, ReceiveState, RetransmitScheduler, RetransmitStats, SendTracker,
};
use crate::transport::Transport;

/// Counters for one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Writes that ended with a matching ACK.
    pub writes_completed: u64,

    /// Writes that ran out of attempts.
    pub writes_failed: u64,

    /// Payload bytes acknowledged by the peer.
    pub bytes_sent: u64,

    /// DATA frames delivered to the read buffer.
    pub frames_received: u64,

    /// Payload bytes delivered to the read buffer.
    pub bytes_received: u64,

    /// DATA frames recognised as repeats and acknowledged again.
    pub duplicates: u64,

    /// DATA frames with an unexpected sequence.
    pub out_of_order: u64,

    /// Frames dropped by the decoder.
    pub corrupt_frames: u64,

    /// Frames for another station.
    pub filtered: u64,

    /// New DATA frames dropped because the read buffer was full.
    pub overruns: u64,

    /// Send-side attempt counters.
    pub retransmit: RetransmitStats,
}

/// The transport and its receive scratch buffer.
struct Port<T> {
    transport: Option<T>,
    chunk: Vec<u8>,
}

/// Protocol state. Never held across transport I/O.
struct Link {
    closed: bool,
    encoder: Encoder,
    decoder: Decoder,
    tracker: SendTracker,
    scheduler: RetransmitScheduler,
    receive: ReceiveState,
    inbox: VecDeque<u8>,
    replies: Vec<SupervisoryFrame>,
    stats: SessionStats,
    address: u8,
    read_capacity: usize,
    nack_on_corruption: bool,
}

impl Link {
    fn new(config: &Config) -> Self {
        Self {
            closed: false,
            encoder: Encoder::new(config.address, config.buffer_size),
            decoder: Decoder::new(config.buffer_size),
            tracker: SendTracker::new(),
            scheduler: RetransmitScheduler::new(config.attempt_timeout_ms(), config.retries),
            receive: ReceiveState::new(),
            inbox: VecDeque::with_capacity(config.read_capacity),
            replies: Vec::new(),
            stats: SessionStats::default(),
            address: config.address,
            read_capacity: config.read_capacity,
            nack_on_corruption: config.nack_on_corruption,
        }
    }

    /// Encodes the in-flight frame and arms its deadline.
    fn stage_data(&mut self, now: u64) -> Result<Vec<u8>> {
        let Some(frame) = self.tracker.in_flight_mut() else {
            return Ok(Vec::new());
        };
        let wire = self
            .encoder
            .encode(FrameKind::Data, frame.sequence, &frame.payload)?;
        self.scheduler.arm(frame, now);

        log::trace!("sending DATA {} ({} bytes)", frame.sequence, wire.len());
        Ok(wire)
    }

    fn queue_reply(&mut self, kind: FrameKind, sequence: Sequence) {
        log::trace!("sending {:?} {}", kind, sequence);
        let wire = self.encoder.encode_supervisory(kind, sequence);
        self.replies.push(wire);
    }

    /// Handles every frame completed by `src`.
    ///
    /// Returns true if the in-flight frame was acknowledged or rejected.
    fn process(&mut self, mut src: &[u8], now: u64) -> bool {
        let mut progress = false;

        while !src.is_empty() {
            let (decoded, consumed) = self.decoder.decode(src);
            src = &src[consumed..];

            match decoded {
                Decoded::Frame(frame) => progress |= self.dispatch(frame, now),
                Decoded::Discarded(err) => self.on_discard(err),
                Decoded::NeedMoreData => break,
            }
        }

        progress
    }

    fn dispatch(&mut self, frame: Frame, now: u64) -> bool {
        if !frame.is_addressed_to(self.address) {
            log::trace!("ignoring frame for station {:#04x}", frame.address);
            self.stats.filtered += 1;
            return false;
        }

        match frame.kind {
            FrameKind::Data => {
                self.on_data(frame);
                false
            }
            FrameKind::Ack => match self.tracker.on_ack(frame.sequence) {
                Some(retired) => {
                    let rtt = self.scheduler.record_delivery(&retired, now);
                    log::trace!("frame {} acknowledged after {} ms", retired.sequence, rtt);
                    true
                }
                None => false,
            },
            FrameKind::Nack => self.tracker.on_nack(frame.sequence),
        }
    }

    fn on_data(&mut self, frame: Frame) {
        match self.receive.classify(frame.sequence, &frame.payload) {
            Classification::New => {
                if self.inbox.len() + frame.payload.len() > self.read_capacity {
                    // No ACK: the peer retries once the reader catches up.
                    log::debug!("read buffer full, dropping DATA {}", frame.sequence);
                    self.stats.overruns += 1;
                    return;
                }

                self.stats.frames_received += 1;
                self.stats.bytes_received += frame.payload.len() as u64;
                let next = self.receive.accept(frame.sequence, &frame.payload);
                self.inbox.extend(frame.payload);
                self.queue_reply(FrameKind::Ack, next);
            }
            Classification::Duplicate => {
                log::debug!("duplicate DATA {}, acknowledging again", frame.sequence);
                self.stats.duplicates += 1;
                let next = self.receive.expected();
                self.queue_reply(FrameKind::Ack, next);
            }
            Classification::Unexpected => {
                log::debug!(
                    "unexpected DATA {} (expected {}), dropped",
                    frame.sequence,
                    self.receive.expected()
                );
                self.stats.out_of_order += 1;
            }
        }
    }

    fn on_discard(&mut self, err: FrameError) {
        log::warn!("discarding frame: {}", err);
        self.stats.corrupt_frames += 1;

        if self.nack_on_corruption && err.is_damaged_data(self.address) {
            let expected = self.receive.expected();
            self.queue_reply(FrameKind::Nack, expected);
        }
    }

    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.inbox.len());
        for (dst, src) in buf.iter_mut().zip(self.inbox.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn shutdown(&mut self) {
        if let Some(frame) = self.tracker.abandon() {
            log::debug!("abandoning frame {} on close", frame.sequence);
        }
        self.closed = true;
        self.decoder.reset();
        self.receive.reset();
        self.inbox.clear();
        self.replies.clear();
    }
}

/// A reliable point-to-point link over a [`Transport`].
///
/// One frame is in flight at a time. `write` blocks until the peer
/// acknowledges it or every attempt has timed out. `read` returns bytes
/// already delivered and never waits beyond one transport read.
///
/// The session is `Sync` when the transport is `Send`: one thread may sit
/// in `write` while another reads or closes. `close` returns without
/// waiting for a transport read in progress. A write waiting on its
/// deadline fails at once; a write that is itself inside a transport read
/// fails when that read returns (see [`Transport::read`]).
///
/// # Example
///
/// ```rust
/// use xhdlc::transport::memory;
/// use xhdlc::SessionBuilder;
///
/// let (a, b) = memory::duplex();
/// let alice = SessionBuilder::new().timeout_ms(200).build(a).unwrap();
/// let bob = SessionBuilder::new().timeout_ms(200).build(b).unwrap();
///
/// std::thread::scope(|s| {
///     s.spawn(|| {
///         let mut buf = [0u8; 16];
///         loop {
///             let n = bob.read(&mut buf).unwrap();
///             if n > 0 {
///                 assert_eq!(&buf[..n], b"hello");
///                 break;
///             }
///         }
///     });
///     assert_eq!(alice.write(b"hello").unwrap(), 5);
/// });
/// ```
pub struct Session<T: Transport> {
    config: Config,
    write_lock: Mutex<()>,
    port: Mutex<Port<T>>,
    link: Mutex<Link>,
    signal: Condvar,
    epoch: Instant,
}

impl<T: Transport> Session<T> {
    /// Binds a session to `transport`.
    pub fn new(transport: T, config: Config) -> Result<Self> {
        config.validate()?;

        log::debug!(
            "session open: buffer_size={} timeout={}ms retries={} address={:#04x}",
            config.buffer_size,
            config.timeout_ms,
            config.retries,
            config.address
        );

        // Room for one fully stuffed frame per transport read.
        let chunk_size = 2 + 2 * (config.buffer_size + FRAME_OVERHEAD);

        Ok(Self {
            port: Mutex::new(Port {
                transport: Some(transport),
                chunk: vec![0u8; chunk_size],
            }),
            link: Mutex::new(Link::new(&config)),
            config,
            write_lock: Mutex::new(()),
            signal: Condvar::new(),
            epoch: Instant::now(),
        })
    }

    pub fn with_defaults(transport: T) -> Result<Self> {
        Self::new(transport, Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.lock_link().closed
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        let link = self.lock_link();
        SessionStats {
            retransmit: *link.scheduler.stats(),
            ..link.stats
        }
    }

    /// Bytes delivered and waiting to be read.
    pub fn available(&self) -> usize {
        self.lock_link().inbox.len()
    }

    /// Sends `payload` as one DATA frame and waits for its ACK.
    ///
    /// Returns the payload length once acknowledged. Fails with
    /// `TransmissionFailed` when every attempt times out; the session stays
    /// usable and the next write reuses the failed sequence. Concurrent
    /// writers are served one at a time.
    pub fn write(&self, payload: &[u8]) -> Result<usize> {
        let _serial = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let (sequence, wire) = {
            let mut link = self.lock_link();

            if link.closed {
                return Err(Error::NotConnected);
            }
            if payload.len() > self.config.buffer_size {
                return Err(Error::PayloadTooLarge {
                    size: payload.len(),
                    max: self.config.buffer_size,
                });
            }
            if payload.is_empty() {
                return Err(Error::EmptyPayload);
            }

            let now = self.now_ms();
            let sequence = link.tracker.begin(payload.to_vec(), now);
            match link.stage_data(now) {
                Ok(wire) => (sequence, wire),
                Err(e) => {
                    link.tracker.abandon();
                    return Err(e);
                }
            }
        };
        self.send(&wire).map_err(|e| self.abandon(e))?;

        loop {
            // Another thread already inside a transport read signals once
            // it sees the answer.
            if let Some(mut port) = self.try_lock_port() {
                if let Err(e) = self.pump(&mut port) {
                    drop(port);
                    return Err(self.abandon(e));
                }
            }

            let mut link = self.lock_link();
            if link.closed {
                return Err(Error::NotConnected);
            }

            let now = self.now_ms();
            let state = &mut *link;
            let action = state.scheduler.poll(&mut state.tracker, now);
            match action {
                Action::Idle => {
                    link.stats.writes_completed += 1;
                    link.stats.bytes_sent += payload.len() as u64;
                    return Ok(payload.len());
                }
                Action::Wait { deadline } => {
                    let wait = deadline
                        .saturating_sub(now)
                        .min(u64::from(self.config.poll_interval_ms));
                    drop(self.wait(link, wait));
                }
                Action::Retransmit { .. } => {
                    let staged = link.stage_data(now);
                    drop(link);
                    let wire = staged.map_err(|e| self.abandon(e))?;
                    self.send(&wire).map_err(|e| self.abandon(e))?;
                }
                Action::Exhausted { attempts, .. } => {
                    link.stats.writes_failed += 1;
                    return Err(Error::TransmissionFailed {
                        sequence: sequence.value(),
                        attempts,
                    });
                }
            }
        }
    }

    /// Copies delivered bytes into `buf`.
    ///
    /// Reads the transport once when nothing is buffered. Returns `Ok(0)`
    /// when no data has arrived yet.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        {
            let mut link = self.lock_link();
            if link.closed {
                return Err(Error::NotConnected);
            }
            if !link.inbox.is_empty() {
                return Ok(link.drain_into(buf));
            }
        }

        let mut port = self.lock_port();
        self.pump(&mut port)?;
        drop(port);

        let mut link = self.lock_link();
        if link.closed {
            return Err(Error::NotConnected);
        }
        Ok(link.drain_into(buf))
    }

    /// Processes inbound bytes without draining the read buffer.
    ///
    /// Returns the number of bytes available to `read`.
    pub fn poll(&self) -> Result<usize> {
        let mut port = self.lock_port();
        self.pump(&mut port)?;
        drop(port);

        Ok(self.lock_link().inbox.len())
    }

    /// Discards all pending state and releases the transport.
    ///
    /// A write blocked on this session fails with `NotConnected`. If a
    /// transport read is in progress, the transport is dropped by the
    /// reading thread when the read returns. Calling `close` again has no
    /// effect.
    pub fn close(&self) {
        {
            let mut link = self.lock_link();
            if link.closed {
                return;
            }
            link.shutdown();
        }
        log::debug!("session closed");
        self.signal.notify_all();

        if let Some(mut port) = self.try_lock_port() {
            port.transport = None;
        }
    }

    /// Reads the transport once and handles every frame it completes.
    fn pump(&self, port: &mut Port<T>) -> Result<()> {
        let n = match port.transport.as_mut() {
            Some(transport) => transport.read(&mut port.chunk)?,
            None => return Err(Error::NotConnected),
        };

        let (progress, replies) = {
            let mut link = self.lock_link();
            if link.closed {
                port.transport = None;
                return Err(Error::NotConnected);
            }
            let progress = link.process(&port.chunk[..n], self.now_ms());
            (progress, std::mem::take(&mut link.replies))
        };
        if progress {
            self.signal.notify_all();
        }

        if let Some(transport) = port.transport.as_mut() {
            for reply in &replies {
                transport.write_all(reply)?;
            }
        }
        Ok(())
    }

    /// Writes one encoded frame.
    fn send(&self, wire: &[u8]) -> Result<()> {
        let mut port = self.lock_port();
        if self.lock_link().closed {
            port.transport = None;
            return Err(Error::NotConnected);
        }
        port.transport
            .as_mut()
            .ok_or(Error::NotConnected)?
            .write_all(wire)
    }

    /// Drops the in-flight frame after `err` ended the write early.
    fn abandon(&self, err: Error) -> Error {
        self.lock_link().tracker.abandon();
        err
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_port(&self) -> MutexGuard<'_, Port<T>> {
        self.port.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_lock_port(&self) -> Option<MutexGuard<'_, Port<T>>> {
        match self.port.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Link>, ms: u64) -> MutexGuard<'a, Link> {
        match self.signal.wait_timeout(guard, Duration::from_millis(ms)) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for creating Session instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: Config,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Starts from an existing configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the maximum payload per frame.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config = self.config.with_buffer_size(size);
        self
    }

    pub fn timeout_ms(mut self, ms: u32) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Sets the total number of transmissions per write.
    pub fn retries(mut self, retries: u8) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    pub fn deadline_policy(mut self, policy: DeadlinePolicy) -> Self {
        self.config.deadline_policy = policy;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u32) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn nack_on_corruption(mut self, enable: bool) -> Self {
        self.config.nack_on_corruption = enable;
        self
    }

    pub fn read_capacity(mut self, bytes: usize) -> Self {
        self.config.read_capacity = bytes;
        self
    }

    /// Builds a session bound to `transport`.
    pub fn build<T: Transport>(self, transport: T) -> Result<Session<T>> {
        Session::new(transport, self.config)
    }
}
