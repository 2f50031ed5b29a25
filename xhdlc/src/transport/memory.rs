//! In-process connected transport pair.
//!
//! Each end reads what the other wrote. Reads never block; an empty pipe
//! yields `Ok(0)`. Dropping or closing one end makes the peer's writes and
//! drained reads fail with `BrokenPipe`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;
use crate::error::Result;

#[derive(Debug, Default)]
struct Pipe {
    bytes: Mutex<VecDeque<u8>>,
    closed: AtomicBool,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One end of a [`duplex`] pair.
#[derive(Debug)]
pub struct MemoryTransport {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
}

/// Creates two connected ends.
pub fn duplex() -> (MemoryTransport, MemoryTransport) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());

    let a = MemoryTransport {
        rx: b_to_a.clone(),
        tx: a_to_b.clone(),
    };
    let b = MemoryTransport {
        rx: a_to_b,
        tx: b_to_a,
    };
    (a, b)
}

impl MemoryTransport {
    /// Bytes waiting to be read on this end.
    pub fn available(&self) -> usize {
        self.rx.lock().len()
    }

    /// Disconnects both directions.
    pub fn close(&self) {
        self.rx.closed.store(true, Ordering::Release);
        self.tx.closed.store(true, Ordering::Release);
    }

    fn broken_pipe() -> crate::error::Error {
        std::io::Error::from(std::io::ErrorKind::BrokenPipe).into()
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut bytes = self.rx.lock();
        if bytes.is_empty() && self.rx.closed.load(Ordering::Acquire) {
            return Err(Self::broken_pipe());
        }

        let n = buf.len().min(bytes.len());
        for (dst, src) in buf.iter_mut().zip(bytes.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.tx.closed.load(Ordering::Acquire) {
            return Err(Self::broken_pipe());
        }
        self.tx.lock().extend(buf);
        Ok(buf.len())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}
