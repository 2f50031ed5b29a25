use log::*;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use vsock::{VsockAddr, VsockStream};
use xhdlc::transport::StdTransport;
use xhdlc::{Config, Error, Session};

/// How long one transport read may block before the session gets control back.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// How long to wait for an echo after the write was acknowledged.
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum ClientTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
    Vsock { cid: u32, port: u32 },
}

pub struct TransClient {
    target: ClientTarget,
    config: Config,
}

impl TransClient {
    pub fn new(target: ClientTarget, config: Config) -> Self {
        Self { target, config }
    }

    pub fn run(&self, count: usize) -> Result<(), Error> {
        match &self.target {
            ClientTarget::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                stream.set_read_timeout(Some(READ_TIMEOUT))?;
                info!("Unix socket connected.");
                self.process_stream(stream, count)
            }
            ClientTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr)?;
                stream.set_read_timeout(Some(READ_TIMEOUT))?;
                stream.set_nodelay(true)?;
                info!("TCP socket connected.");
                self.process_stream(stream, count)
            }
            ClientTarget::Vsock { cid, port } => {
                let stream = VsockStream::connect(&VsockAddr::new(*cid, *port))?;
                stream.set_read_timeout(Some(READ_TIMEOUT))?;
                info!("Vsock socket connected.");
                self.process_stream(stream, count)
            }
        }
    }

    fn process_stream<S: Read + Write>(&self, stream: S, count: usize) -> Result<(), Error> {
        let session = Session::new(StdTransport::new(stream), self.config.clone())?;
        let size = self.config.buffer_size;
        let mut reply = vec![0u8; size];
        let mut mismatches = 0usize;

        info!("Sending {} messages of {} bytes...", count, size);
        let start = Instant::now();

        for i in 0..count {
            // Every message carries flag and escape bytes to exercise stuffing.
            let message: Vec<u8> = (0..size)
                .map(|j| match j % 16 {
                    0 => 0x7E,
                    1 => 0x7D,
                    _ => (i + j) as u8,
                })
                .collect();

            session.write(&message)?;

            let deadline = Instant::now() + ECHO_TIMEOUT;
            let mut received = Vec::with_capacity(size);
            while received.len() < size {
                if Instant::now() >= deadline {
                    warn!("No echo for message {}", i);
                    break;
                }
                let n = session.read(&mut reply)?;
                received.extend_from_slice(&reply[..n]);
            }

            if received != message {
                mismatches += 1;
            }
        }

        let elapsed = start.elapsed();
        let total = count * size;
        let speed = (2 * total) as f64 / 1024.0 / elapsed.as_secs_f64();
        let stats = session.stats();
        session.close();

        info!("=== Exchange Complete ===");
        info!("Total sent: {} KB", total / 1024);
        info!("Time: {:.2} seconds", elapsed.as_secs_f64());
        info!("Speed: {:.2} KB/s", speed);
        info!("Mismatched echoes: {}", mismatches);
        info!(
            "Retransmissions: {}, retransmit rate: {:.2}%, last RTT: {:?} ms",
            stats.retransmit.retransmissions,
            stats.retransmit.retransmit_rate(),
            stats.retransmit.last_rtt_ms
        );
        Ok(())
    }
}
