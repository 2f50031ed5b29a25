use log::*;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use vsock::{VsockAddr, VsockListener};
use xhdlc::transport::StdTransport;
use xhdlc::{Config, Error, Session};

/// How long one transport read may block before the session gets control back.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub enum ServerTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
    Vsock { cid: u32, port: u32 },
}

pub struct TransServer {
    target: ServerTarget,
    config: Config,
}

impl TransServer {
    pub fn new(target: ServerTarget, config: Config) -> Self {
        Self { target, config }
    }

    /// Accepts connections one at a time and echoes each until the peer leaves.
    pub fn run(&self) -> std::io::Result<()> {
        match &self.target {
            ServerTarget::Unix(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)?;
                info!("Server listening on Unix Socket {:?}", path);
                loop {
                    let (stream, _) = listener.accept()?;
                    info!("Accepted Unix connection");
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    self.handle_connection(stream);
                }
            }
            ServerTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr)?;
                info!("Server listening on TCP {:?}", addr);
                loop {
                    let (stream, peer) = listener.accept()?;
                    info!("Accepted TCP connection from {:?}", peer);
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    stream.set_nodelay(true)?;
                    self.handle_connection(stream);
                }
            }
            ServerTarget::Vsock { cid, port } => {
                let listener = VsockListener::bind(&VsockAddr::new(*cid, *port))?;
                info!("Server listening on Vsock CID:{} Port:{}", cid, port);
                loop {
                    let (stream, addr) = listener.accept()?;
                    info!("Accepted Vsock connection from {:?}", addr);
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    self.handle_connection(stream);
                }
            }
        }
    }

    fn handle_connection<S: Read + Write>(&self, stream: S) {
        let session = match Session::new(StdTransport::new(stream), self.config.clone()) {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to open session: {}", e);
                return;
            }
        };

        let start = Instant::now();
        let mut buf = vec![0u8; self.config.buffer_size];
        let mut messages = 0u64;
        let mut bytes = 0u64;

        loop {
            let n = match session.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => n,
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    info!("Peer closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Read failed: {}", e);
                    break;
                }
            };

            if let Err(e) = session.write(&buf[..n]) {
                error!("Echo failed: {}", e);
                if !e.is_peer_unreachable() {
                    break;
                }
                continue;
            }
            messages += 1;
            bytes += n as u64;
        }

        let stats = session.stats();
        session.close();

        let elapsed = start.elapsed();
        let speed = (bytes as f64 / 1024.0) / elapsed.as_secs_f64();
        info!("=== Echo Complete ===");
        info!("Messages echoed: {}", messages);
        info!("Total echoed: {} KB", bytes / 1024);
        info!("Time: {:.2} seconds", elapsed.as_secs_f64());
        info!("Speed: {:.2} KB/s", speed);
        info!(
            "Retransmissions: {}, duplicates: {}, discarded frames: {}",
            stats.retransmit.retransmissions, stats.duplicates, stats.corrupt_frames
        );
    }
}
