use clap::{Parser, Subcommand};
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use vsock::VMADDR_CID_ANY;
use xhdlc::Config;

mod trans_server;

use trans_server::{ServerTarget, TransServer};

const DEFAULT_SOCKET_PATH: &str = "/tmp/xhdlc.sock";
const DEFAULT_SERVER_PORT: u32 = 1234;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Echo every message received over an xhdlc session")]
struct Args {
    /// Maximum payload bytes per frame
    #[arg(short, long, default_value_t = 256)]
    buffer_size: usize,

    /// Retransmission timeout in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    timeout_ms: u32,

    /// Transmission attempts per frame
    #[arg(short, long, default_value_t = 3)]
    retries: u8,

    #[command(subcommand)]
    target: Option<Target>,
}

#[derive(Subcommand, Debug)]
enum Target {
    /// Listen on a Unix socket
    Unix {
        #[arg(default_value = DEFAULT_SOCKET_PATH)]
        path: PathBuf,
    },
    /// Listen on a TCP address
    Tcp { addr: SocketAddr },
    /// Listen on a vsock port
    Vsock {
        #[arg(long, default_value_t = VMADDR_CID_ANY)]
        cid: u32,
        #[arg(default_value_t = DEFAULT_SERVER_PORT)]
        port: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let target = match args.target {
        Some(Target::Unix { path }) => ServerTarget::Unix(path),
        Some(Target::Tcp { addr }) => ServerTarget::Tcp(addr),
        Some(Target::Vsock { cid, port }) => ServerTarget::Vsock { cid, port },
        None => ServerTarget::Unix(PathBuf::from(DEFAULT_SOCKET_PATH)),
    };

    let config = Config::new()
        .with_buffer_size(args.buffer_size)
        .with_timeout_ms(args.timeout_ms)
        .with_retries(args.retries);
    config.validate()?;

    info!("Starting echo server on {:?}", target);
    TransServer::new(target, config).run()?;
    Ok(())
}
