use clap::{Parser, Subcommand};
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use xhdlc::Config;

mod trans_client;

use trans_client::{ClientTarget, TransClient};

const DEFAULT_SOCKET_PATH: &str = "/tmp/xhdlc.sock";
const DEFAULT_SERVER_CID: u32 = 3; // 2 for the host, 3 inside a pvm guest
const DEFAULT_SERVER_PORT: u32 = 1234;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Send messages to the xhdlc echo server and verify the replies")]
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

    /// Number of messages to send
    #[arg(short = 'n', long, default_value_t = 1000)]
    count: usize,

    #[command(subcommand)]
    target: Option<Target>,
}

#[derive(Subcommand, Debug)]
enum Target {
    /// Connect to a Unix socket
    Unix {
        #[arg(default_value = DEFAULT_SOCKET_PATH)]
        path: PathBuf,
    },
    /// Connect to a TCP address
    Tcp { addr: SocketAddr },
    /// Connect to a vsock port
    Vsock {
        #[arg(long, default_value_t = DEFAULT_SERVER_CID)]
        cid: u32,
        #[arg(default_value_t = DEFAULT_SERVER_PORT)]
        port: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let target = match args.target {
        Some(Target::Unix { path }) => ClientTarget::Unix(path),
        Some(Target::Tcp { addr }) => ClientTarget::Tcp(addr),
        Some(Target::Vsock { cid, port }) => ClientTarget::Vsock { cid, port },
        None => ClientTarget::Unix(PathBuf::from(DEFAULT_SOCKET_PATH)),
    };

    let config = Config::new()
        .with_buffer_size(args.buffer_size)
        .with_timeout_ms(args.timeout_ms)
        .with_retries(args.retries);
    config.validate()?;

    info!("Connecting to target: {:?}", target);
    TransClient::new(target, config).run(args.count)?;
    Ok(())
}
