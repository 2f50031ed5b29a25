//! Echo server and client example using xhdlc.
//!
//! This example demonstrates a simple echo protocol where:
//! - Server echoes back whatever data it receives
//! - Client sends messages and verifies the echo
//!
//! Both sides run a session over an in-memory duplex link; the server
//! lives on its own thread.
//!
//! Run with: cargo run --example echo

use std::thread;
use std::time::{Duration, Instant};

use xhdlc::transport::memory;
use xhdlc::{Error, SessionBuilder};

fn main() {
    env_logger::init();
    println!("=== xhdlc Echo Example ===\n");

    let (client_end, server_end) = memory::duplex();

    let builder = SessionBuilder::new().buffer_size(256).timeout_ms(100).retries(3);
    let client = builder.clone().build(client_end).expect("client session");
    let server = builder.build(server_end).expect("server session");

    let messages = [
        "Hello, Server!",
        "This is a test message.",
        "Flag \u{7e} and escape \u{7d} survive stuffing.",
        "Final message.",
    ];

    thread::scope(|s| {
        // --- Server ---
        s.spawn(|| {
            let mut buf = [0u8; 256];
            loop {
                match server.read(&mut buf) {
                    Ok(0) => thread::sleep(Duration::from_millis(1)),
                    Ok(n) => {
                        let received = core::str::from_utf8(&buf[..n]).unwrap_or("<invalid>");
                        println!("   Server received: {}", received);
                        if let Err(e) = server.write(&buf[..n]) {
                            println!("   Server echo failed: {}", e);
                        }
                    }
                    Err(Error::NotConnected) | Err(Error::Io(_)) => break,
                    Err(e) => {
                        println!("   Server error: {}", e);
                        break;
                    }
                }
            }
        });

        // --- Client ---
        println!("1. Echo Test:");
        let mut buf = [0u8; 256];
        for (i, msg) in messages.iter().enumerate() {
            let start = Instant::now();
            client.write(msg.as_bytes()).expect("send failed");
            println!("   [{}] Client sent: {}", i + 1, msg);

            let mut n = 0;
            while n == 0 && start.elapsed() < Duration::from_secs(2) {
                n = client.read(&mut buf).expect("recv failed");
            }
            let echo = core::str::from_utf8(&buf[..n]).unwrap_or("<invalid>");
            println!(
                "   [{}] Client received echo: {} (match: {}, {:?})\n",
                i + 1,
                echo,
                echo == *msg,
                start.elapsed()
            );
        }

        // Closing the client breaks the pipe and stops the server loop.
        client.close();
    });

    // --- Statistics ---
    println!("2. Statistics:");
    let client_stats = client.stats();
    let server_stats = server.stats();

    println!("   Client:");
    println!("     - Writes completed: {}", client_stats.writes_completed);
    println!("     - Bytes sent: {}", client_stats.bytes_sent);
    println!("     - Bytes received: {}", client_stats.bytes_received);
    println!("     - Retransmissions: {}", client_stats.retransmit.retransmissions);

    println!("   Server:");
    println!("     - Writes completed: {}", server_stats.writes_completed);
    println!("     - Bytes sent: {}", server_stats.bytes_sent);
    println!("     - Bytes received: {}", server_stats.bytes_received);
    println!("     - Duplicates: {}", server_stats.duplicates);

    println!("\n=== Echo Example Complete ===");
}
