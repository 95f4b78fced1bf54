//! MJPEG camera server demo
//!
//! Run with: cargo run --example camera_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example camera_server                  # binds to 0.0.0.0:8080
//!   cargo run --example camera_server localhost        # binds to 127.0.0.1:8080
//!   cargo run --example camera_server 127.0.0.1:9090   # binds to 127.0.0.1:9090
//!
//! Uses the simulated camera source, so it runs on any machine. Once the
//! server is up, open the stream in a browser:
//!
//!   http://localhost:8080/stream
//!
//! or pull it with ffplay:
//!
//!   ffplay http://localhost:8080/stream

use std::net::SocketAddr;

use uvc_mjpeg_rs::net::StaticConnectivity;
use uvc_mjpeg_rs::pipeline::{Pipeline, PipelineConfig};
use uvc_mjpeg_rs::source::SimSource;
use uvc_mjpeg_rs::{ServerConfig, StreamConfig};

/// Parse bind address from command line argument.
///
/// Accepts "localhost", "127.0.0.1", or "IP:PORT" forms.
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let bind_addr = match args.get(1) {
        Some(addr_str) => parse_bind_addr(addr_str)?,
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uvc_mjpeg_rs=debug".parse()?),
        )
        .init();

    let config = PipelineConfig::default()
        .stream(StreamConfig::default().resolution(1280, 720).fps(15))
        .server(ServerConfig::with_addr(bind_addr));

    println!("Starting MJPEG server on {}", bind_addr);
    println!();
    println!("=== Watch the stream ===");
    println!("Browser: http://localhost:{}/stream", bind_addr.port());
    println!("ffplay:  ffplay http://localhost:{}/stream", bind_addr.port());
    println!();

    let pipeline = Pipeline::new(config);
    let stats = pipeline.stats();
    let source = SimSource::new(pipeline.router()).stats(stats.clone());

    // Periodic counters alongside the pipeline.
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            let snap = stats.snapshot();
            println!(
                "Stats: captured={} routed={} dropped={} sessions={} bytes={}",
                snap.frames_captured,
                snap.frames_routed,
                snap.frames_dropped,
                snap.sessions_opened,
                snap.bytes_sent,
            );
        }
    });

    tokio::select! {
        result = pipeline.run(source, StaticConnectivity::loopback()) => {
            if let Err(e) = result {
                eprintln!("Pipeline error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
