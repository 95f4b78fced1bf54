//! Local frame handler demo
//!
//! Run with: cargo run --example local_consumer
//!
//! Registers a local frame callback instead of (well, alongside) the HTTP
//! stream and prints what arrives. Handy for checking the capture side
//! without a browser.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uvc_mjpeg_rs::net::StaticConnectivity;
use uvc_mjpeg_rs::pipeline::{Pipeline, PipelineConfig};
use uvc_mjpeg_rs::source::SimSource;
use uvc_mjpeg_rs::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uvc_mjpeg_rs=info".parse()?),
        )
        .init();

    // Ephemeral port; this demo is about the local consumer.
    let config = PipelineConfig::default()
        .server(ServerConfig::with_addr("127.0.0.1:0".parse().unwrap()));

    let pipeline = Pipeline::new(config);

    let count = Arc::new(AtomicU64::new(0));
    let count_cb = count.clone();
    pipeline.local().register(move |data, seq| {
        let n = count_cb.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 20 == 0 {
            println!("frame seq={} len={} ({} total)", seq, data.len(), n);
        }
    });

    let source = SimSource::new(pipeline.router()).stats(pipeline.stats());

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
