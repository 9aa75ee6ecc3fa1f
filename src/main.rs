// src/main.rs
//! stowage: 3D Bin-Packing Service
//!
//! A Rust service that assigns shipment items to boxes and computes the
//! exact position and orientation of every packed item:
//! - layer-based placement with row construction and in-place stacking
//! - weight limits and per-item placement rules
//! - layer stabilisation (large footprints at the bottom)

mod api;
mod config;
mod geometry;
mod itemlist;
mod model;
mod optimizer;
mod orientation;
mod packed;
mod packer;
pub mod types;

use config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stowage=info")),
        )
        .init();

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let packer_settings = app_config.packer.clone();

    println!("🚀 Packing service starting...");
    api::start_api_server(api_config, packer_settings).await;
}
