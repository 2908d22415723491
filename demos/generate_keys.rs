//! Example: Generate a new destination
//!
//! This example connects to the SAM bridge and asks it for a fresh
//! destination, printing its public address in both forms.
//!
//! Run with: cargo run --example generate_keys

use sam_controller::{Result, SamClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (optional)
    tracing_subscriber::fmt::init();

    println!("Connecting to SAM bridge...");
    let mut client = SamClient::connect_default().await?;
    println!("Connected to {}", client.endpoint());

    let keys = client.generate_keys().await?;
    println!("\nDestination: {}", keys.address());
    println!("Short address: {}", keys.address().base32()?);
    println!("Hash: {}", keys.address().dest_hash()?);

    client.close().await?;
    println!("\nDisconnected.");

    Ok(())
}
