//! Example: Resolve host names
//!
//! Run with: cargo run --example lookup -- stats.i2p idk.i2p

use sam_controller::{Result, SamClient, SamError};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let names: Vec<String> = std::env::args().skip(1).collect();
    if names.is_empty() {
        eprintln!("usage: lookup <name>...");
        return Ok(());
    }

    let mut client = SamClient::connect_default().await?;

    for name in &names {
        match client.lookup(name).await {
            Ok(addr) => {
                let short = addr.base32().unwrap_or_else(|_| addr.to_string());
                println!("{} => {}", name, short);
            }
            Err(SamError::RemoteError(msg)) => println!("{} => not found ({})", name, msg.trim()),
            Err(e) => return Err(e),
        }
    }

    client.close().await
}
