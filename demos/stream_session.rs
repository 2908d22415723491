//! Example: Create a stream session
//!
//! This example generates a destination and creates a STREAM session for
//! it. The session stays up until Enter is pressed.
//!
//! Run with: cargo run --example stream_session

use sam_controller::{Result, SamClient, SessionRequest, SessionStyle};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut client = SamClient::connect_default().await?;
    let keys = client.generate_keys().await?;

    // Short tunnels build faster, at the cost of anonymity
    let request = SessionRequest::with_random_id(SessionStyle::Stream, keys)
        .option_kv("inbound.length", 1)
        .option_kv("outbound.length", 1);

    println!("Creating session {}...", request.id());
    let session = client.create_session(request).await?;

    println!("Session created!");
    println!("  Id: {}", session.id());
    println!("  Address: {}", session.address().base32()?);

    println!("\nPress Enter to close the session and exit...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    session.close().await?;
    println!("Session closed.");

    Ok(())
}
