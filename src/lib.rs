//! # sam-controller
//!
//! A safe, practical Rust crate for driving the SAMv3 bridge of an I2P
//! router.
//!
//! This crate provides an async client for the bridge's line-oriented
//! control protocol, allowing you to:
//!
//! - Negotiate protocol version 3.0
//! - Generate new destinations (public address plus private keys)
//! - Resolve host names to destinations
//! - Create `STREAM`, `DATAGRAM` and `RAW` sessions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sam_controller::{Result, SamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to the default bridge (127.0.0.1:7656)
//!     let mut client = SamClient::connect_default().await?;
//!
//!     // Generate a destination
//!     let keys = client.generate_keys().await?;
//!     println!("New destination: {}", keys.address());
//!
//!     // Resolve a name
//!     let stats = client.lookup("stats.i2p").await?;
//!     println!("stats.i2p is {}", stats);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Sessions
//!
//! Creating a session consumes the client. The bridge ties a session to the
//! connection it was created on, so the session gets a connection of its
//! own and the caller owns it from then on:
//!
//! ```rust,no_run
//! use sam_controller::{SamClient, SessionRequest, SessionStyle};
//!
//! # async fn example() -> sam_controller::Result<()> {
//! let mut client = SamClient::connect("127.0.0.1:7656").await?;
//! let keys = client.generate_keys().await?;
//!
//! let request = SessionRequest::with_random_id(SessionStyle::Stream, keys)
//!     .option("inbound.length=2")
//!     .option("outbound.length=2");
//! let session = client.create_session(request).await?;
//!
//! println!("Session {} is up at {}", session.id(), session.address().base32()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tokio-runtime` (default): Enable the network client using Tokio
//! - `test-utils`: Expose a scripted mock bridge for tests
//!
//! ## Protocol Compatibility
//!
//! This crate speaks SAM version 3.0 as described in the
//! [SAMv3 specification](https://geti2p.net/en/docs/api/samv3).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

#[cfg(feature = "tokio-runtime")]
pub mod connection;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types for convenience
pub use error::{Result, ResultCode, SamError};

#[cfg(feature = "tokio-runtime")]
pub use connection::{SamClient, SamSession};

pub use config::SamConfig;
pub use protocol::{HelloReply, SessionReply};
pub use types::{DestHash, DestinationKeys, I2pAddr, SessionRequest, SessionStyle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SAM protocol version negotiated by this crate.
pub const PROTOCOL_VERSION: &str = "3.0";
