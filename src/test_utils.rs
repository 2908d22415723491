//! # Test Utilities for the SAM client
//!
//! This module provides a scripted mock SAM bridge and reply fixtures for
//! testing code that uses this library without a running I2P router.
//!
//! ## Features
//!
//! Enable this module by adding the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! sam-controller = { version = "0.1", features = ["test-utils"] }
//! ```
//!
//! ## Mock Bridge
//!
//! Each accepted connection is given its own script: the list of replies it
//! sends, one per command line received. The bridge records every command
//! and notices when the client closes the connection.
//!
//! ```rust,ignore
//! use sam_controller::test_utils::{fixtures, MockSamBridge};
//! use sam_controller::SamClient;
//!
//! #[tokio::test]
//! async fn test_with_mock_bridge() {
//!     let bridge = MockSamBridge::start(vec![vec![
//!         fixtures::hello_ok(),
//!         fixtures::dest_reply("pub", "priv"),
//!     ]])
//!     .await
//!     .unwrap();
//!
//!     let mut client = SamClient::with_config(bridge.config()).await.unwrap();
//!     let keys = client.generate_keys().await.unwrap();
//!     assert_eq!(keys.private_key(), "priv");
//! }
//! ```

use crate::config::SamConfig;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Pre-built bridge replies.
pub mod fixtures {
    use crate::protocol::{
        HELLO_NOVERSION, HELLO_OK, SESSION_DUPLICATED_DEST, SESSION_DUPLICATED_ID,
        SESSION_I2P_ERROR_PREFIX, SESSION_INVALID_KEY, SESSION_OK_PREFIX,
    };

    /// Successful version negotiation.
    pub fn hello_ok() -> String {
        format!("{}\n", HELLO_OK)
    }

    /// Version negotiation without a common version.
    pub fn hello_noversion() -> String {
        format!("{}\n", HELLO_NOVERSION)
    }

    /// Generated keys.
    pub fn dest_reply(public: &str, private: &str) -> String {
        format!("DEST REPLY PUB={} PRIV={}\n", public, private)
    }

    /// A successful lookup of `name`.
    pub fn naming_value(name: &str, value: &str) -> String {
        format!("NAMING REPLY RESULT=OK NAME={} VALUE={}\n", name, value)
    }

    /// A lookup of `name` that found nothing.
    pub fn naming_not_found(name: &str) -> String {
        format!("NAMING REPLY RESULT=KEY_NOT_FOUND NAME={}\n", name)
    }

    /// A session created for `destination`.
    pub fn session_ok(destination: &str) -> String {
        format!("{}{}\n", SESSION_OK_PREFIX, destination)
    }

    /// A session id that is already taken.
    pub fn session_duplicated_id() -> String {
        format!("{}\n", SESSION_DUPLICATED_ID)
    }

    /// A destination that is already in use.
    pub fn session_duplicated_dest() -> String {
        format!("{}\n", SESSION_DUPLICATED_DEST)
    }

    /// Rejected keys.
    pub fn session_invalid_key() -> String {
        format!("{}\n", SESSION_INVALID_KEY)
    }

    /// A router error with a message.
    pub fn session_i2p_error(message: &str) -> String {
        format!("{}{}\n", SESSION_I2P_ERROR_PREFIX, message)
    }
}

#[derive(Debug, Default)]
struct ConnectionLog {
    commands: Vec<String>,
    closed: bool,
}

#[derive(Debug, Default)]
struct BridgeState {
    connections: Vec<ConnectionLog>,
}

/// A scripted SAM bridge listening on a local ephemeral port.
pub struct MockSamBridge {
    addr: SocketAddr,
    state: Arc<Mutex<BridgeState>>,
    accept_task: JoinHandle<()>,
}

impl MockSamBridge {
    /// Start a bridge; the n-th accepted connection replays `scripts[n]`.
    ///
    /// Connections beyond the scripts get no replies at all.
    pub async fn start(scripts: Vec<Vec<String>>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(BridgeState::default()));

        let task_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            let mut scripts = scripts.into_iter();
            while let Ok((socket, _)) = listener.accept().await {
                let index = {
                    let mut state = lock(&task_state);
                    state.connections.push(ConnectionLog::default());
                    state.connections.len() - 1
                };
                let replies = scripts.next().unwrap_or_default();
                tokio::spawn(serve(socket, replies, index, Arc::clone(&task_state)));
            }
        });

        Ok(Self {
            addr,
            state,
            accept_task,
        })
    }

    /// The `host:port` the bridge listens on.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// A client configuration pointing at this bridge with short timeouts.
    pub fn config(&self) -> SamConfig {
        SamConfig::new()
            .endpoint(self.endpoint())
            .connect_timeout(Duration::from_secs(2))
            .read_timeout(Duration::from_secs(2))
            .write_timeout(Duration::from_secs(2))
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        lock(&self.state).connections.len()
    }

    /// Command lines received on connection `index`, without terminators.
    pub fn commands(&self, index: usize) -> Vec<String> {
        lock(&self.state)
            .connections
            .get(index)
            .map(|c| c.commands.clone())
            .unwrap_or_default()
    }

    /// Whether the client has closed connection `index`.
    pub fn is_closed(&self, index: usize) -> bool {
        lock(&self.state)
            .connections
            .get(index)
            .is_some_and(|c| c.closed)
    }

    /// Wait up to `limit` for the client to close connection `index`.
    pub async fn wait_closed(&self, index: usize, limit: Duration) -> bool {
        let start = tokio::time::Instant::now();
        loop {
            if self.is_closed(index) {
                return true;
            }
            if start.elapsed() >= limit {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockSamBridge {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

fn lock(state: &Mutex<BridgeState>) -> MutexGuard<'_, BridgeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn serve(
    socket: TcpStream,
    replies: Vec<String>,
    index: usize,
    state: Arc<Mutex<BridgeState>>,
) {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut replies = replies.into_iter();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        lock(&state).connections[index]
            .commands
            .push(line.trim_end_matches(['\r', '\n']).to_string());

        if let Some(reply) = replies.next() {
            if write_half.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    }

    lock(&state).connections[index].closed = true;
}
