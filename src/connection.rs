//! SAM bridge connection and client.
//!
//! This module provides the main client for talking to a SAM bridge and the
//! session handle returned once the bridge has created a tunnel.

use crate::config::SamConfig;
use crate::error::{Result, SamError};
use crate::protocol::{
    classify_hello, classify_session_reply, lookup_command, parse_dest_reply, parse_naming_reply,
    redact, session_create_command, DEST_GENERATE_COMMAND, HELLO_COMMAND,
};
use crate::types::*;

use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// A handshaken control connection to a SAM bridge.
///
/// Key generation and name lookups may be issued any number of times.
/// Creating a session consumes the client: the tunnel gets its own freshly
/// opened connection, returned inside [`SamSession`].
pub struct SamClient {
    config: SamConfig,
    stream: BufReader<TcpStream>,
}

impl SamClient {
    /// Connect to a SAM bridge at `endpoint` and negotiate SAMv3.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        Self::with_config(SamConfig::new().endpoint(endpoint)).await
    }

    /// Connect to the bridge named by `SAM_ENDPOINT`, or 127.0.0.1:7656.
    pub async fn connect_default() -> Result<Self> {
        Self::with_config(SamConfig::from_env()).await
    }

    /// Connect using a full configuration.
    pub async fn with_config(config: SamConfig) -> Result<Self> {
        config.validate()?;
        let stream = open_handshaken(&config).await?;
        Ok(Self { config, stream })
    }

    /// The bridge endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// The configuration in use.
    pub fn config(&self) -> &SamConfig {
        &self.config
    }

    /// Send a raw command line and receive the one-line reply.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        write_command(&mut self.stream, command, &self.config).await?;
        read_reply(&mut self.stream, &self.config).await
    }

    /// Ask the bridge for a fresh destination.
    pub async fn generate_keys(&mut self) -> Result<DestinationKeys> {
        let reply = self.send_command(DEST_GENERATE_COMMAND).await?;
        let keys = parse_dest_reply(&reply)?;
        debug!("Generated destination {}", keys.address());
        Ok(keys)
    }

    /// Resolve a host name (or b32 address) to a full destination.
    pub async fn lookup(&mut self, name: &str) -> Result<I2pAddr> {
        if name.is_empty() {
            return Err(SamError::InvalidArgument(
                "Lookup name must not be empty".to_string(),
            ));
        }
        ensure_token("lookup name", name)?;

        let reply = self.send_command(&lookup_command(name)).await?;
        let address = parse_naming_reply(&reply, name)?;
        debug!("Resolved {}", name);
        Ok(address)
    }

    /// Create a session on a new connection to the same bridge.
    ///
    /// The control connection of this client is closed once negotiation
    /// finishes, whatever the outcome. On success the caller owns the
    /// session connection; on failure it has already been closed.
    pub async fn create_session(self, request: SessionRequest) -> Result<SamSession> {
        request.validate()?;

        let mut stream = open_handshaken(&self.config).await?;
        if let Err(e) = negotiate_session(&mut stream, &request, &self.config).await {
            warn!("Session '{}' was not created: {}", request.id(), e);
            if let Err(shutdown) = stream.shutdown().await {
                trace!("Closing the session connection failed: {}", shutdown);
            }
            return Err(e);
        }

        debug!(
            "Created {} session '{}' for {}",
            request.style(),
            request.id(),
            request.keys().address()
        );
        Ok(SamSession {
            id: request.id().to_string(),
            style: request.style(),
            keys: request.keys().clone(),
            stream,
        })
    }

    /// Create a `STREAM` session.
    pub async fn create_stream_session(
        self,
        id: &str,
        keys: DestinationKeys,
        options: &[&str],
    ) -> Result<SamSession> {
        let request =
            SessionRequest::new(SessionStyle::Stream, id, keys).options(options.iter().copied());
        self.create_session(request).await
    }

    /// Create a `DATAGRAM` session.
    pub async fn create_datagram_session(
        self,
        id: &str,
        keys: DestinationKeys,
        options: &[&str],
    ) -> Result<SamSession> {
        let request =
            SessionRequest::new(SessionStyle::Datagram, id, keys).options(options.iter().copied());
        self.create_session(request).await
    }

    /// Create a `RAW` session.
    pub async fn create_raw_session(
        self,
        id: &str,
        keys: DestinationKeys,
        options: &[&str],
    ) -> Result<SamSession> {
        let request =
            SessionRequest::new(SessionStyle::Raw, id, keys).options(options.iter().copied());
        self.create_session(request).await
    }

    /// Close the control connection. Sessions already created are unaffected.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// A session the bridge confirmed, owning its dedicated connection.
///
/// The session lives as long as this connection stays open.
pub struct SamSession {
    id: String,
    style: SessionStyle,
    keys: DestinationKeys,
    stream: BufReader<TcpStream>,
}

impl SamSession {
    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session style.
    pub fn style(&self) -> SessionStyle {
        self.style
    }

    /// The destination keys the bridge confirmed.
    pub fn keys(&self) -> &DestinationKeys {
        &self.keys
    }

    /// The public address of the session's destination.
    pub fn address(&self) -> &I2pAddr {
        self.keys.address()
    }

    /// Borrow the session connection.
    ///
    /// Bytes the bridge sent after the `SESSION STATUS` line are still
    /// buffered in the reader.
    pub fn stream_mut(&mut self) -> &mut BufReader<TcpStream> {
        &mut self.stream
    }

    /// Take ownership of the session connection, buffered bytes included.
    pub fn into_stream(self) -> BufReader<TcpStream> {
        self.stream
    }

    /// Split into the connection and the confirmed keys.
    pub fn into_parts(self) -> (BufReader<TcpStream>, DestinationKeys) {
        (self.stream, self.keys)
    }

    /// Close the session connection, ending the session on the bridge.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for SamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamSession")
            .field("id", &self.id)
            .field("style", &self.style)
            .field("keys", &self.keys)
            .finish()
    }
}

/// Dial the bridge and run the version handshake on the new connection.
async fn open_handshaken(config: &SamConfig) -> Result<BufReader<TcpStream>> {
    trace!("Connecting to SAM bridge at {}", config.endpoint);
    let connect = TcpStream::connect(config.endpoint.as_str());
    let mut stream = BufReader::new(deadline(config.connect_timeout, connect).await?);
    handshake(&mut stream, config).await?;
    Ok(stream)
}

/// Negotiate SAMv3 on an open connection.
pub(crate) async fn handshake<S>(stream: &mut S, config: &SamConfig) -> Result<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    write_command(stream, HELLO_COMMAND, config).await?;
    let reply = read_reply(stream, config).await?;
    classify_hello(&reply).into_result()?;
    debug!("SAMv3 handshake with {} succeeded", config.endpoint);
    Ok(())
}

/// Send `SESSION CREATE` and check the bridge's answer.
pub(crate) async fn negotiate_session<S>(
    stream: &mut S,
    request: &SessionRequest,
    config: &SamConfig,
) -> Result<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let command = session_create_command(request);
    trace!("Sending command: {}", redact(&command));
    deadline(
        config.write_timeout,
        write_bounded(stream, command.as_bytes(), config.max_write_attempts),
    )
    .await?;

    let reply = read_reply(stream, config).await?;
    classify_session_reply(&reply).into_result(request.keys())
}

/// Write a whole command line.
pub(crate) async fn write_command<W>(
    writer: &mut W,
    command: &str,
    config: &SamConfig,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    trace!("Sending command: {}", redact(command));
    deadline(config.write_timeout, async {
        writer.write_all(command.as_bytes()).await?;
        writer.flush().await?;
        Ok::<_, io::Error>(())
    })
    .await
}

/// Write `bytes`, resuming after partial writes, using at most `max_attempts` write calls.
pub(crate) async fn write_bounded<W>(
    writer: &mut W,
    bytes: &[u8],
    max_attempts: usize,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    let mut attempts = 0;

    while written < bytes.len() {
        if attempts == max_attempts {
            return Err(SamError::WriteFailed { attempts });
        }
        attempts += 1;
        written += writer.write(&bytes[written..]).await?;
    }

    writer.flush().await?;
    Ok(())
}

/// Read one reply line, bounded by `max_reply_len` and the read timeout.
///
/// Reading stops at the first newline; anything after it stays buffered for
/// the next reply. If the bridge closes the connection after sending part of
/// a line, that part is the reply.
pub(crate) async fn read_reply<R>(reader: &mut R, config: &SamConfig) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let limit = config.max_reply_len;
    let raw = deadline(config.read_timeout, read_line_bounded(reader, limit)).await?;

    let reply = String::from_utf8(raw)
        .map_err(|_| SamError::ProtocolError("Reply is not valid UTF-8".to_string()))?;
    trace!("Received reply: {}", redact(&reply));
    Ok(reply)
}

async fn read_line_bounded<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut reply = Vec::new();
    // One byte past the limit tells an oversized line from one that fits.
    let mut bounded = reader.take(limit as u64 + 1);
    let n = bounded.read_until(b'\n', &mut reply).await?;

    if n == 0 {
        return Err(SamError::ConnectionClosed);
    }
    if reply.len() > limit {
        return Err(SamError::ReplyTooLarge { limit });
    }
    Ok(reply)
}

/// Run a fallible future under a deadline.
async fn deadline<T, E, F>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    SamError: From<E>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SamError::Timeout),
    }
}
