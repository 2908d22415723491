//! Protocol message parsing and formatting.
//!
//! This module holds the SAMv3 command vocabulary and the reply grammar for
//! each command class. Everything here is pure: it works on reply text that
//! has already been read from the bridge, so it can be tested without I/O.

use crate::error::{Result, ResultCode, SamError};
use crate::types::{DestinationKeys, I2pAddr, SessionRequest};
use std::str::SplitWhitespace;

/// Version negotiation command.
pub const HELLO_COMMAND: &str = "HELLO VERSION MIN=3.0 MAX=3.0\n";
/// Reply to a successful version negotiation.
pub const HELLO_OK: &str = "HELLO REPLY RESULT=OK VERSION=3.0";
/// Reply when the bridge does not support version 3.0.
pub const HELLO_NOVERSION: &str = "HELLO REPLY RESULT=NOVERSION";

/// Key generation command.
pub const DEST_GENERATE_COMMAND: &str = "DEST GENERATE\n";

/// Fixed header of every naming reply, including the trailing space.
pub const NAMING_REPLY_HEADER: &str = "NAMING REPLY ";

/// Prefix of a successful session reply; the destination follows.
pub const SESSION_OK_PREFIX: &str = "SESSION STATUS RESULT=OK DESTINATION=";
/// Reply when the session id is already taken.
pub const SESSION_DUPLICATED_ID: &str = "SESSION STATUS RESULT=DUPLICATED_ID";
/// Reply when the destination is already used by another session.
pub const SESSION_DUPLICATED_DEST: &str = "SESSION STATUS RESULT=DUPLICATED_DEST";
/// Reply when the bridge rejects the destination keys.
pub const SESSION_INVALID_KEY: &str = "SESSION STATUS RESULT=INVALID_KEY";
/// Prefix of a router error reply; the message follows.
pub const SESSION_I2P_ERROR_PREFIX: &str = "SESSION STATUS RESULT=I2P_ERROR MESSAGE=";

/// Tokens whose values must never reach the logs.
const SECRET_PREFIXES: [&str; 2] = ["DESTINATION=", "PRIV="];

/// Strip one trailing line terminator (`\n` or `\r\n`).
pub fn trim_line_end(reply: &str) -> &str {
    let reply = reply.strip_suffix('\n').unwrap_or(reply);
    reply.strip_suffix('\r').unwrap_or(reply)
}

/// Split a reply into whitespace-delimited tokens.
pub fn tokenize(reply: &str) -> SplitWhitespace<'_> {
    reply.split_whitespace()
}

/// Split a reply into tokens after stripping a fixed header.
///
/// The reply must start with `header` and carry something after it.
pub fn tokenize_after<'a>(reply: &'a str, header: &str) -> Result<SplitWhitespace<'a>> {
    match reply.strip_prefix(header) {
        Some(rest) if !rest.is_empty() => Ok(rest.split_whitespace()),
        _ => Err(SamError::ParseError(format!(
            "Expected reply starting with '{}', got '{}'",
            header.trim_end(),
            trim_line_end(reply)
        ))),
    }
}

/// Format a command with arguments.
pub fn format_command(keyword: &str, args: &[&str]) -> String {
    let mut cmd = keyword.to_string();
    for arg in args {
        cmd.push(' ');
        cmd.push_str(arg);
    }
    cmd.push('\n');
    cmd
}

/// Replace secret token values with a placeholder, for logging.
pub fn redact(line: &str) -> String {
    trim_line_end(line)
        .split(' ')
        .map(|token| {
            SECRET_PREFIXES
                .iter()
                .find(|prefix| token.starts_with(*prefix))
                .map(|prefix| format!("{}<redacted>", prefix))
                .unwrap_or_else(|| token.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ==================== HELLO ====================

/// Outcome of version negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloReply {
    /// Version 3.0 agreed.
    Ok,
    /// No common version.
    NoVersion,
    /// Anything else, carrying the raw reply.
    Other(String),
}

impl HelloReply {
    /// Convert into a result, mapping failures onto [`SamError`].
    pub fn into_result(self) -> Result<()> {
        match self {
            HelloReply::Ok => Ok(()),
            HelloReply::NoVersion => Err(SamError::UnsupportedVersion),
            HelloReply::Other(raw) => Err(SamError::ProtocolError(raw)),
        }
    }
}

/// Classify a reply to [`HELLO_COMMAND`]. Every input maps to one variant.
pub fn classify_hello(reply: &str) -> HelloReply {
    match trim_line_end(reply) {
        HELLO_OK => HelloReply::Ok,
        HELLO_NOVERSION => HelloReply::NoVersion,
        _ => HelloReply::Other(reply.to_string()),
    }
}

// ==================== DEST GENERATE ====================

/// Parse a `DEST REPLY PUB=... PRIV=...` reply into destination keys.
///
/// `PUB=` and `PRIV=` may come in any order, but both must be present and
/// non-empty.
pub fn parse_dest_reply(reply: &str) -> Result<DestinationKeys> {
    let mut public = None;
    let mut private = None;

    for token in tokenize(reply) {
        if token == "DEST" || token == "REPLY" {
            continue;
        } else if let Some(value) = token.strip_prefix("PUB=") {
            public = Some(value);
        } else if let Some(value) = token.strip_prefix("PRIV=") {
            private = Some(value);
        } else {
            return Err(SamError::ParseError(format!(
                "Failed to parse keys: unexpected token '{}'",
                token
            )));
        }
    }

    match (public, private) {
        (Some(public), Some(private)) if !public.is_empty() && !private.is_empty() => {
            Ok(DestinationKeys::new(I2pAddr::new(public), private))
        }
        (public, _) => Err(SamError::ParseError(format!(
            "Failed to parse keys: missing {}",
            if public.map_or(true, str::is_empty) {
                "PUB="
            } else {
                "PRIV="
            }
        ))),
    }
}

// ==================== NAMING LOOKUP ====================

/// Build the `NAMING LOOKUP` command for `name`.
pub fn lookup_command(name: &str) -> String {
    format_command("NAMING LOOKUP", &[&format!("NAME={}", name)])
}

/// What a single token of a naming reply means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupToken<'a> {
    Result(ResultCode),
    NameEcho,
    Value(&'a str),
    Message(&'a str),
    Unrecognized,
}

fn classify_lookup_token<'a>(token: &'a str, name: &str) -> LookupToken<'a> {
    if let Some(code) = token.strip_prefix("RESULT=") {
        LookupToken::Result(ResultCode::parse(code))
    } else if token.strip_prefix("NAME=") == Some(name) {
        LookupToken::NameEcho
    } else if let Some(value) = token.strip_prefix("VALUE=") {
        LookupToken::Value(value)
    } else if let Some(message) = token.strip_prefix("MESSAGE=") {
        LookupToken::Message(message)
    } else {
        LookupToken::Unrecognized
    }
}

/// Parse a reply to a `NAMING LOOKUP NAME=<name>` command.
///
/// A `VALUE=` token ends the scan with that address, whatever came before
/// it. Without one, the failure text accumulated from `RESULT=` and
/// `MESSAGE=` tokens is returned as [`SamError::RemoteError`].
pub fn parse_naming_reply(reply: &str, name: &str) -> Result<I2pAddr> {
    let reply = trim_line_end(reply);
    if reply.len() <= NAMING_REPLY_HEADER.len() {
        return Err(SamError::ParseError(format!(
            "Naming reply too short: '{}'",
            reply
        )));
    }

    let mut error = String::new();
    for token in tokenize_after(reply, NAMING_REPLY_HEADER)? {
        match classify_lookup_token(token, name) {
            LookupToken::Result(ResultCode::Ok) | LookupToken::NameEcho => continue,
            LookupToken::Result(ResultCode::InvalidKey) => error.push_str("Invalid key."),
            LookupToken::Result(ResultCode::KeyNotFound) => {
                error.push_str("Unable to resolve ");
                error.push_str(name);
            }
            LookupToken::Value(address) => return Ok(I2pAddr::new(address)),
            LookupToken::Message(message) => {
                error.push(' ');
                error.push_str(message);
            }
            LookupToken::Result(_) | LookupToken::Unrecognized => {
                return Err(SamError::ParseError(format!(
                    "Failed to parse lookup reply: unexpected token '{}'",
                    token
                )))
            }
        }
    }

    Err(SamError::RemoteError(error))
}

// ==================== SESSION CREATE ====================

/// Build the `SESSION CREATE` command for a request.
///
/// Options follow the destination as repeated `OPTION=` tokens, then the
/// extra tokens verbatim, each group in insertion order.
pub fn session_create_command(request: &SessionRequest) -> String {
    let mut cmd = format!(
        "SESSION CREATE STYLE={} ID={} DESTINATION={}",
        request.style(),
        request.id(),
        request.keys()
    );
    for option in request.option_list() {
        cmd.push_str(" OPTION=");
        cmd.push_str(option);
    }
    for extra in request.extra_list() {
        cmd.push(' ');
        cmd.push_str(extra);
    }
    cmd.push('\n');
    cmd
}

/// Outcome of a `SESSION CREATE` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReply {
    /// The session exists; carries the destination echoed by the bridge.
    Created(String),
    /// The session id is already in use.
    DuplicatedId,
    /// The destination is already in use.
    DuplicatedDest,
    /// The keys were rejected.
    InvalidKey,
    /// The router reported an error with a message.
    I2pError(String),
    /// The reply matched no known shape; carries the raw reply.
    Unrecognized(String),
}

impl SessionReply {
    /// Convert into a result, checking that a created session uses `requested`.
    pub fn into_result(self, requested: &DestinationKeys) -> Result<()> {
        match self {
            SessionReply::Created(destination) if destination == requested.as_str() => Ok(()),
            SessionReply::Created(destination) => Err(SamError::IntegrityError {
                requested: requested.as_str().to_string(),
                received: destination,
            }),
            SessionReply::DuplicatedId => Err(SamError::DuplicateSessionId),
            SessionReply::DuplicatedDest => Err(SamError::DuplicateDestination),
            SessionReply::InvalidKey => Err(SamError::InvalidKey),
            SessionReply::I2pError(message) => Err(SamError::RemoteError(message)),
            SessionReply::Unrecognized(raw) => Err(SamError::ParseError(format!(
                "Unable to parse SAMv3 reply: {}",
                raw
            ))),
        }
    }
}

/// Classify a reply to a `SESSION CREATE` command.
pub fn classify_session_reply(reply: &str) -> SessionReply {
    let line = trim_line_end(reply);
    if let Some(destination) = line.strip_prefix(SESSION_OK_PREFIX) {
        return SessionReply::Created(destination.to_string());
    }
    if let Some(message) = line.strip_prefix(SESSION_I2P_ERROR_PREFIX) {
        return SessionReply::I2pError(message.to_string());
    }
    match line {
        SESSION_DUPLICATED_ID => SessionReply::DuplicatedId,
        SESSION_DUPLICATED_DEST => SessionReply::DuplicatedDest,
        SESSION_INVALID_KEY => SessionReply::InvalidKey,
        _ => SessionReply::Unrecognized(reply.to_string()),
    }
}
