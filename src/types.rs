//! Core types used throughout the SAM client.
//!
//! This module contains the value types exchanged with the bridge:
//! addresses, destination keys, session styles and session requests.

use crate::error::{Result, SamError};
use base64::alphabet::Alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const I2P_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-~") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("invalid I2P base64 alphabet"),
    };

/// Base64 as used by I2P: the standard alphabet with `-~` in place of `+/`.
const I2P_BASE64: GeneralPurpose = GeneralPurpose::new(
    &I2P_ALPHABET,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Suffix of the short, hash-derived form of an I2P address.
pub const B32_SUFFIX: &str = ".b32.i2p";

/// An I2P address: a base64 destination or a host name known to the router.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct I2pAddr(String);

impl I2pAddr {
    /// Create a new address from a string.
    pub fn new(address: impl Into<String>) -> Self {
        I2pAddr(address.into())
    }

    /// Get the address as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is already a `.b32.i2p` address.
    pub fn is_b32(&self) -> bool {
        self.0.ends_with(B32_SUFFIX)
    }

    /// SHA-256 hash of the decoded destination.
    ///
    /// Fails with [`SamError::ParseError`] if the address is not a base64
    /// destination (for example a host name).
    pub fn dest_hash(&self) -> Result<DestHash> {
        let raw = I2P_BASE64
            .decode(self.0.as_bytes())
            .map_err(|e| SamError::ParseError(format!("Invalid destination encoding: {}", e)))?;
        Ok(DestHash(Sha256::digest(&raw).into()))
    }

    /// The `<hash>.b32.i2p` form of this destination.
    pub fn base32(&self) -> Result<String> {
        Ok(self.dest_hash()?.to_b32())
    }
}

impl fmt::Display for I2pAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for I2pAddr {
    type Err = SamError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(SamError::ParseError(format!("Invalid I2P address: '{}'", s)));
        }
        Ok(I2pAddr::new(s))
    }
}

/// The SHA-256 hash identifying a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestHash(pub [u8; 32]);

impl DestHash {
    /// Render as a `.b32.i2p` host name.
    pub fn to_b32(&self) -> String {
        let mut name = base32_lower(&self.0);
        name.push_str(B32_SUFFIX);
        name
    }
}

impl fmt::Display for DestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Unpadded lowercase RFC 4648 base32.
fn base32_lower(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = ((buffer << 8) | u32::from(byte)) & 0xffff;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

/// A destination's public address together with its private key material.
///
/// The private key blob handed out by the bridge already embeds the public
/// destination, so it is the lossless serialization of the pair and is what
/// gets sent as `DESTINATION=` when creating a session.
#[derive(Clone, PartialEq, Eq)]
pub struct DestinationKeys {
    address: I2pAddr,
    private_key: String,
}

impl DestinationKeys {
    /// Create keys from a public address and private key material.
    pub fn new(address: I2pAddr, private_key: impl Into<String>) -> Self {
        DestinationKeys {
            address,
            private_key: private_key.into(),
        }
    }

    /// The public address anyone can send messages to.
    pub fn address(&self) -> &I2pAddr {
        &self.address
    }

    /// The private key material. Only ever send this to the bridge.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// The serialization used as the `DESTINATION=` argument.
    pub fn as_str(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Display for DestinationKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.private_key)
    }
}

impl fmt::Debug for DestinationKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationKeys")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// The transport style of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStyle {
    /// Virtual streams, similar to TCP.
    Stream,
    /// Repliable, authenticated datagrams.
    Datagram,
    /// Anonymous raw datagrams.
    Raw,
}

impl SessionStyle {
    /// The wire spelling used in `STYLE=`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStyle::Stream => "STREAM",
            SessionStyle::Datagram => "DATAGRAM",
            SessionStyle::Raw => "RAW",
        }
    }
}

impl fmt::Display for SessionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStyle {
    type Err = SamError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STREAM" => Ok(SessionStyle::Stream),
            "DATAGRAM" => Ok(SessionStyle::Datagram),
            "RAW" => Ok(SessionStyle::Raw),
            _ => Err(SamError::InvalidArgument(format!(
                "Unknown session style: {}",
                s
            ))),
        }
    }
}

/// Everything needed to ask the bridge for a new session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    style: SessionStyle,
    id: String,
    keys: DestinationKeys,
    options: Vec<String>,
    extras: Vec<String>,
}

impl SessionRequest {
    /// Create a request for a session named `id`.
    pub fn new(style: SessionStyle, id: impl Into<String>, keys: DestinationKeys) -> Self {
        SessionRequest {
            style,
            id: id.into(),
            keys,
            options: Vec::new(),
            extras: Vec::new(),
        }
    }

    /// Create a request with a freshly generated session id.
    pub fn with_random_id(style: SessionStyle, keys: DestinationKeys) -> Self {
        Self::new(style, Self::random_id(), keys)
    }

    /// Generate a session id that is very unlikely to collide on one bridge.
    pub fn random_id() -> String {
        use rand::distributions::Alphanumeric;
        use rand::Rng;

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        format!("session-{}", suffix)
    }

    /// Append an I2CP or streaming option in `KEY=VALUE` form.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Append an option from a separate key and value.
    pub fn option_kv(self, key: &str, value: impl fmt::Display) -> Self {
        self.option(format!("{}={}", key, value))
    }

    /// Append several options, preserving their order.
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Append a token that is sent verbatim after the options.
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extras.push(extra.into());
        self
    }

    /// Append several verbatim tokens, preserving their order.
    pub fn extras<I, S>(mut self, extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extras.extend(extras.into_iter().map(Into::into));
        self
    }

    /// Get the session style.
    pub fn style(&self) -> SessionStyle {
        self.style
    }

    /// Get the session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the destination keys.
    pub fn keys(&self) -> &DestinationKeys {
        &self.keys
    }

    /// Get the options in insertion order.
    pub fn option_list(&self) -> &[String] {
        &self.options
    }

    /// Get the extra tokens in insertion order.
    pub fn extra_list(&self) -> &[String] {
        &self.extras
    }

    /// Check that every field can be written as a single command line.
    ///
    /// The id and keys must be non-empty tokens, options must be `KEY=VALUE`
    /// tokens, and no field may contain whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(SamError::InvalidArgument(
                "Session id must not be empty".to_string(),
            ));
        }
        ensure_token("session id", &self.id)?;

        if self.keys.as_str().is_empty() {
            return Err(SamError::InvalidArgument(
                "Destination keys must not be empty".to_string(),
            ));
        }
        ensure_token("destination", self.keys.as_str())?;

        for option in &self.options {
            ensure_token("option", option)?;
            match option.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(SamError::InvalidArgument(format!(
                        "Option '{}' is not in KEY=VALUE form",
                        option
                    )))
                }
            }
        }

        for extra in &self.extras {
            if extra.is_empty() {
                return Err(SamError::InvalidArgument(
                    "Extra tokens must not be empty".to_string(),
                ));
            }
            ensure_token("extra token", extra)?;
        }

        Ok(())
    }
}

/// Reject values that would split into several tokens or lines on the wire.
pub(crate) fn ensure_token(what: &str, value: &str) -> Result<()> {
    if value.chars().any(char::is_whitespace) {
        return Err(SamError::InvalidArgument(format!(
            "{} must not contain whitespace: '{}'",
            what, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> DestinationKeys {
        DestinationKeys::new(I2pAddr::new("pubkey"), "privkey")
    }

    #[test]
    fn test_base32_vectors() {
        assert_eq!(base32_lower(b""), "");
        assert_eq!(base32_lower(b"f"), "my");
        assert_eq!(base32_lower(b"fo"), "mzxq");
        assert_eq!(base32_lower(b"foo"), "mzxw6");
        assert_eq!(base32_lower(b"foob"), "mzxw6yq");
        assert_eq!(base32_lower(b"fooba"), "mzxw6ytb");
        assert_eq!(base32_lower(b"foobar"), "mzxw6ytboi");
    }

    #[test]
    fn test_b32_address() {
        let addr = I2pAddr::new("AAAA-~~~");
        let b32 = addr.base32().unwrap();
        assert!(b32.ends_with(B32_SUFFIX));
        assert_eq!(b32.len(), 52 + B32_SUFFIX.len());
        assert_eq!(b32, addr.base32().unwrap());
        assert!(I2pAddr::new(b32).is_b32());
    }

    #[test]
    fn test_dest_hash_rejects_standard_alphabet() {
        assert!(I2pAddr::new("AAAA++//").dest_hash().is_err());
        assert!(I2pAddr::new("example.i2p").dest_hash().is_err());
    }

    #[test]
    fn test_dest_hash_hex() {
        let hash = DestHash([0xab; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_address_from_str() {
        assert!(I2pAddr::from_str("").is_err());
        assert!(I2pAddr::from_str("two words").is_err());
        assert_eq!(I2pAddr::from_str("stats.i2p").unwrap().as_str(), "stats.i2p");
    }

    #[test]
    fn test_keys_serialization_and_debug() {
        let keys = keys();
        assert_eq!(keys.to_string(), "privkey");
        assert_eq!(keys.as_str(), "privkey");
        assert_eq!(keys.address().as_str(), "pubkey");
        let debug = format!("{:?}", keys);
        assert!(!debug.contains("privkey"));
        assert!(debug.contains("pubkey"));
    }

    #[test]
    fn test_session_style() {
        assert_eq!(SessionStyle::Stream.to_string(), "STREAM");
        assert_eq!("datagram".parse::<SessionStyle>().unwrap(), SessionStyle::Datagram);
        assert_eq!("RAW".parse::<SessionStyle>().unwrap(), SessionStyle::Raw);
        assert!("PRIMARY".parse::<SessionStyle>().is_err());
    }

    #[test]
    fn test_request_builder_keeps_order() {
        let request = SessionRequest::new(SessionStyle::Stream, "id", keys())
            .option("inbound.length=2")
            .option_kv("outbound.length", 3)
            .options(["a=1", "b=2"])
            .extra("FROM_PORT=7")
            .extras(["TO_PORT=9"]);

        assert_eq!(
            request.option_list(),
            ["inbound.length=2", "outbound.length=3", "a=1", "b=2"]
        );
        assert_eq!(request.extra_list(), ["FROM_PORT=7", "TO_PORT=9"]);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        let empty_id = SessionRequest::new(SessionStyle::Raw, "", keys());
        assert!(matches!(empty_id.validate(), Err(SamError::InvalidArgument(_))));

        let spaced_id = SessionRequest::new(SessionStyle::Raw, "my id", keys());
        assert!(spaced_id.validate().is_err());

        let bad_option = SessionRequest::new(SessionStyle::Raw, "id", keys()).option("novalue");
        assert!(bad_option.validate().is_err());

        let empty_key = SessionRequest::new(SessionStyle::Raw, "id", keys()).option("=1");
        assert!(empty_key.validate().is_err());

        let newline_extra = SessionRequest::new(SessionStyle::Raw, "id", keys()).extra("x\nHELLO");
        assert!(newline_extra.validate().is_err());

        let no_keys = DestinationKeys::new(I2pAddr::new(""), "");
        let empty_dest = SessionRequest::new(SessionStyle::Raw, "id", no_keys);
        assert!(empty_dest.validate().is_err());
    }

    #[test]
    fn test_random_ids_differ() {
        let a = SessionRequest::random_id();
        let b = SessionRequest::random_id();
        assert!(a.starts_with("session-"));
        assert_eq!(a.len(), "session-".len() + 16);
        assert_ne!(a, b);
        assert!(SessionRequest::with_random_id(SessionStyle::Stream, keys())
            .validate()
            .is_ok());
    }
}
