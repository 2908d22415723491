//! Integration tests for sam-controller.
//!
//! Most tests run against the scripted mock bridge from `test_utils`. The
//! `live` module talks to a real I2P router and is ignored by default.
//!
//! # Running the live tests
//!
//! 1. Start an I2P router with the SAM bridge enabled (i2pd or Java I2P).
//!
//! 2. Run:
//!    ```sh
//!    cargo test --test integration -- --ignored
//!    ```
//!
//! # Test Configuration
//!
//! By default, live tests connect to 127.0.0.1:7656.
//! Set the `SAM_ENDPOINT` environment variable to override.

use sam_controller::test_utils::{fixtures, MockSamBridge};
use sam_controller::{
    DestinationKeys, I2pAddr, SamClient, SamError, SamSession, SessionRequest, SessionStyle,
};
use std::time::Duration;

/// Default wait for the mock bridge to notice a close
const CLOSE_WAIT: Duration = Duration::from_secs(2);

fn keys(private: &str) -> DestinationKeys {
    DestinationKeys::new(I2pAddr::new("pubkey"), private)
}

/// Start a bridge whose second connection answers `SESSION CREATE` with `reply`.
async fn session_bridge(reply: String) -> MockSamBridge {
    MockSamBridge::start(vec![
        vec![fixtures::hello_ok()],
        vec![fixtures::hello_ok(), reply],
    ])
    .await
    .unwrap()
}

async fn create(bridge: &MockSamBridge, request: SessionRequest) -> Result<SamSession, SamError> {
    let client = SamClient::with_config(bridge.config()).await.unwrap();
    client.create_session(request).await
}

// ============================================================================
// Handshake Tests
// ============================================================================

mod handshake {
    use super::*;

    #[tokio::test]
    async fn test_handshake_ok() {
        let bridge = MockSamBridge::start(vec![vec![fixtures::hello_ok()]])
            .await
            .unwrap();
        let client = SamClient::with_config(bridge.config()).await.unwrap();
        assert_eq!(client.endpoint(), bridge.endpoint());
        assert_eq!(bridge.commands(0), ["HELLO VERSION MIN=3.0 MAX=3.0"]);
    }

    #[tokio::test]
    async fn test_handshake_noversion() {
        let bridge = MockSamBridge::start(vec![vec![fixtures::hello_noversion()]])
            .await
            .unwrap();
        let result = SamClient::with_config(bridge.config()).await;
        assert!(matches!(result, Err(SamError::UnsupportedVersion)));
    }

    #[tokio::test]
    async fn test_handshake_garbage() {
        let bridge = MockSamBridge::start(vec![vec!["HELLO REPLY RESULT=I2P_ERROR\n".into()]])
            .await
            .unwrap();
        match SamClient::with_config(bridge.config()).await {
            Err(SamError::ProtocolError(raw)) => {
                assert_eq!(raw, "HELLO REPLY RESULT=I2P_ERROR\n")
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("handshake should fail"),
        }
    }

    #[tokio::test]
    async fn test_handshake_silent_bridge_times_out() {
        let bridge = MockSamBridge::start(vec![vec![]]).await.unwrap();
        let config = bridge.config().read_timeout(Duration::from_millis(100));
        let result = SamClient::with_config(config).await;
        assert!(matches!(result, Err(SamError::Timeout)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let endpoint = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let err = SamClient::connect(&endpoint).await.err().unwrap();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let result = SamClient::connect("no-port-here").await;
        assert!(matches!(result, Err(SamError::ConfigurationError(_))));
    }
}

// ============================================================================
// Key Generation Tests
// ============================================================================

mod key_generation {
    use super::*;

    #[tokio::test]
    async fn test_generate_keys_repeatedly() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            fixtures::dest_reply("pub1", "priv1"),
            "DEST REPLY PRIV=priv2 PUB=pub2\n".into(),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        let first = client.generate_keys().await.unwrap();
        let second = client.generate_keys().await.unwrap();

        assert_eq!(first.address().as_str(), "pub1");
        assert_eq!(first.private_key(), "priv1");
        assert_eq!(second.address().as_str(), "pub2");
        assert_eq!(second.private_key(), "priv2");
    }

    #[tokio::test]
    async fn test_generate_keys_unknown_token() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            "DEST REPLY PUB=abc FOO=bar\n".into(),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        assert!(matches!(
            client.generate_keys().await,
            Err(SamError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_keys_missing_private() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            "DEST REPLY PUB=abc\n".into(),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        assert!(matches!(
            client.generate_keys().await,
            Err(SamError::ParseError(_))
        ));
    }
}

// ============================================================================
// Naming Tests
// ============================================================================

mod naming {
    use super::*;

    #[tokio::test]
    async fn test_lookup_found() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            fixtures::naming_value("stats.i2p", "statsdest"),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        let addr = client.lookup("stats.i2p").await.unwrap();
        assert_eq!(addr, I2pAddr::new("statsdest"));
        assert_eq!(bridge.commands(0)[1], "NAMING LOOKUP NAME=stats.i2p");
    }

    #[tokio::test]
    async fn test_lookup_nonexistent() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            fixtures::naming_not_found("nonexistent.i2p"),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        let err = client.lookup("nonexistent.i2p").await.unwrap_err();
        assert!(err.to_string().contains("Unable to resolve nonexistent.i2p"));
    }

    #[tokio::test]
    async fn test_lookup_bad_header() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            "NAMING STATUS RESULT=OK VALUE=x\n".into(),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        assert!(matches!(
            client.lookup("x.i2p").await,
            Err(SamError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_after_failed_lookup() {
        let bridge = MockSamBridge::start(vec![vec![
            fixtures::hello_ok(),
            fixtures::naming_not_found("gone.i2p"),
            fixtures::naming_value("here.i2p", "dest"),
        ]])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        assert!(client.lookup("gone.i2p").await.is_err());
        assert_eq!(client.lookup("here.i2p").await.unwrap().as_str(), "dest");
    }
}

// ============================================================================
// Session Tests
// ============================================================================

mod sessions {
    use super::*;

    #[tokio::test]
    async fn test_session_created() {
        let bridge = session_bridge(fixtures::session_ok("K")).await;
        let request = SessionRequest::new(SessionStyle::Stream, "tun", keys("K"))
            .option("inbound.quantity=2")
            .option("outbound.quantity=2")
            .extra("SIGNATURE_TYPE=7");

        let session = create(&bridge, request).await.unwrap();
        assert_eq!(session.id(), "tun");
        assert_eq!(session.address().as_str(), "pubkey");
        assert_eq!(
            bridge.commands(1)[1],
            "SESSION CREATE STYLE=STREAM ID=tun DESTINATION=K \
             OPTION=inbound.quantity=2 OPTION=outbound.quantity=2 SIGNATURE_TYPE=7"
        );

        assert!(bridge.wait_closed(0, CLOSE_WAIT).await);
        assert!(!bridge.is_closed(1));
        session.close().await.unwrap();
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_stream_handed_to_caller() {
        let bridge = session_bridge(fixtures::session_ok("K")).await;
        let session = create(&bridge, SessionRequest::new(SessionStyle::Raw, "r", keys("K")))
            .await
            .unwrap();

        let (stream, confirmed) = session.into_parts();
        assert_eq!(confirmed.as_str(), "K");
        assert_eq!(
            stream.get_ref().peer_addr().unwrap().to_string(),
            bridge.endpoint()
        );
        assert!(!bridge.is_closed(1));
        drop(stream);
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_integrity_error() {
        let bridge = session_bridge(fixtures::session_ok("NOT-K")).await;
        let err = create(&bridge, SessionRequest::new(SessionStyle::Stream, "a", keys("K")))
            .await
            .unwrap_err();

        match err {
            SamError::IntegrityError { requested, received } => {
                assert_eq!(requested, "K");
                assert_eq!(received, "NOT-K");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_duplicated_id() {
        let bridge = session_bridge(fixtures::session_duplicated_id()).await;
        let err = create(&bridge, SessionRequest::new(SessionStyle::Stream, "a", keys("K")))
            .await
            .unwrap_err();
        assert!(matches!(err, SamError::DuplicateSessionId));
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_duplicated_dest() {
        let bridge = session_bridge(fixtures::session_duplicated_dest()).await;
        let err = create(&bridge, SessionRequest::new(SessionStyle::Datagram, "a", keys("K")))
            .await
            .unwrap_err();
        assert!(matches!(err, SamError::DuplicateDestination));
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_invalid_key() {
        let bridge = session_bridge(fixtures::session_invalid_key()).await;
        let err = create(&bridge, SessionRequest::new(SessionStyle::Raw, "a", keys("K")))
            .await
            .unwrap_err();
        assert!(matches!(err, SamError::InvalidKey));
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_i2p_error() {
        let bridge = session_bridge(fixtures::session_i2p_error("no tunnels")).await;
        let err = create(&bridge, SessionRequest::new(SessionStyle::Stream, "a", keys("K")))
            .await
            .unwrap_err();
        assert!(matches!(err, SamError::RemoteError(ref m) if m == "no tunnels"));
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_unparseable_reply() {
        let bridge = session_bridge("SESSION STATUS RESULT=WAT\n".into()).await;
        let err = create(&bridge, SessionRequest::new(SessionStyle::Stream, "a", keys("K")))
            .await
            .unwrap_err();
        assert!(matches!(err, SamError::ParseError(ref m) if m.contains("RESULT=WAT")));
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
    }

    #[tokio::test]
    async fn test_session_handshake_failure_on_second_connection() {
        let bridge = MockSamBridge::start(vec![
            vec![fixtures::hello_ok()],
            vec![fixtures::hello_noversion()],
        ])
        .await
        .unwrap();

        let err = create(&bridge, SessionRequest::new(SessionStyle::Stream, "a", keys("K")))
            .await
            .unwrap_err();
        assert!(matches!(err, SamError::UnsupportedVersion));
        assert!(bridge.wait_closed(1, CLOSE_WAIT).await);
        assert_eq!(bridge.commands(1).len(), 1);
    }

    #[tokio::test]
    async fn test_generated_keys_feed_session() {
        let bridge = MockSamBridge::start(vec![
            vec![fixtures::hello_ok(), fixtures::dest_reply("PUB", "PRIVBLOB")],
            vec![fixtures::hello_ok(), fixtures::session_ok("PRIVBLOB")],
        ])
        .await
        .unwrap();

        let mut client = SamClient::with_config(bridge.config()).await.unwrap();
        let keys = client.generate_keys().await.unwrap();
        let session = client
            .create_datagram_session("dg", keys, &["i2cp.leaseSetEncType=4"])
            .await
            .unwrap();

        assert_eq!(session.style(), SessionStyle::Datagram);
        assert_eq!(session.address().as_str(), "PUB");
        assert_eq!(
            bridge.commands(1)[1],
            "SESSION CREATE STYLE=DATAGRAM ID=dg DESTINATION=PRIVBLOB OPTION=i2cp.leaseSetEncType=4"
        );
    }
}

// ============================================================================
// Live Router Tests
// ============================================================================

mod live {
    use super::*;

    fn endpoint() -> String {
        std::env::var("SAM_ENDPOINT").unwrap_or_else(|_| "127.0.0.1:7656".to_string())
    }

    #[tokio::test]
    #[ignore = "Requires a running I2P router with the SAM bridge enabled"]
    async fn test_complete_workflow() {
        let mut client = SamClient::connect(&endpoint()).await.unwrap();

        let keys = client.generate_keys().await.unwrap();
        println!("Generated {}", keys.address().base32().unwrap());

        match client.lookup("nonexistent-host-for-tests.i2p").await {
            Err(SamError::RemoteError(msg)) => println!("Lookup failed as expected: {}", msg),
            other => println!("Lookup returned {:?}", other),
        }

        let session = client
            .create_session(SessionRequest::with_random_id(SessionStyle::Stream, keys))
            .await
            .unwrap();
        println!("Session {} created", session.id());
        session.close().await.unwrap();
    }
}
