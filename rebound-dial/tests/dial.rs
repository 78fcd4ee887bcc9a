//! Loopback dial tests for the restricted dialer.

use http::Uri;
use rebound_dial::{DialError, RestrictedDialer};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_service::Service;

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

#[tokio::test]
async fn test_dial_loopback_refused_by_default() {
    let (_listener, addr) = listener().await;

    let err = RestrictedDialer::new().dial(addr.as_str()).await.unwrap_err();

    assert!(err.is_internal_resolution());
    assert!(err.to_string().contains("internal network location"));
}

#[tokio::test]
async fn test_refused_dial_hands_back_connection() {
    let (listener, addr) = listener().await;

    let mut err = RestrictedDialer::new().dial(addr.as_str()).await.unwrap_err();
    let conn = err.take_conn().expect("connection should travel with the error");

    let (_accepted, peer) = listener.accept().await.unwrap();
    assert_eq!(conn.local_addr().unwrap(), peer);
    assert!(err.take_conn().is_none());
}

#[tokio::test]
async fn test_dial_loopback_allowed_when_toggle_disabled() {
    let (_listener, addr) = listener().await;

    let conn = RestrictedDialer::new()
        .loopback(false)
        .dial(addr.as_str())
        .await
        .unwrap();

    assert_eq!(conn.peer_addr().unwrap().to_string(), addr);
}

#[tokio::test]
async fn test_dial_loopback_allowed_by_prefix() {
    let (_listener, addr) = listener().await;

    let dialer = RestrictedDialer::new()
        .allow("127.0.0.1/32".parse().unwrap())
        .block("127.0.0.0/8".parse().unwrap());

    assert!(dialer.dial(addr.as_str()).await.is_ok());
}

#[tokio::test]
async fn test_dial_connect_failure() {
    let (listener, addr) = listener().await;
    drop(listener);

    let err = RestrictedDialer::permissive()
        .connect_timeout(Duration::from_secs(5))
        .dial(addr.as_str())
        .await
        .unwrap_err();

    assert!(matches!(err, DialError::Connect { .. }));
}

#[tokio::test]
async fn test_connector_rejects_loopback() {
    let (_listener, addr) = listener().await;
    let uri: Uri = format!("http://{addr}/").parse().unwrap();

    let mut connector = RestrictedDialer::new().connector();
    let err = connector.call(uri).await.unwrap_err();

    let dial = err
        .downcast_ref::<DialError>()
        .expect("rejection should surface as a DialError");
    assert!(dial.is_internal_resolution());
}

#[tokio::test]
async fn test_connector_passes_allowed_connection() {
    let (_listener, addr) = listener().await;
    let uri: Uri = format!("http://{addr}/").parse().unwrap();

    let mut connector = RestrictedDialer::permissive().connector();
    let io = connector.call(uri).await.unwrap();

    assert_eq!(io.inner().peer_addr().unwrap().to_string(), addr);
}
