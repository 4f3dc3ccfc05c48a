// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn endpoint_trailing_slash_is_trimmed() {
    let client = HttpClient::new("https://forge.example.com/", false, "", "", "0.3.0");
    assert_eq!(client.address(), "https://forge.example.com");
    assert_eq!(client.base_url, "https://forge.example.com/api/actions");
}

#[test]
fn insecure_flag_is_reported() {
    let client = HttpClient::new("https://forge.example.com", true, "u", "t", "v");
    assert!(client.insecure());
    let client = HttpClient::new("http://forge.example.com", false, "u", "t", "v");
    assert!(!client.insecure());
}

#[test]
fn unimplemented_error_is_detectable() {
    let err = ClientError::Unimplemented { method: "Declare".to_string() };
    assert!(err.is_unimplemented());
    assert!(err.to_string().contains("Declare"));

    let err = ClientError::Status { status: 500, message: "boom".to_string() };
    assert!(!err.is_unimplemented());
}

#[tokio::test]
async fn request_against_closed_port_is_a_transport_error() {
    // Bind to an ephemeral port, then drop the listener so the connect
    // is refused immediately.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = HttpClient::new(&format!("http://127.0.0.1:{}", port), false, "", "", "");
    let err = client.ping(PingRequest { data: "hi".to_string() }).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
