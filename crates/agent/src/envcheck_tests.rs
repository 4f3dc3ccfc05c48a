// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::net::UnixListener;

#[test]
fn expand_env_substitutes_known_variables() {
    std::env::set_var("FR_ENVCHECK_TEST_VAR", "/tmp/fr");
    assert_eq!(expand_env("$FR_ENVCHECK_TEST_VAR/docker.sock"), "/tmp/fr/docker.sock");
    assert_eq!(expand_env("no variables here"), "no variables here");
    assert_eq!(expand_env("$FR_ENVCHECK_UNSET_VAR/x"), "/x");
    assert_eq!(expand_env("a$"), "a$");
}

#[test]
fn explicit_docker_host_wins() {
    let socket = resolve_socket("unix:///custom/docker.sock").unwrap();
    assert_eq!(socket, "unix:///custom/docker.sock");
}

#[test]
fn docker_host_env_is_honored() {
    std::env::set_var("DOCKER_HOST", "unix:///from/env.sock");
    let socket = resolve_socket("").unwrap();
    std::env::remove_var("DOCKER_HOST");
    assert_eq!(socket, "unix:///from/env.sock");
}

async fn socket_server(response: &'static str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docker.sock");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            use tokio::io::AsyncWriteExt;
            let mut buf = [0u8; 1024];
            use tokio::io::AsyncReadExt;
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(response.as_bytes()).await;
        }
    });
    let socket = format!("unix://{}", path.display());
    (dir, socket)
}

#[tokio::test]
async fn ping_succeeds_against_a_healthy_daemon() {
    let (_dir, socket) =
        socket_server("HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK").await;
    ping_daemon(&socket).await.unwrap();
}

#[tokio::test]
async fn ping_reports_bad_status() {
    let (_dir, socket) = socket_server("HTTP/1.1 500 Internal Server Error\r\n\r\n").await;
    let err = ping_daemon(&socket).await.unwrap_err();
    assert!(matches!(err, EnvCheckError::BadStatus { .. }));
}

#[tokio::test]
async fn ping_fails_when_nothing_listens() {
    let err = ping_daemon("unix:///nonexistent/docker.sock").await.unwrap_err();
    assert!(matches!(err, EnvCheckError::Unreachable { .. }));
}

#[tokio::test]
async fn tcp_schemes_are_rejected() {
    let err = ping_daemon("tcp://127.0.0.1:2375").await.unwrap_err();
    assert!(matches!(err, EnvCheckError::UnsupportedScheme(_)));
}
