// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container daemon probe, run at startup when any label needs docker.
//!
//! Resolves the daemon socket from config, environment, or well-known
//! paths, then pings `/_ping` with a raw HTTP exchange over the Unix
//! socket.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum EnvCheckError {
    #[error("container daemon socket not found and docker_host config was invalid")]
    SocketNotFound,
    #[error("cannot ping the container daemon at {socket}, is it running? {source}")]
    Unreachable {
        socket: String,
        #[source]
        source: std::io::Error,
    },
    #[error("container daemon at {socket} answered {status}")]
    BadStatus { socket: String, status: String },
    #[error("unsupported socket scheme: {0}")]
    UnsupportedScheme(String),
}

const COMMON_SOCKET_PATHS: &[&str] = &[
    "/var/run/docker.sock",
    "/run/podman/podman.sock",
    "$HOME/.colima/docker.sock",
    "$XDG_RUNTIME_DIR/docker.sock",
    "$XDG_RUNTIME_DIR/podman/podman.sock",
    "$HOME/.docker/run/docker.sock",
];

/// Expand `$VAR` references from the process environment; unset
/// variables expand to nothing.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        while let Some(&(_, n)) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push('$');
        } else if let Ok(value) = std::env::var(&name) {
            out.push_str(&value);
        }
    }
    out
}

/// Resolve the daemon socket address.
///
/// Order: explicit config (a `-` means "do not mount the socket into
/// job containers" and is passed through), `DOCKER_HOST`, then the
/// well-known socket paths.
pub fn resolve_socket(config_docker_host: &str) -> Result<String, EnvCheckError> {
    if !config_docker_host.is_empty() && config_docker_host != "-" {
        return Ok(config_docker_host.to_string());
    }

    if let Ok(socket) = std::env::var("DOCKER_HOST") {
        return Ok(socket);
    }

    for path in COMMON_SOCKET_PATHS {
        let expanded = expand_env(path);
        if std::path::Path::new(&expanded).exists() {
            return Ok(format!("unix://{}", expanded));
        }
    }

    Err(EnvCheckError::SocketNotFound)
}

/// Ping the daemon's `/_ping` endpoint over its Unix socket.
pub async fn ping_daemon(socket: &str) -> Result<(), EnvCheckError> {
    let Some(path) = socket.strip_prefix("unix://") else {
        return Err(EnvCheckError::UnsupportedScheme(socket.to_string()));
    };

    let io_err = |source| EnvCheckError::Unreachable { socket: socket.to_string(), source };

    let exchange = async {
        let mut stream = UnixStream::connect(path).await?;
        stream
            .write_all(b"GET /_ping HTTP/1.1\r\nHost: docker\r\nConnection: close\r\n\r\n")
            .await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok::<Vec<u8>, std::io::Error>(response)
    };
    let response = tokio::time::timeout(Duration::from_secs(5), exchange)
        .await
        .map_err(|_| io_err(std::io::Error::new(std::io::ErrorKind::TimedOut, "ping timed out")))?
        .map_err(io_err)?;

    let head = String::from_utf8_lossy(&response);
    let status = head.lines().next().unwrap_or_default();
    if status.contains("200") {
        Ok(())
    } else {
        Err(EnvCheckError::BadStatus {
            socket: socket.to_string(),
            status: status.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "envcheck_tests.rs"]
mod tests;
