// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fr daemon` - the long-lived runner agent.

use anyhow::{bail, Context, Result};
use fr_agent::{envcheck, LocalExecutor, Poller, Runner};
use fr_client::HttpClient;
use fr_core::{Config, Labels, Registration, SystemClock};
use std::path::Path;
use std::sync::Arc;

pub async fn daemon(mut cfg: Config) -> Result<()> {
    crate::logging::init(&cfg.log.level);
    tracing::info!("starting runner daemon");

    let reg_path = Path::new(&cfg.runner.file).to_path_buf();
    let mut reg = match Registration::load(&reg_path) {
        Ok(reg) => reg,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("registration file not found, please register the runner first");
        }
        Err(e) => return Err(e).context("failed to load registration file"),
    };

    // labels from the config file override the registered ones
    let label_strings =
        if cfg.runner.labels.is_empty() { reg.labels.clone() } else { cfg.runner.labels.clone() };
    let labels = Labels::parse_lenient(&label_strings);
    if labels.is_empty() {
        tracing::warn!("no labels configured, runner may not be able to pick up jobs");
    }

    if labels.require_docker() {
        let socket = envcheck::resolve_socket(&cfg.container.docker_host)?;
        if socket.starts_with("unix://") {
            envcheck::ping_daemon(&socket).await?;
        } else {
            tracing::debug!(socket = %socket, "skipping liveness probe for non-unix socket");
        }
        std::env::set_var("DOCKER_HOST", &socket);
        if cfg.container.docker_host.is_empty() {
            cfg.container.docker_host = socket;
        }
        // sockets that cannot be mounted into job containers are
        // marked with "-" so the executor leaves them out
        if let Some((scheme, _)) = cfg.container.docker_host.split_once("://") {
            if !scheme.eq_ignore_ascii_case("unix") && !scheme.eq_ignore_ascii_case("npipe") {
                cfg.container.docker_host = "-".to_string();
            }
        }
    }

    if reg.labels != labels.to_strings() {
        reg.labels = labels.to_strings();
        reg.save(&reg_path).context("failed to save runner registration")?;
        tracing::info!(labels = ?reg.labels, "labels updated");
    }

    let client = Arc::new(HttpClient::new(
        &reg.address,
        cfg.runner.insecure,
        &reg.uuid,
        &reg.token,
        fr_core::version(),
    ));
    let executor = Arc::new(LocalExecutor::new());
    let runner = Arc::new(Runner::new(&cfg, &reg, client.clone(), executor, SystemClock));

    // declare version and labels before fetching any task
    match runner.declare(labels.names()).await {
        Ok(resp) => tracing::info!(
            runner = %resp.runner.name,
            version = %resp.runner.version,
            labels = ?resp.runner.labels,
            "runner declared successfully"
        ),
        Err(e) if e.is_unimplemented() => {
            bail!("the coordinator is too old to support declaring runners, please upgrade it");
        }
        Err(e) => return Err(e).context("failed to declare runner"),
    }

    let poller = Arc::new(Poller::new(&cfg, client, runner));
    let pool = tokio::spawn(Arc::clone(&poller).run());

    wait_for_shutdown_signal().await;
    tracing::info!(
        grace = ?cfg.shutdown_timeout(),
        "shutdown initiated, waiting for running jobs to complete"
    );

    if poller.shutdown(cfg.shutdown_timeout()).await.is_err() {
        tracing::warn!("cancelled in-progress jobs during shutdown");
    }
    let _ = pool.await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot install SIGTERM handler");
            let _ = ctrl_c.await;
        }
    }
}
