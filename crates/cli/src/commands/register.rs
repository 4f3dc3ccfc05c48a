// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fr register` - one-shot identity exchange with the coordinator.

use anyhow::{bail, Context, Result};
use clap::Args;
use fr_client::{Client, HttpClient, PingRequest, RegisterRequest};
use fr_core::{Config, Label, Registration};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[derive(Args)]
pub struct RegisterArgs {
    /// Disable interactive mode
    #[arg(long)]
    pub no_interactive: bool,
    /// Coordinator instance address
    #[arg(long)]
    pub instance: Option<String>,
    /// Runner token
    #[arg(long)]
    pub token: Option<String>,
    /// Runner name
    #[arg(long)]
    pub name: Option<String>,
    /// Runner labels, comma separated
    #[arg(long)]
    pub labels: Option<String>,
}

const DEFAULT_LABELS: &[&str] = &[
    "ubuntu-latest:docker://forge/runner-images:ubuntu-latest",
    "ubuntu-22.04:docker://forge/runner-images:ubuntu-22.04",
];

struct RegisterInputs {
    instance: String,
    token: String,
    name: String,
    labels: Vec<String>,
}

pub async fn register(cfg: Config, args: RegisterArgs) -> Result<()> {
    crate::logging::init(&cfg.log.level);
    tracing::info!(
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        version = fr_core::version(),
        "registering runner"
    );

    let inputs = if args.no_interactive {
        inputs_from_args(&cfg, &args)?
    } else {
        prompt_inputs(&cfg)?
    };

    validate_labels(&inputs.labels)?;
    tracing::info!(
        name = %inputs.name,
        instance = %inputs.instance,
        labels = ?inputs.labels,
        "waiting for registration"
    );

    do_register(&cfg, inputs).await?;
    tracing::info!("runner registered successfully");
    Ok(())
}

/// Resolve the label set: command line flag first, config file
/// overrides it, defaults otherwise.
fn resolve_labels(cfg: &Config, flag: Option<&str>) -> Vec<String> {
    if !cfg.runner.labels.is_empty() {
        if flag.is_some_and(|f| !f.trim().is_empty()) {
            tracing::warn!("labels from the command line are ignored, using the config file");
        }
        return cfg.runner.labels.clone();
    }
    match flag.map(str::trim) {
        Some(flag) if !flag.is_empty() => flag.split(',').map(str::to_string).collect(),
        _ => DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
    }
}

fn validate_labels(labels: &[String]) -> Result<()> {
    for label in labels {
        Label::parse(label).with_context(|| format!("invalid label {:?}", label))?;
    }
    Ok(())
}

fn hostname() -> String {
    hostname::get().ok().and_then(|h| h.into_string().ok()).unwrap_or_default()
}

fn inputs_from_args(cfg: &Config, args: &RegisterArgs) -> Result<RegisterInputs> {
    let Some(instance) = args.instance.clone().filter(|s| !s.is_empty()) else {
        bail!("instance address is empty");
    };
    let Some(token) = args.token.clone().filter(|s| !s.is_empty()) else {
        bail!("runner token is empty");
    };
    let name = match args.name.clone().filter(|s| !s.is_empty()) {
        Some(name) => name,
        None => {
            let name = hostname();
            tracing::info!(name = %name, "runner name is empty, using hostname");
            name
        }
    };
    Ok(RegisterInputs {
        instance,
        token,
        name,
        labels: resolve_labels(cfg, args.labels.as_deref()),
    })
}

fn prompt(message: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", message)?;
    stdout.flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_inputs(cfg: &Config) -> Result<RegisterInputs> {
    if Path::new(&cfg.runner.file).is_file() {
        let answer = prompt("Runner is already registered, overwrite the local config? [y/N]")?;
        if !answer.eq_ignore_ascii_case("y") {
            bail!("registration aborted");
        }
    }

    let mut instance = String::new();
    while instance.is_empty() {
        instance = prompt("Enter the coordinator instance URL (for example, https://forge.example.com/):")?;
    }
    let mut token = String::new();
    while token.is_empty() {
        token = prompt("Enter the runner token:")?;
    }

    let fallback = hostname();
    let mut name =
        prompt(&format!("Enter the runner name (leave blank to use the hostname: {}):", fallback))?;
    if name.is_empty() {
        name = fallback;
    }

    let labels = if !cfg.runner.labels.is_empty() {
        // labels pinned in the config file skip the prompt
        let labels = cfg.runner.labels.clone();
        validate_labels(&labels)?;
        labels
    } else {
        loop {
            let line = prompt(
                "Enter the runner labels, leave blank to use the defaults (comma-separated, for example, ubuntu-latest:docker://forge/runner-images:ubuntu-latest):",
            )?;
            let labels = resolve_labels(cfg, Some(&line));
            if validate_labels(&labels).is_ok() {
                break labels;
            }
            tracing::warn!("invalid labels, please try again");
        }
    };

    Ok(RegisterInputs { instance, token, name, labels })
}

async fn do_register(cfg: &Config, inputs: RegisterInputs) -> Result<()> {
    let client =
        HttpClient::new(&inputs.instance, cfg.runner.insecure, "", "", fr_core::version());

    // wait for the coordinator to become reachable
    loop {
        match client.ping(PingRequest { data: inputs.name.clone() }).await {
            Ok(_) => {
                tracing::debug!("coordinator is reachable");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot ping the coordinator");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    let label_names: Vec<String> = inputs
        .labels
        .iter()
        .filter_map(|l| Label::parse(l).ok().map(|l| l.name))
        .collect();

    let resp = client
        .register(RegisterRequest {
            name: inputs.name.clone(),
            token: inputs.token.clone(),
            version: fr_core::version().to_string(),
            labels: label_names,
        })
        .await
        .context("cannot register the runner")?;

    let reg = Registration {
        id: resp.runner.id,
        uuid: resp.runner.uuid,
        name: resp.runner.name,
        token: resp.runner.token,
        address: inputs.instance,
        labels: inputs.labels,
    };
    reg.save(Path::new(&cfg.runner.file)).context("failed to save registration")?;
    Ok(())
}

#[cfg(test)]
#[path = "register_tests.rs"]
mod tests;
