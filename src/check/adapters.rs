// src/check/adapters.rs
use super::probe::{Probe, ProbeResult};
use crate::config::ProbeConfig;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;
use url::Url;

/// Runs an external program (`nomad status tetracrypt`, `podman ps`, a
/// scanner CLI, ...). Exit status zero is a pass.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Probe for CommandProbe {
    async fn check(&self) -> ProbeResult {
        debug!("Running {} {:?}", self.program, self.args);

        // kill_on_drop: an aborted check takes the child process down with it
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.program))?;

        if output.status.success() {
            Ok(first_line(&output.stdout))
        } else {
            let reason = first_line(&output.stderr)
                .or_else(|| first_line(&output.stdout))
                .unwrap_or_else(|| "no output".to_string());
            Err(anyhow!("{} exited with {}: {}", self.program, output.status, reason))
        }
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// GETs an endpoint. Passes on any 2xx, or on exactly `expected_status`
/// when one is configured.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
    expected_status: Option<u16>,
}

impl HttpProbe {
    pub fn new(url: Url, expected_status: Option<u16>) -> Self {
        Self::with_client(Client::new(), url, expected_status)
    }

    pub fn with_client(client: Client, url: Url, expected_status: Option<u16>) -> Self {
        Self {
            client,
            url,
            expected_status,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> ProbeResult {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;

        let status = response.status();
        let passed = match self.expected_status {
            Some(expected) => status.as_u16() == expected,
            None => status.is_success(),
        };

        if passed {
            Ok(Some(format!("HTTP {}", status)))
        } else {
            Err(anyhow!("HTTP {} from {}", status, self.url))
        }
    }
}

/// Build a probe from its configuration. Shares one HTTP client across all
/// endpoint probes.
pub fn build_probe(config: &ProbeConfig, client: &Client) -> Arc<dyn Probe> {
    match config {
        ProbeConfig::Command { program, args } => {
            Arc::new(CommandProbe::new(program.clone(), args.clone()))
        }
        ProbeConfig::Http {
            url,
            expected_status,
        } => Arc::new(HttpProbe::with_client(
            client.clone(),
            url.clone(),
            *expected_status,
        )),
    }
}
