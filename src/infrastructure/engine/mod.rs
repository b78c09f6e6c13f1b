// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Container-engine CLI boundary
//!
//! Everything that talks to the engine executable (`docker` by default) goes
//! through [`EngineCommand`], which resolves the binary and the optional
//! privilege-escalation prefixes from the environment once per instance.

use crate::infrastructure::constants::{
    DEFAULT_CONTAINER_ENGINE, ENV_CONTAINER_ENGINE, ENV_ENGINE_CMD_PREFIX,
    ENV_ENGINE_SUDO_CMD_PREFIX,
};
use crate::infrastructure::credentials::RegistryCredentials;
use crate::shared::error::{RegistryError, Result};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Engine invocation template: executable plus an optional command prefix
/// (e.g. `sudo -n`) taken from the environment.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: String,
    prefix: Vec<String>,
}

impl EngineCommand {
    pub fn from_env() -> Self {
        Self::resolve(ENV_ENGINE_CMD_PREFIX)
    }

    /// Variant using the elevated prefix, for operations that reach into the
    /// node containers' filesystems.
    pub fn from_env_elevated() -> Self {
        Self::resolve(ENV_ENGINE_SUDO_CMD_PREFIX)
    }

    fn resolve(prefix_var: &str) -> Self {
        let program = std::env::var(ENV_CONTAINER_ENGINE)
            .unwrap_or_else(|_| DEFAULT_CONTAINER_ENGINE.to_string());
        let prefix = std::env::var(prefix_var)
            .map(|raw| raw.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        Self { program, prefix }
    }

    fn command(&self, args: &[&str]) -> (Command, String) {
        let mut words: Vec<&str> = self.prefix.iter().map(String::as_str).collect();
        words.push(&self.program);
        words.extend_from_slice(args);

        let mut cmd = Command::new(words[0]);
        cmd.args(&words[1..]);
        (cmd, words.join(" "))
    }

    /// Run an engine command and return stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let (mut cmd, line) = self.command(args);
        let output = cmd.output().await?;

        if !output.status.success() {
            return Err(RegistryError::command(
                line,
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an engine command feeding `input` to its stdin.
    pub async fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<String> {
        let (mut cmd, line) = self.command(args);
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(RegistryError::command(
                line,
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Access to the running registry over the engine CLI.
#[async_trait]
pub trait RegistrySession: Send + Sync {
    /// Authenticate against the endpoint. Retried internally: the registry
    /// has typically just been restarted when login runs.
    async fn login(&self, endpoint: &str, credentials: &RegistryCredentials) -> Result<()>;

    /// Pull `image`, retag it for the registry and push it through the local
    /// endpoint. Returns the in-cluster reference of the pushed image.
    async fn mirror(&self, image: &str, local: &str, cluster: &str) -> Result<String>;
}

pub struct EngineRegistrySession {
    engine: EngineCommand,
}

impl EngineRegistrySession {
    pub fn new(engine: EngineCommand) -> Self {
        Self { engine }
    }

    async fn try_login(&self, endpoint: &str, credentials: &RegistryCredentials) -> Result<()> {
        self.engine
            .run_with_stdin(
                &[
                    "login",
                    endpoint,
                    "--username",
                    credentials.username.as_str(),
                    "--password-stdin",
                ],
                &credentials.password,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RegistrySession for EngineRegistrySession {
    async fn login(&self, endpoint: &str, credentials: &RegistryCredentials) -> Result<()> {
        (|| async { self.try_login(endpoint, credentials).await })
            .retry(&ExponentialBuilder::default().with_max_times(4))
            .await
    }

    async fn mirror(&self, image: &str, local: &str, cluster: &str) -> Result<String> {
        let name = image.rsplit('/').next().unwrap_or(image);
        let push_ref = format!("{}/{}", local, name);
        let cluster_ref = format!("{}/{}", cluster, name);

        self.engine.run(&["pull", image]).await?;
        self.engine.run(&["tag", image, push_ref.as_str()]).await?;
        self.engine
            .run(&["image", "inspect", push_ref.as_str()])
            .await?;
        self.engine.run(&["push", push_ref.as_str()]).await?;
        info!(image, pushed = %cluster_ref, "mirrored image into registry");

        Ok(cluster_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_includes_prefix_and_program() {
        let engine = EngineCommand {
            program: "podman".to_string(),
            prefix: vec!["sudo".to_string(), "-n".to_string()],
        };
        let (_, line) = engine.command(&["exec", "node-1", "true"]);
        assert_eq!(line, "sudo -n podman exec node-1 true");
    }

    #[test]
    fn empty_prefix_starts_with_the_program() {
        let engine = EngineCommand {
            program: "docker".to_string(),
            prefix: Vec::new(),
        };
        let (_, line) = engine.command(&["pull", "busybox"]);
        assert_eq!(line, "docker pull busybox");
    }
}
