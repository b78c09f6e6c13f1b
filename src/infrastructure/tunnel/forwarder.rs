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

use crate::infrastructure::constants::{
    KUBECTL_BIN, REGISTRY_SERVICE, TUNNEL_POLL_INTERVAL_MS, TUNNEL_READY_TIMEOUT_SECS,
};
use crate::shared::error::{RegistryError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::debug;

/// A long-lived relay from a host port to the same-numbered port of a
/// cluster service.
#[async_trait]
pub trait Tunnel: Send + Sync {
    async fn start(&mut self) -> Result<()>;
    async fn stop(&mut self);
    fn local_endpoint(&self) -> String;
}

/// Tunnel over a `kubectl port-forward` subprocess.
///
/// `start` spawns the subprocess and polls a local TCP connect until the
/// relay accepts connections; on timeout the subprocess is already stopped
/// when the error returns. `stop` is an idempotent best-effort kill.
pub struct PortForwarder {
    namespace: String,
    port: u16,
    kubeconfig: Option<String>,
    child: Option<Child>,
}

impl PortForwarder {
    pub fn new(namespace: impl Into<String>, port: u16, kubeconfig: Option<String>) -> Self {
        Self {
            namespace: namespace.into(),
            port,
            kubeconfig,
            child: None,
        }
    }
}

#[async_trait]
impl Tunnel for PortForwarder {
    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let service = format!("service/{}", REGISTRY_SERVICE);
        let mapping = format!("{}:{}", self.port, self.port);
        let mut cmd = Command::new(KUBECTL_BIN);
        cmd.args([
            "port-forward",
            service.as_str(),
            mapping.as_str(),
            "--namespace",
            self.namespace.as_str(),
        ]);
        if let Some(ref kubeconfig) = self.kubeconfig {
            cmd.args(["--kubeconfig", kubeconfig.as_str()]);
        }

        let child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.child = Some(child);
        debug!(port = self.port, namespace = %self.namespace, "port-forward spawned");

        let timeout = Duration::from_secs(TUNNEL_READY_TIMEOUT_SECS);
        let started = Instant::now();
        loop {
            if TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }

            // A subprocess that already exited will never become reachable.
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.child = None;
                    return Err(RegistryError::command(
                        format!("{} port-forward {}", KUBECTL_BIN, mapping),
                        format!("exited early with {}", status),
                    ));
                }
            }

            if started.elapsed() >= timeout {
                self.stop().await;
                return Err(RegistryError::TunnelNotReady {
                    port: self.port,
                    waited: timeout,
                });
            }
            sleep(Duration::from_millis(TUNNEL_POLL_INTERVAL_MS)).await;
        }
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Best-effort: the relay may already be gone.
            let _ = child.kill().await;
        }
    }

    fn local_endpoint(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_before_start_is_a_noop() {
        let mut forwarder = PortForwarder::new("reg-test", 30500, None);
        forwarder.stop().await;
        forwarder.stop().await;
    }

    #[tokio::test]
    async fn local_endpoint_reflects_the_configured_port() {
        let mut forwarder = PortForwarder::new("reg-test", 30555, None);
        assert_eq!(forwarder.local_endpoint(), "127.0.0.1:30555");
        forwarder.stop().await;
        assert_eq!(forwarder.local_endpoint(), "127.0.0.1:30555");
    }
}
