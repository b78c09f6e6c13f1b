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

use crate::domain::pipeline::{RegistryProvisioner, TeardownRequest};
use crate::infrastructure::constants::{META_CLUSTER_ID, META_ENABLED, META_NAMESPACE};
use crate::shared::error::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

impl RegistryProvisioner {
    /// Best-effort mirror of [`setup`](Self::setup): every step runs even
    /// when earlier ones fail, failures are logged and swallowed, and the
    /// call succeeds regardless. This is deliberately a separate code path
    /// from setup so its lenience can never weaken setup's guarantees.
    pub async fn teardown(&self, request: TeardownRequest) -> Result<()> {
        if request.metadata.get(META_ENABLED).map(String::as_str) != Some("true") {
            info!(test_id = %request.test_id, "registry was disabled for this run, nothing to tear down");
            return Ok(());
        }

        if let Some(mut tunnel) = self.tunnels.take(&request.test_id) {
            tunnel.stop().await;
            println!("✓ Port-forward stopped");
        }

        match request.metadata.get(META_NAMESPACE) {
            Some(namespace) => {
                if let Err(e) = self.resources.delete_namespace(namespace).await {
                    warn!(namespace = %namespace, "failed to delete registry namespace: {}", e);
                } else {
                    println!("✓ Namespace {} deleted", namespace);
                }
            }
            None => warn!("namespace missing from setup metadata, skipping cluster cleanup"),
        }

        for path in &request.managed_resources {
            let path = Path::new(path);
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), "failed to remove managed file: {}", e);
            }
        }

        match request.metadata.get(META_CLUSTER_ID) {
            Some(owner) => {
                let ports = Arc::clone(&self.ports);
                let owner_clone = owner.clone();
                match tokio::task::spawn_blocking(move || ports.release(&owner_clone)).await {
                    Ok(Ok(())) => println!("✓ Node port lease released"),
                    Ok(Err(e)) => warn!(owner = %owner, "failed to release port lease: {}", e),
                    Err(e) => warn!("port release task failed: {}", e),
                }
            }
            None => warn!("cluster id missing from setup metadata, leaving the port lease in place"),
        }

        Ok(())
    }
}
