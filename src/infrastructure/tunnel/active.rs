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

use crate::infrastructure::tunnel::forwarder::Tunnel;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Process-wide registry of running tunnels, keyed by test id.
///
/// Setup and teardown are independent invocations that must agree on which
/// subprocess to stop, so tunnels are parked here between them. Entries go in
/// when a tunnel starts and are taken out to be stopped; the mutex only
/// guards the map, never an in-flight stop — callers take ownership under
/// the lock and stop outside it.
pub struct TunnelRegistry {
    inner: Mutex<HashMap<String, Box<dyn Tunnel>>>,
}

static INSTANCE: OnceLock<TunnelRegistry> = OnceLock::new();

impl TunnelRegistry {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// The single process-wide instance.
    pub fn global() -> &'static TunnelRegistry {
        INSTANCE.get_or_init(TunnelRegistry::new)
    }

    /// Park a tunnel under `test_id`, returning any tunnel it displaces so
    /// the caller can stop it.
    pub fn insert(&self, test_id: &str, tunnel: Box<dyn Tunnel>) -> Option<Box<dyn Tunnel>> {
        self.inner
            .lock()
            .expect("tunnel registry mutex")
            .insert(test_id.to_string(), tunnel)
    }

    /// Remove and return the tunnel for `test_id`, if one is parked.
    pub fn take(&self, test_id: &str) -> Option<Box<dyn Tunnel>> {
        self.inner
            .lock()
            .expect("tunnel registry mutex")
            .remove(test_id)
    }

    pub fn contains(&self, test_id: &str) -> bool {
        self.inner
            .lock()
            .expect("tunnel registry mutex")
            .contains_key(test_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::Result;
    use async_trait::async_trait;

    struct NullTunnel;

    #[async_trait]
    impl Tunnel for NullTunnel {
        async fn start(&mut self) -> Result<()> {
            Ok(())
        }
        async fn stop(&mut self) {}
        fn local_endpoint(&self) -> String {
            "127.0.0.1:0".to_string()
        }
    }

    #[test]
    fn insert_take_lifecycle() {
        let registry = TunnelRegistry::new();
        assert!(registry.take("t-active").is_none());

        registry.insert("t-active", Box::new(NullTunnel));
        assert!(registry.contains("t-active"));

        assert!(registry.take("t-active").is_some());
        assert!(!registry.contains("t-active"));
        assert!(registry.take("t-active").is_none());
    }

    #[test]
    fn insert_displaces_the_previous_tunnel() {
        let registry = TunnelRegistry::new();
        assert!(registry.insert("t-dup", Box::new(NullTunnel)).is_none());
        assert!(registry.insert("t-dup", Box::new(NullTunnel)).is_some());
    }
}
