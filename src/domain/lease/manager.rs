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

use crate::domain::lease::store::LeaseStore;
use crate::domain::lease::table::LeaseTable;
use crate::infrastructure::constants::{
    CANDIDATE_SAMPLE_LIMIT, DEFAULT_ACQUIRE_RETRIES, DEFAULT_LOCK_WAIT_SECS, KIND_BIN,
    NODE_PORT_MAX, NODE_PORT_MIN,
};
use crate::shared::error::{RegistryError, Result};
use rand::Rng;
use std::collections::HashSet;
use std::net::TcpListener;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Object-safe seam the pipeline allocates ports through.
pub trait PortAllocator: Send + Sync {
    fn acquire(&self, owner: &str) -> Result<u16>;
    fn release(&self, owner: &str) -> Result<()>;
}

/// Source of currently-live lease owners, used for the stale-lease sweep.
/// The query is advisory: a failure skips the sweep, it never fails a caller.
pub trait OwnerLiveness: Send + Sync {
    fn live_owners(&self) -> Result<Vec<String>>;
}

/// Live owners are the kind clusters present on this host, one name per
/// output line of `kind get clusters`.
pub struct KindClusterLiveness;

impl OwnerLiveness for KindClusterLiveness {
    fn live_owners(&self) -> Result<Vec<String>> {
        let output = Command::new(KIND_BIN).args(["get", "clusters"]).output()?;
        if !output.status.success() {
            return Err(RegistryError::command(
                format!("{} get clusters", KIND_BIN),
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

/// Hands out unique NodePort values to concurrent invocations of this tool,
/// coordinated only through the shared lease file.
///
/// Acquisition is idempotent per owner and every mutation happens inside one
/// lock scope of the underlying store. The bind probe and the liveness sweep
/// are both best-effort; neither defends against port users outside this
/// tool's coordination.
pub struct PortLeaseManager<S: LeaseStore> {
    store: S,
    liveness: Box<dyn OwnerLiveness>,
    lock_wait: Duration,
    max_retries: usize,
}

impl<S: LeaseStore> PortLeaseManager<S> {
    pub fn new(store: S, liveness: Box<dyn OwnerLiveness>) -> Self {
        Self {
            store,
            liveness,
            lock_wait: Duration::from_secs(DEFAULT_LOCK_WAIT_SECS),
            max_retries: DEFAULT_ACQUIRE_RETRIES,
        }
    }

    pub fn with_limits(mut self, lock_wait: Duration, max_retries: usize) -> Self {
        self.lock_wait = lock_wait;
        self.max_retries = max_retries;
        self
    }

    fn acquire_port(&self, owner: &str) -> Result<u16> {
        let mut banned: HashSet<u16> = HashSet::new();

        for attempt in 0..self.max_retries {
            let outcome = self.store.with_lock(self.lock_wait, |table| {
                self.sweep_stale(table);

                // Idempotent fast path: the owner already holds a lease.
                if let Some(port) = table.port_for_owner(owner) {
                    return Ok(AttemptOutcome::Acquired(port));
                }

                let candidate = match pick_candidate(table, &banned) {
                    Some(p) => p,
                    None => return Ok(AttemptOutcome::Exhausted),
                };

                if !port_is_bindable(candidate) {
                    return Ok(AttemptOutcome::Rejected(candidate));
                }

                // Race guard: a concurrent writer may have taken the
                // candidate between selection and the bind probe.
                if table.contains_port(candidate) {
                    return Ok(AttemptOutcome::Rejected(candidate));
                }

                table.insert(candidate, owner);
                Ok(AttemptOutcome::Acquired(candidate))
            })?;

            match outcome {
                AttemptOutcome::Acquired(port) => return Ok(port),
                AttemptOutcome::Rejected(port) => {
                    debug!(port, attempt, "node port candidate rejected");
                    banned.insert(port);
                }
                AttemptOutcome::Exhausted => break,
            }
        }

        Err(RegistryError::MaxRetriesReached {
            attempts: self.max_retries,
        })
    }

    fn release_port(&self, owner: &str) -> Result<()> {
        self.store.with_lock(self.lock_wait, |table| {
            if let Some(port) = table.remove_owner(owner) {
                debug!(port, owner, "released node port lease");
            }
            Ok(())
        })
    }

    fn sweep_stale(&self, table: &mut LeaseTable) {
        match self.liveness.live_owners() {
            Ok(live) => table.retain_owners(&live),
            Err(e) => debug!("skipping stale-lease sweep: {}", e),
        }
    }
}

impl<S: LeaseStore> PortAllocator for PortLeaseManager<S> {
    fn acquire(&self, owner: &str) -> Result<u16> {
        self.acquire_port(owner)
    }

    fn release(&self, owner: &str) -> Result<()> {
        self.release_port(owner)
    }
}

enum AttemptOutcome {
    Acquired(u16),
    Rejected(u16),
    Exhausted,
}

/// Pseudo-random port from the NodePort range, excluding leased and banned
/// ports. Bounded sampling: a saturated table yields `None` rather than
/// spinning.
fn pick_candidate(table: &LeaseTable, banned: &HashSet<u16>) -> Option<u16> {
    let mut rng = rand::thread_rng();
    for _ in 0..CANDIDATE_SAMPLE_LIMIT {
        let port = rng.gen_range(NODE_PORT_MIN..=NODE_PORT_MAX);
        if !table.contains_port(port) && !banned.contains(&port) {
            return Some(port);
        }
    }
    None
}

/// Probe whether the port is free on this host by binding and immediately
/// releasing a local listener.
fn port_is_bindable(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lease::store::MemoryLeaseStore;

    struct StaticLiveness(Vec<String>);

    impl OwnerLiveness for StaticLiveness {
        fn live_owners(&self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingLiveness;

    impl OwnerLiveness for FailingLiveness {
        fn live_owners(&self) -> Result<Vec<String>> {
            Err(RegistryError::command("kind get clusters", "not installed"))
        }
    }

    fn manager_with(
        store: MemoryLeaseStore,
        live: Vec<&str>,
    ) -> PortLeaseManager<MemoryLeaseStore> {
        PortLeaseManager::new(
            store,
            Box::new(StaticLiveness(live.into_iter().map(String::from).collect())),
        )
    }

    #[test]
    fn acquire_is_idempotent_per_owner() {
        let manager = manager_with(MemoryLeaseStore::new(), vec!["kind-a"]);

        let first = manager.acquire("kind-a").expect("first acquire");
        let second = manager.acquire("kind-a").expect("second acquire");
        assert_eq!(first, second);
        assert!((NODE_PORT_MIN..=NODE_PORT_MAX).contains(&first));
    }

    #[test]
    fn distinct_owners_get_distinct_ports() {
        let manager = manager_with(MemoryLeaseStore::new(), vec!["kind-a", "kind-b"]);

        let a = manager.acquire("kind-a").expect("acquire a");
        let b = manager.acquire("kind-b").expect("acquire b");
        assert_ne!(a, b);
    }

    #[test]
    fn release_removes_only_the_matching_owner() {
        let store = MemoryLeaseStore::new();
        let manager = manager_with(store, vec!["kind-a", "kind-b"]);

        manager.acquire("kind-a").expect("acquire a");
        let b = manager.acquire("kind-b").expect("acquire b");
        manager.release("kind-a").expect("release a");

        let snapshot = manager.store.snapshot();
        assert_eq!(snapshot.port_for_owner("kind-a"), None);
        assert_eq!(snapshot.port_for_owner("kind-b"), Some(b));
    }

    #[test]
    fn release_of_unknown_owner_is_ok() {
        let manager = manager_with(MemoryLeaseStore::new(), vec![]);
        manager.release("kind-never-leased").expect("release");
    }

    #[test]
    fn stale_owners_are_swept_on_acquisition() {
        let store = MemoryLeaseStore::new();
        store
            .with_lock(Duration::from_secs(1), |table| {
                table.insert(30777, "kind-dead");
                table.insert(30888, "kind-live");
                Ok(())
            })
            .expect("seed");

        let manager = manager_with(store, vec!["kind-live", "kind-new"]);
        manager.acquire("kind-new").expect("acquire");

        let snapshot = manager.store.snapshot();
        assert_eq!(snapshot.port_for_owner("kind-dead"), None);
        assert_eq!(snapshot.port_for_owner("kind-live"), Some(30888));
    }

    #[test]
    fn liveness_failure_skips_sweep_and_still_acquires() {
        let store = MemoryLeaseStore::new();
        store
            .with_lock(Duration::from_secs(1), |table| {
                table.insert(30777, "kind-old");
                Ok(())
            })
            .expect("seed");

        let manager = PortLeaseManager::new(store, Box::new(FailingLiveness));
        let port = manager.acquire("kind-new").expect("acquire");
        assert_ne!(port, 30777);

        let snapshot = manager.store.snapshot();
        assert_eq!(snapshot.port_for_owner("kind-old"), Some(30777));
    }
}
