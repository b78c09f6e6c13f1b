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

//! Port lease behavior against a real shared lease file.

use registry_kube::domain::lease::manager::OwnerLiveness;
use registry_kube::{FileLeaseStore, LeaseTable, PortAllocator, PortLeaseManager};
use std::path::Path;
use std::time::Duration;

struct StaticLiveness(Vec<String>);

impl OwnerLiveness for StaticLiveness {
    fn live_owners(&self) -> registry_kube::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

fn file_manager(path: &Path, live: &[&str]) -> PortLeaseManager<FileLeaseStore> {
    PortLeaseManager::new(
        FileLeaseStore::new(path),
        Box::new(StaticLiveness(live.iter().map(|s| s.to_string()).collect())),
    )
    .with_limits(Duration::from_secs(5), 10)
}

fn read_table(path: &Path) -> LeaseTable {
    let raw = std::fs::read_to_string(path).unwrap_or_default();
    LeaseTable::parse_lenient(&raw)
}

#[test]
fn concurrent_owners_get_distinct_ports_in_range() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ports.json");

    let mut handles = Vec::new();
    for owner in ["kind-a", "kind-b", "kind-c", "kind-d"] {
        let path = path.clone();
        handles.push(std::thread::spawn(move || {
            let manager = file_manager(&path, &["kind-a", "kind-b", "kind-c", "kind-d"]);
            manager.acquire(owner).expect("acquire")
        }));
    }

    let mut ports: Vec<u16> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();
    for port in &ports {
        assert!((30000..=32767).contains(port), "port {} out of range", port);
    }
    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), 4, "owners must receive distinct ports");
}

#[test]
fn acquire_twice_returns_the_same_port() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ports.json");
    let manager = file_manager(&path, &["kind-idem"]);

    let first = manager.acquire("kind-idem").expect("first");
    let second = manager.acquire("kind-idem").expect("second");
    assert_eq!(first, second);

    // A second manager instance over the same file agrees.
    let other = file_manager(&path, &["kind-idem"]);
    assert_eq!(other.acquire("kind-idem").expect("third"), first);
}

#[test]
fn release_removes_the_entry_from_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ports.json");
    let manager = file_manager(&path, &["kind-rel"]);

    manager.acquire("kind-rel").expect("acquire");
    assert!(read_table(&path).port_for_owner("kind-rel").is_some());

    manager.release("kind-rel").expect("release");
    assert!(read_table(&path).port_for_owner("kind-rel").is_none());
}

#[test]
fn releasing_an_owner_that_never_leased_is_ok() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ports.json");
    std::fs::write(&path, r#"{"30600":"kind-other"}"#).expect("seed");

    let manager = file_manager(&path, &["kind-other"]);
    manager.release("kind-unknown").expect("release");

    let table = read_table(&path);
    assert_eq!(table.port_for_owner("kind-other"), Some(30600));
    assert_eq!(table.len(), 1);
}

#[test]
fn stale_owner_is_swept_while_live_owner_survives() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ports.json");
    std::fs::write(&path, r#"{"30601":"kind-dead","30602":"kind-live"}"#).expect("seed");

    let manager = file_manager(&path, &["kind-live", "kind-new"]);
    manager.acquire("kind-new").expect("acquire");

    let table = read_table(&path);
    assert_eq!(table.port_for_owner("kind-dead"), None);
    assert_eq!(table.port_for_owner("kind-live"), Some(30602));
    assert!(table.port_for_owner("kind-new").is_some());
}

#[test]
fn corrupt_lease_file_does_not_fail_acquisition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ports.json");
    std::fs::write(&path, "!!! not a lease table !!!").expect("seed");

    let manager = file_manager(&path, &["kind-heal"]);
    let port = manager.acquire("kind-heal").expect("acquire");

    let table = read_table(&path);
    assert_eq!(table.port_for_owner("kind-heal"), Some(port));
    assert_eq!(table.len(), 1);
}
