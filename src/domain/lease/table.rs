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

use std::collections::BTreeMap;

/// Port-to-owner mapping persisted as the sole contents of the shared lease
/// file. Ports are serialized as decimal strings so the file is a flat JSON
/// object: `{ "30500": "kind-test-1", ... }`.
///
/// Invariants: a port maps to at most one owner and an owner holds at most
/// one port. Both are maintained by the mutation methods, not by the parser:
/// whatever is on disk is loaded as-is and healed on the next write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseTable {
    entries: BTreeMap<String, String>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw file contents. Empty or unparsable content yields an
    /// empty table so a corrupt lease file never fails a caller.
    pub fn parse_lenient(raw: &str) -> Self {
        let entries = serde_json::from_str::<BTreeMap<String, String>>(raw).unwrap_or_default();
        Self { entries }
    }

    pub fn to_json(&self) -> String {
        // BTreeMap serialization cannot fail
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_port(&self, port: u16) -> bool {
        self.entries.contains_key(&port.to_string())
    }

    /// The port currently leased to `owner`, if any.
    pub fn port_for_owner(&self, owner: &str) -> Option<u16> {
        self.entries
            .iter()
            .find(|(_, v)| v.as_str() == owner)
            .and_then(|(k, _)| k.parse().ok())
    }

    pub fn insert(&mut self, port: u16, owner: &str) {
        self.entries.insert(port.to_string(), owner.to_string());
    }

    /// Remove the single entry held by `owner`. Returns the released port, or
    /// `None` when the owner held no lease.
    pub fn remove_owner(&mut self, owner: &str) -> Option<u16> {
        let key = self
            .entries
            .iter()
            .find(|(_, v)| v.as_str() == owner)
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&key);
        key.parse().ok()
    }

    /// Drop every entry whose owner is not in `live`.
    pub fn retain_owners(&mut self, live: &[String]) {
        self.entries.retain(|_, owner| live.contains(owner));
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_and_garbage_as_empty_table() {
        assert!(LeaseTable::parse_lenient("").is_empty());
        assert!(LeaseTable::parse_lenient("not json at all {{{").is_empty());
        assert!(LeaseTable::parse_lenient("[1, 2, 3]").is_empty());
    }

    #[test]
    fn roundtrip_preserves_entries() {
        let mut table = LeaseTable::new();
        table.insert(30500, "kind-a");
        table.insert(31000, "kind-b");

        let parsed = LeaseTable::parse_lenient(&table.to_json());
        assert_eq!(parsed, table);
        assert_eq!(parsed.port_for_owner("kind-a"), Some(30500));
        assert!(parsed.contains_port(31000));
    }

    #[test]
    fn remove_owner_is_a_noop_for_unknown_owner() {
        let mut table = LeaseTable::new();
        table.insert(30500, "kind-a");

        assert_eq!(table.remove_owner("kind-missing"), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.remove_owner("kind-a"), Some(30500));
        assert!(table.is_empty());
    }

    #[test]
    fn retain_owners_sweeps_stale_entries() {
        let mut table = LeaseTable::new();
        table.insert(30500, "kind-live");
        table.insert(31000, "kind-gone");

        table.retain_owners(&["kind-live".to_string()]);
        assert_eq!(table.port_for_owner("kind-live"), Some(30500));
        assert!(!table.contains_port(31000));
    }
}
