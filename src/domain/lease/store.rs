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

use crate::domain::lease::table::LeaseTable;
use crate::infrastructure::constants::LOCK_POLL_INTERVAL_MS;
use crate::shared::error::{RegistryError, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Scoped read-modify-write access to the shared lease table.
///
/// The table only exists as the contents of the backing store; callers get a
/// mutable view for the duration of one lock scope and must not cache it
/// beyond the closure.
pub trait LeaseStore: Send + Sync {
    /// Run `f` with the lease table under the store's exclusive lock, waiting
    /// at most `wait` for the lock. The (possibly mutated) table is persisted
    /// when `f` returns Ok; on error nothing is written back.
    fn with_lock<T, F>(&self, wait: Duration, f: F) -> Result<T>
    where
        F: FnOnce(&mut LeaseTable) -> Result<T>;
}

/// Lease store backed by a single shared file and an advisory `flock`.
///
/// The lock is polled non-blocking at a fixed interval so a caller-supplied
/// deadline bounds acquisition. The whole file is truncated and rewritten on
/// every mutation; partial writes are never left behind under the lock.
pub struct FileLeaseStore {
    path: PathBuf,
}

impl FileLeaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LeaseStore for FileLeaseStore {
    fn with_lock<T, F>(&self, wait: Duration, f: F) -> Result<T>
    where
        F: FnOnce(&mut LeaseTable) -> Result<T>,
    {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(LOCK_POLL_INTERVAL_MS));
                }
                Err(_) => return Err(RegistryError::LockTimeout(wait)),
            }
        }

        let result: Result<T> = (|| {
            let mut raw = String::new();
            file.read_to_string(&mut raw)?;
            let mut table = LeaseTable::parse_lenient(&raw);

            let value = f(&mut table)?;

            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(table.to_json().as_bytes())?;
            file.flush()?;
            Ok(value)
        })();

        let _ = fs2::FileExt::unlock(&file);
        result
    }
}

#[cfg(test)]
pub(crate) struct MemoryLeaseStore {
    table: std::sync::Mutex<LeaseTable>,
}

#[cfg(test)]
impl MemoryLeaseStore {
    pub(crate) fn new() -> Self {
        Self {
            table: std::sync::Mutex::new(LeaseTable::new()),
        }
    }

    pub(crate) fn snapshot(&self) -> LeaseTable {
        self.table.lock().expect("lease table mutex").clone()
    }
}

#[cfg(test)]
impl LeaseStore for MemoryLeaseStore {
    fn with_lock<T, F>(&self, _wait: Duration, f: F) -> Result<T>
    where
        F: FnOnce(&mut LeaseTable) -> Result<T>,
    {
        let mut table = self.table.lock().expect("lease table mutex");
        let mut working = table.clone();
        let value = f(&mut working)?;
        *table = working;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileLeaseStore::new(dir.path().join("ports.json"));

        let len = store
            .with_lock(Duration::from_secs(1), |table| Ok(table.len()))
            .expect("lock");
        assert_eq!(len, 0);
    }

    #[test]
    fn corrupt_file_is_healed_on_next_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ports.json");
        std::fs::write(&path, "{{{ definitely not json").expect("seed file");

        let store = FileLeaseStore::new(&path);
        store
            .with_lock(Duration::from_secs(1), |table| {
                assert!(table.is_empty());
                table.insert(30123, "kind-a");
                Ok(())
            })
            .expect("lock");

        let raw = std::fs::read_to_string(&path).expect("read back");
        let parsed = LeaseTable::parse_lenient(&raw);
        assert_eq!(parsed.port_for_owner("kind-a"), Some(30123));
    }

    #[test]
    fn lock_held_elsewhere_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ports.json");

        let holder = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .expect("open");
        holder.try_lock_exclusive().expect("pre-lock");

        let store = FileLeaseStore::new(&path);
        let err = store
            .with_lock(Duration::from_millis(300), |_| Ok(()))
            .expect_err("lock must time out");
        assert!(matches!(err, RegistryError::LockTimeout(_)));

        let _ = fs2::FileExt::unlock(&holder);
    }

    #[test]
    fn mutation_error_leaves_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ports.json");
        std::fs::write(&path, r#"{"30500":"kind-a"}"#).expect("seed file");

        let store = FileLeaseStore::new(&path);
        let err = store.with_lock(Duration::from_secs(1), |table| {
            table.remove_owner("kind-a");
            Err::<(), _>(RegistryError::ConfigError("boom".into()))
        });
        assert!(err.is_err());

        let raw = std::fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("kind-a"));
    }
}
