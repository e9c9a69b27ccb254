//! A document store persisted as one JSON file.
//!
//! Every operation takes an OS lock on a sibling `<file>.lock` file, shared
//! for reads and exclusive for transactions, then reads the store file afresh.
//! A transaction runs on the loaded copy and replaces the file before the lock
//! is released, so several processes can share a store without losing writes.
//! The whole file is read and rewritten by every transaction: batch writes
//! with one transaction when possible.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use answer_engine::*;
use fd_lock::RwLock;
use log::{debug, info};
use snafu::prelude::*;

use crate::survey::*;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

fn backend_error<E>(message: String, e: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend {
        message,
        source: Box::new(e),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(suffix);
    PathBuf::from(p)
}

fn decode(path: &Path, contents: &str) -> Result<MemoryCollection, serde_json::Error> {
    let coll: MemoryCollection = serde_json::from_str(contents)?;
    debug!(
        "JsonFileStore: {}: {} answer sheets loaded",
        path.display(),
        coll.len()
    );
    Ok(coll)
}

impl JsonFileStore {
    /// Opens the store and checks that the file can be decoded. A missing file
    /// is an empty store, created on the first write.
    pub fn open(path: &str) -> BSurveyResult<JsonFileStore> {
        let store = JsonFileStore {
            path: PathBuf::from(path),
            lock_path: with_suffix(Path::new(path), ".lock"),
        };
        if store.path.exists() {
            let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
            let coll = decode(&store.path, &contents).context(LoadingStoreSnafu { path })?;
            info!("JsonFileStore: {}: {} answer sheets", path, coll.len());
        } else {
            info!("JsonFileStore: {}: new store", path);
        }
        Ok(store)
    }

    /// A copy of the current content of the file.
    pub fn snapshot(&self) -> StoreResult<MemoryCollection> {
        let lock = self.lock_file()?;
        let _guard = lock.read().map_err(|e| self.lock_error(e))?;
        self.load()
    }

    fn lock_file(&self) -> StoreResult<RwLock<File>> {
        let f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| {
                backend_error(format!("cannot open {}", self.lock_path.display()), e)
            })?;
        Ok(RwLock::new(f))
    }

    fn lock_error(&self, e: io::Error) -> StoreError {
        backend_error(format!("cannot lock {}", self.lock_path.display()), e)
    }

    // Called with the lock held.
    fn load(&self) -> StoreResult<MemoryCollection> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MemoryCollection::new()),
            Err(e) => {
                return Err(backend_error(
                    format!("cannot read {}", self.path.display()),
                    e,
                ))
            }
        };
        decode(&self.path, &contents)
            .map_err(|e| backend_error(format!("cannot decode {}", self.path.display()), e))
    }

    // Called with the exclusive lock held. The sibling file is renamed over the
    // store, so a crash never leaves a truncated store.
    fn persist(&self, coll: &MemoryCollection) -> StoreResult<()> {
        let js = serde_json::to_string_pretty(coll)
            .map_err(|e| backend_error("cannot encode the answer sheets".to_string(), e))?;
        let tmp_path = with_suffix(&self.path, ".tmp");
        fs::write(&tmp_path, js)
            .map_err(|e| backend_error(format!("cannot write {}", tmp_path.display()), e))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| backend_error(format!("cannot replace {}", self.path.display()), e))?;
        debug!(
            "JsonFileStore: {}: {} answer sheets written",
            self.path.display(),
            coll.len()
        );
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Collection) -> StoreResult<T>,
    {
        let mut lock = self.lock_file()?;
        let _guard = lock.write().map_err(|e| self.lock_error(e))?;
        let current = self.load()?;
        let (working, res) = run_on_copy(&current, f)?;
        self.persist(&working)?;
        Ok(res)
    }

    fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn Collection) -> StoreResult<T>,
    {
        let lock = self.lock_file()?;
        let _guard = lock.read().map_err(|e| self.lock_error(e))?;
        let current = self.load()?;
        f(&current)
    }
}
