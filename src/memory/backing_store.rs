use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

use crate::process::{timestamp_now, Pid, Process};

/// Archive of evicted processes.
///
/// Every eviction appends one human-readable record to an append-only file;
/// the in-memory index keeps the process record itself so a later
/// re-admission reconstitutes the same record without reading the file
/// back.
pub struct BackingStore {
    path: PathBuf,
    inner: Mutex<HashMap<Pid, Arc<Process>>>,
}

impl BackingStore {
    pub fn new(path: PathBuf) -> Self {
        BackingStore {
            path,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Make a process record reachable by pid. Called once per created
    /// process so `archive` can resolve an evicted pid later.
    pub fn register(&self, process: &Arc<Process>) {
        self.inner.lock().insert(process.pid(), Arc::clone(process));
    }

    /// Append one eviction record: `<name> <pid> <C> / <L> (<timestamp>)`.
    ///
    /// Concurrent callers serialize on the index lock, which doubles as the
    /// file lock.
    pub fn archive(&self, pid: Pid) -> io::Result<()> {
        let inner = self.inner.lock();
        let process = match inner.get(&pid) {
            Some(p) => p,
            None => {
                warn!("backing store: archive of unknown pid {}", pid);
                return Ok(());
            }
        };

        let snapshot = process.snapshot();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{} {} {} / {} ({})",
            snapshot.name,
            pid,
            snapshot.command_counter,
            snapshot.lines_of_code,
            timestamp_now()
        )
    }

    /// The record for a previously registered pid, for reconstitution on
    /// re-admission.
    pub fn lookup(&self, pid: Pid) -> Option<Arc<Process>> {
        self.inner.lock().get(&pid).cloned()
    }

    /// Drop a terminated process from the index.
    pub fn remove(&self, pid: Pid) {
        self.inner.lock().remove(&pid);
    }
}
