pub mod backing_store;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::process::{timestamp_now, Pid, Process};
use backing_store::BackingStore;

/// Residency status of an admitted process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidencyStatus {
    /// Bound to a core right now.
    Running,
    /// Admitted but off-core; eligible for eviction.
    Idle,
    /// Evicted or finished; no longer counted against memory.
    Removed,
}

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// An Idle resident was reactivated in place, consuming no fresh space.
    Rewarmed,
    Rejected,
}

/// One admitted process's accounting entry.
#[derive(Debug, Clone)]
pub struct Resident {
    pub pid: Pid,
    pub name: String,
    pub size: u64,
    pub status: ResidencyStatus,
    /// Grows by one per admission cycle spent Running, so it tracks
    /// accumulated service rather than wall time.
    pub age: u64,
}

/// Consistent view of memory for the reporting surface.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    pub max_memory: u64,
    pub frame_size: u64,
    pub used: u64,
    pub available: u64,
    pub paged_in: u64,
    pub paged_out: u64,
    pub fragmentation_kb: u64,
    pub residents: Vec<Resident>,
}

impl MemorySnapshot {
    pub fn utilization(&self) -> f32 {
        self.used as f32 / self.max_memory as f32 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryMode {
    Flat,
    Paging,
}

struct MemoryState {
    /// Frame map, owner pid per frame. Unused in flat mode, where a
    /// resident is accounted as a single region of its own size.
    frames: Vec<Option<Pid>>,
    residents: Vec<Resident>,
    available: u64,
    paged_in: u64,
    paged_out: u64,
}

/// Admits processes to main memory and evicts idle residents to the
/// backing store under memory pressure.
///
/// Flat mode (frame size == total memory) reduces admission to a size
/// check; paging mode allocates the first free frames front to back,
/// not necessarily contiguous.
pub struct MemoryManager {
    max_memory: u64,
    frame_size: u64,
    mode: MemoryMode,
    stamp_dir: PathBuf,
    backing: Arc<BackingStore>,
    state: Mutex<MemoryState>,
}

impl MemoryManager {
    pub fn new(
        max_memory: u64,
        frame_size: u64,
        backing: Arc<BackingStore>,
        stamp_dir: PathBuf,
    ) -> Self {
        let mode = if max_memory == frame_size {
            MemoryMode::Flat
        } else {
            MemoryMode::Paging
        };
        let frames = match mode {
            MemoryMode::Flat => Vec::new(),
            MemoryMode::Paging => vec![None; (max_memory / frame_size) as usize],
        };
        MemoryManager {
            max_memory,
            frame_size,
            mode,
            stamp_dir,
            backing,
            state: Mutex::new(MemoryState {
                frames,
                residents: Vec::new(),
                available: max_memory,
                paged_in: 0,
                paged_out: 0,
            }),
        }
    }

    /// Admit `process` to main memory.
    ///
    /// Idempotent for a Running resident; reactivates an Idle resident in
    /// place. A fresh allocation that does not fit evicts the oldest Idle
    /// resident and retries, bounded by the number of Idle residents; with
    /// every resident Running the admission is rejected and the caller
    /// re-queues the process.
    pub fn admit(&self, process: &Process) -> Admission {
        let pid = process.pid();
        let size = process.memory_size();
        let mut st = self.state.lock();

        // Service-time aging happens before any allocation decision.
        for r in st.residents.iter_mut() {
            if r.status == ResidencyStatus::Running {
                r.age += 1;
            }
        }

        if let Some(r) = st
            .residents
            .iter_mut()
            .find(|r| r.pid == pid && r.status != ResidencyStatus::Removed)
        {
            match r.status {
                ResidencyStatus::Running => return Admission::Admitted,
                _ => {
                    r.status = ResidencyStatus::Running;
                    return Admission::Rewarmed;
                }
            }
        }

        if size > self.max_memory {
            // No amount of eviction can make this fit.
            return Admission::Rejected;
        }

        loop {
            if self.try_allocate(&mut st, pid, size) {
                st.residents.push(Resident {
                    pid,
                    name: String::from(process.name()),
                    size,
                    status: ResidencyStatus::Running,
                    age: 1,
                });
                st.available -= size;
                st.paged_in += self.pages_for(size);
                return Admission::Admitted;
            }
            if !self.evict_oldest_idle(&mut st) {
                return Admission::Rejected;
            }
        }
    }

    /// Free a resident's memory and mark its entry Removed. Unknown or
    /// already-Removed pids are tolerated.
    pub fn release(&self, pid: Pid) {
        let mut st = self.state.lock();
        self.release_locked(&mut st, pid);
    }

    /// Flip a resident between Running and Idle at slice boundaries.
    /// A Removed or unknown entry is a no-op: a worker may report a slice
    /// end after the process already finished and deallocated.
    pub fn set_status(&self, pid: Pid, status: ResidencyStatus) {
        if status == ResidencyStatus::Removed {
            return; // release() is the only path to Removed
        }
        let mut st = self.state.lock();
        if let Some(r) = st
            .residents
            .iter_mut()
            .find(|r| r.pid == pid && r.status != ResidencyStatus::Removed)
        {
            r.status = status;
        }
    }

    /// True while the pid holds memory (Running or Idle).
    pub fn is_resident(&self, pid: Pid) -> bool {
        self.state
            .lock()
            .residents
            .iter()
            .any(|r| r.pid == pid && r.status != ResidencyStatus::Removed)
    }

    pub fn max_memory(&self) -> u64 {
        self.max_memory
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let st = self.state.lock();
        MemorySnapshot {
            max_memory: self.max_memory,
            frame_size: self.frame_size,
            used: self.max_memory - st.available,
            available: st.available,
            paged_in: st.paged_in,
            paged_out: st.paged_out,
            fragmentation_kb: self.fragmentation(&st),
            residents: st
                .residents
                .iter()
                .filter(|r| r.status != ResidencyStatus::Removed)
                .cloned()
                .collect(),
        }
    }

    /// Write `memory_stamp_<n>.txt`: resident count, external
    /// fragmentation, and the descending memory map.
    pub fn write_stamp(&self, n: u64) -> io::Result<PathBuf> {
        let snapshot = self.snapshot();

        let mut text = String::new();
        text.push_str(&format!("Timestamp: {}\n", timestamp_now()));
        text.push_str(&format!(
            "Number of processes in memory: {}\n",
            snapshot.residents.len()
        ));
        text.push_str(&format!(
            "Total external fragmentation in KB: {}\n",
            snapshot.fragmentation_kb
        ));
        text.push_str(&format!("\n----end---- = {}\n\n", self.max_memory));

        // Residents are stacked top-down as one accounting range each,
        // newest admission first, regardless of frame scatter.
        let mut cursor = self.max_memory;
        for r in snapshot.residents.iter().rev() {
            let end = cursor;
            cursor = cursor.saturating_sub(r.size);
            text.push_str(&format!("{}\nP{}\n{}\n\n", end, r.pid, cursor));
        }
        text.push_str("----start---- = 0\n");

        fs::create_dir_all(&self.stamp_dir)?;
        let path = self.stamp_dir.join(format!("memory_stamp_{}.txt", n));
        fs::write(&path, text)?;
        Ok(path)
    }

    fn pages_for(&self, size: u64) -> u64 {
        match self.mode {
            MemoryMode::Flat => 1,
            MemoryMode::Paging => size.div_ceil(self.frame_size),
        }
    }

    fn try_allocate(&self, st: &mut MemoryState, pid: Pid, size: u64) -> bool {
        match self.mode {
            MemoryMode::Flat => st.available >= size,
            MemoryMode::Paging => {
                let needed = size.div_ceil(self.frame_size) as usize;
                let free: Vec<usize> = st
                    .frames
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.is_none())
                    .map(|(i, _)| i)
                    .take(needed)
                    .collect();
                if free.len() < needed {
                    return false;
                }
                for i in free {
                    st.frames[i] = Some(pid);
                }
                true
            }
        }
    }

    /// Archive and release the Idle resident with the largest accumulated
    /// age (ties broken by lowest pid). False when every resident is
    /// Running and nothing can be evicted.
    fn evict_oldest_idle(&self, st: &mut MemoryState) -> bool {
        let victim = st
            .residents
            .iter()
            .filter(|r| r.status == ResidencyStatus::Idle)
            .fold(None::<(Pid, u64)>, |best, r| match best {
                Some((bp, ba)) if r.age < ba || (r.age == ba && r.pid > bp) => Some((bp, ba)),
                _ => Some((r.pid, r.age)),
            });
        let (pid, age) = match victim {
            Some(v) => v,
            None => return false,
        };

        debug!("memory: evicting idle pid {} (age {})", pid, age);
        if let Err(e) = self.backing.archive(pid) {
            warn!("backing store: failed to archive pid {}: {}", pid, e);
        }
        self.release_locked(st, pid);
        true
    }

    fn release_locked(&self, st: &mut MemoryState, pid: Pid) {
        let idx = match st
            .residents
            .iter()
            .position(|r| r.pid == pid && r.status != ResidencyStatus::Removed)
        {
            Some(i) => i,
            None => return,
        };

        if self.mode == MemoryMode::Paging {
            for frame in st.frames.iter_mut() {
                if *frame == Some(pid) {
                    *frame = None;
                }
            }
        }

        let size = st.residents[idx].size;
        st.residents[idx].status = ResidencyStatus::Removed;
        st.available += size;
        st.paged_out += self.pages_for(size);
    }

    /// External fragmentation: in flat mode the memory not held by any
    /// resident; in paging mode the free space outside the largest free
    /// frame run. Reported in KB (memory quantities are KB throughout).
    fn fragmentation(&self, st: &MemoryState) -> u64 {
        match self.mode {
            MemoryMode::Flat => st.available,
            MemoryMode::Paging => {
                let mut free_total = 0u64;
                let mut largest_run = 0u64;
                let mut run = 0u64;
                for frame in &st.frames {
                    if frame.is_none() {
                        free_total += 1;
                        run += 1;
                        largest_run = largest_run.max(run);
                    } else {
                        run = 0;
                    }
                }
                (free_total - largest_run) * self.frame_size
            }
        }
    }
}
