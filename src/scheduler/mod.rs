pub mod generator;
pub mod ticks;
pub mod worker;

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::{Config, SchedulerPolicy};
use crate::memory::backing_store::BackingStore;
use crate::memory::{Admission, MemoryManager, MemorySnapshot};
use crate::process::{Pid, Process, ProcessState};
use ticks::{TickClock, TickCounts};

/// First pid handed out; later pids count up from here.
const FIRST_PID: Pid = 1001;

/// Idle-sampler period. Every free core earns one idle tick per sample.
const IDLE_SAMPLE_PERIOD: Duration = Duration::from_millis(10);

/// Floor for the per-instruction delay, so instruction execution stays
/// coarser than the idle sampler.
const MIN_DELAY_MS: u64 = 50;

/// Dispatcher back-off after a memory-rejected dispatch while cores are
/// still free; residency can only change once a worker reports back.
const DISPATCH_RETRY: Duration = Duration::from_millis(10);

/// Output locations, overridable for tests.
#[derive(Debug, Clone)]
pub struct SchedulerPaths {
    pub backing_store: PathBuf,
    pub report: PathBuf,
    pub stamp_dir: PathBuf,
}

impl Default for SchedulerPaths {
    fn default() -> Self {
        SchedulerPaths {
            backing_store: PathBuf::from("backing-store.txt"),
            report: PathBuf::from("csopesy-log.txt"),
            stamp_dir: PathBuf::from("memory"),
        }
    }
}

/// Ready queue plus the core-availability map, guarded together so the
/// dispatcher can decide on both under one lock.
pub(crate) struct DispatchState {
    pub(crate) queue: VecDeque<Arc<Process>>,
    pub(crate) core_free: Vec<bool>,
}

pub(crate) struct GeneratorParams {
    pub(crate) batch_freq: u64,
    pub(crate) min_ins: u64,
    pub(crate) max_ins: u64,
    pub(crate) min_mem: u64,
    pub(crate) max_mem: u64,
}

/// Every record ever created, for the reporting surface; also the pid
/// counter.
pub(crate) struct Registry {
    processes: RwLock<Vec<Arc<Process>>>,
    next_pid: AtomicU32,
}

impl Registry {
    fn new() -> Self {
        Registry {
            processes: RwLock::new(Vec::new()),
            next_pid: AtomicU32::new(FIRST_PID),
        }
    }

    fn allocate_pid(&self) -> Pid {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, process: &Arc<Process>) {
        self.processes.write().push(Arc::clone(process));
    }

    fn all(&self) -> Vec<Arc<Process>> {
        self.processes.read().clone()
    }

    /// Latest record created under `name`.
    fn find(&self, name: &str) -> Option<Arc<Process>> {
        self.processes
            .read()
            .iter()
            .rev()
            .find(|p| p.name() == name)
            .cloned()
    }
}

/// State shared by the dispatcher, the workers, the generator and the
/// idle sampler.
pub(crate) struct Shared {
    pub(crate) policy: SchedulerPolicy,
    pub(crate) num_cores: usize,
    pub(crate) quantum: u64,
    pub(crate) delay: Duration,
    pub(crate) gen: GeneratorParams,
    pub(crate) state: Mutex<DispatchState>,
    pub(crate) cv: Condvar,
    pub(crate) memory: MemoryManager,
    pub(crate) backing: Arc<BackingStore>,
    pub(crate) ticks: TickClock,
    registry: Registry,
    stop: AtomicBool,
    gen_stop: AtomicBool,
}

impl Shared {
    pub(crate) fn stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub(crate) fn generation_stopped(&self) -> bool {
        self.gen_stop.load(Ordering::Relaxed)
    }

    /// Create a record, register it everywhere and enqueue it. Generated
    /// processes (no explicit name) are named after their pid.
    pub(crate) fn submit(&self, name: Option<&str>, lines: u64, memory: u64) -> Arc<Process> {
        let pid = self.registry.allocate_pid();
        let name = match name {
            Some(n) => String::from(n),
            None => format!("P{}", pid),
        };
        let process = Arc::new(Process::new(pid, &name, lines, memory));
        self.registry.insert(&process);
        self.backing.register(&process);

        process.set_state(ProcessState::Ready);
        let mut st = self.state.lock();
        st.queue.push_back(Arc::clone(&process));
        self.cv.notify_all();
        drop(st);

        process
    }

    /// Worker hand-back: free the core and optionally re-enqueue the
    /// process, atomically, then wake the dispatcher.
    pub(crate) fn finish_dispatch(&self, core_id: usize, requeue: Option<Arc<Process>>) {
        let mut st = self.state.lock();
        st.core_free[core_id] = true;
        if let Some(process) = requeue {
            st.queue.push_back(process);
        }
        self.cv.notify_all();
    }

    fn free_cores(&self) -> usize {
        self.state.lock().core_free.iter().filter(|f| **f).count()
    }
}

/// The dispatcher's decision loop: take the head of the ready queue, find
/// a free core, admit to memory, hand off to a worker. A rejected
/// admission rotates the head to the tail so it cannot block the queue.
fn dispatcher_loop(shared: Arc<Shared>) {
    let mut workers: Vec<Option<JoinHandle<()>>> =
        (0..shared.num_cores).map(|_| None).collect();

    loop {
        let mut st = shared.state.lock();
        while !shared.stopping() && st.queue.is_empty() {
            shared.cv.wait(&mut st);
        }
        if shared.stopping() {
            break;
        }

        let process = match st.queue.front() {
            Some(p) => Arc::clone(p),
            None => continue,
        };

        let mut assigned = false;
        for core_id in 0..shared.num_cores {
            if !st.core_free[core_id] {
                continue;
            }
            if !shared.memory.is_resident(process.pid())
                && shared.memory.admit(&process) == Admission::Rejected
            {
                break; // no memory either; rotate below
            }

            st.core_free[core_id] = false;
            st.queue.pop_front();

            // The previous worker on this core has already handed the
            // core back, so the join returns immediately.
            if let Some(handle) = workers[core_id].take() {
                let _ = handle.join();
            }
            let shared_for_worker = Arc::clone(&shared);
            let process_for_worker = Arc::clone(&process);
            workers[core_id] = Some(thread::spawn(move || {
                worker::run(shared_for_worker, core_id, process_for_worker)
            }));
            assigned = true;
            break;
        }

        if !assigned {
            // Rotate so a currently unadmittable process cannot starve
            // the rest of the queue, then wait for a core to free up.
            if let Some(p) = st.queue.pop_front() {
                st.queue.push_back(p);
            }
            if st.core_free.iter().any(|f| *f) {
                let _ = shared.cv.wait_for(&mut st, DISPATCH_RETRY);
            } else {
                while !shared.stopping() && !st.core_free.iter().any(|f| *f) {
                    shared.cv.wait(&mut st);
                }
            }
            if shared.stopping() {
                break;
            }
        }
    }

    // Workers run their current slice to completion.
    for handle in workers.iter_mut().filter_map(Option::take) {
        let _ = handle.join();
    }
}

/// Samples the core map on a fixed period; each free core earns one idle
/// tick per sample.
fn sampler_loop(shared: Arc<Shared>) {
    while !shared.stopping() {
        thread::sleep(IDLE_SAMPLE_PERIOD);
        let free = shared.free_cores();
        if free > 0 {
            shared.ticks.increment_idle(free as u64);
        }
    }
}

/// Owns every scheduling component: memory manager, backing store, tick
/// clock, dispatcher, idle sampler and generator threads.
pub struct Scheduler {
    shared: Arc<Shared>,
    report_path: PathBuf,
    dispatcher: Option<JoinHandle<()>>,
    sampler: Option<JoinHandle<()>>,
    generator: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(config: &Config) -> Self {
        Scheduler::with_paths(config, SchedulerPaths::default())
    }

    pub fn with_paths(config: &Config, paths: SchedulerPaths) -> Self {
        let backing = Arc::new(BackingStore::new(paths.backing_store));
        let memory = MemoryManager::new(
            config.max_overall_mem,
            config.mem_per_frame,
            Arc::clone(&backing),
            paths.stamp_dir,
        );
        let shared = Arc::new(Shared {
            policy: config.scheduler,
            num_cores: config.num_cpu,
            quantum: config.quantum_cycles,
            delay: Duration::from_millis(config.delay_per_exec.max(MIN_DELAY_MS)),
            gen: GeneratorParams {
                batch_freq: config.batch_process_freq,
                min_ins: config.min_ins,
                max_ins: config.max_ins,
                min_mem: config.min_mem_per_proc,
                max_mem: config.max_mem_per_proc,
            },
            state: Mutex::new(DispatchState {
                queue: VecDeque::new(),
                core_free: vec![true; config.num_cpu],
            }),
            cv: Condvar::new(),
            memory,
            backing,
            ticks: TickClock::new(),
            registry: Registry::new(),
            stop: AtomicBool::new(false),
            gen_stop: AtomicBool::new(false),
        });
        Scheduler {
            shared,
            report_path: paths.report,
            dispatcher: None,
            sampler: None,
            generator: None,
        }
    }

    /// Launch the dispatcher and the idle sampler.
    pub fn start(&mut self) {
        if self.dispatcher.is_some() {
            warn!("scheduler: already started");
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.dispatcher = Some(thread::spawn(move || dispatcher_loop(shared)));
        let shared = Arc::clone(&self.shared);
        self.sampler = Some(thread::spawn(move || sampler_loop(shared)));
        info!(
            "scheduler: started ({} cores, {})",
            self.shared.num_cores,
            self.shared.policy.label()
        );
    }

    /// Launch the process generator.
    pub fn begin_generation(&mut self) {
        if self.generator.is_some() {
            warn!("generator: already running");
            return;
        }
        self.shared.gen_stop.store(false, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        self.generator = Some(thread::spawn(move || generator::generator_loop(shared)));
    }

    pub fn is_generating(&self) -> bool {
        self.generator.is_some()
    }

    /// Stop the generator at its next wake and wait for it.
    pub fn end_generation(&mut self) {
        self.shared.gen_stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.generator.take() {
            let _ = handle.join();
        }
    }

    /// Cooperative shutdown: signal every task, then join in reverse
    /// creation order. Workers run their current slice to completion.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        self.shared.gen_stop.store(true, Ordering::Relaxed);
        self.shared.cv.notify_all();

        if let Some(handle) = self.generator.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.sampler.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
    }

    /// Create and enqueue one process with explicit instruction count and
    /// memory footprint.
    pub fn submit_process(&self, name: &str, lines: u64, memory: u64) -> Arc<Process> {
        self.shared.submit(Some(name), lines, memory)
    }

    /// Create and enqueue one process with generator-style random
    /// instruction count and memory footprint.
    pub fn create_process(&self, name: &str) -> Arc<Process> {
        let lines = generator::random_instructions(self.shared.gen.min_ins, self.shared.gen.max_ins);
        let memory = generator::random_memory(self.shared.gen.min_mem, self.shared.gen.max_mem);
        self.submit_process(name, lines, memory)
    }

    /// Latest process created under `name`.
    pub fn find_process(&self, name: &str) -> Option<Arc<Process>> {
        self.shared.registry.find(name)
    }

    pub fn processes(&self) -> Vec<Arc<Process>> {
        self.shared.registry.all()
    }

    pub fn memory_snapshot(&self) -> MemorySnapshot {
        self.shared.memory.snapshot()
    }

    pub fn tick_counts(&self) -> TickCounts {
        self.shared.ticks.read()
    }

    pub fn cores_available(&self) -> usize {
        self.shared.free_cores()
    }

    pub fn cores_used(&self) -> usize {
        self.shared.num_cores - self.cores_available()
    }

    pub fn cpu_utilization(&self) -> f32 {
        self.cores_used() as f32 / self.shared.num_cores as f32 * 100.0
    }

    /// The `screen -ls` text: utilization header plus the running and
    /// finished process tables.
    pub fn utilization_report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("CPU Utilization: {:.0}%\n", self.cpu_utilization()));
        out.push_str(&format!("Cores used: {}\n", self.cores_used()));
        out.push_str(&format!("Cores available: {}\n\n", self.cores_available()));
        out.push_str("--------------------------------------------------\n");
        out.push_str("Running processes:\n");

        let processes = self.processes();
        let mut running = 0;
        for p in &processes {
            let s = p.snapshot();
            if s.state == ProcessState::Running && s.core_id != -1 {
                out.push_str(&format!(
                    "{}\tStarted: {}   Core: {}   {} / {}\n",
                    s.name,
                    s.start_time.as_deref().unwrap_or(&s.created),
                    s.core_id,
                    s.command_counter,
                    s.lines_of_code
                ));
                running += 1;
            }
        }
        if running == 0 {
            out.push_str("    No running processes.\n");
        }

        out.push_str("\nFinished processes:\n");
        let mut finished = 0;
        for p in &processes {
            let s = p.snapshot();
            if s.state == ProcessState::Finished {
                out.push_str(&format!(
                    "{}\tEnded: {}   Finished {} / {}\n\t\tStarted: {}   Core: {}\n",
                    s.name,
                    s.end_time.as_deref().unwrap_or(""),
                    s.command_counter,
                    s.lines_of_code,
                    s.start_time.as_deref().unwrap_or(&s.created),
                    s.core_id
                ));
                finished += 1;
            }
        }
        if finished == 0 {
            out.push_str("    No finished processes.\n");
        }
        out.push_str("--------------------------------------------------\n");
        out
    }

    /// The `process-smi` text: utilization header plus memory usage and
    /// the per-resident table.
    pub fn process_smi(&self) -> String {
        let memory = self.memory_snapshot();
        let mut out = String::new();
        out.push_str("-------------------------------------------\n");
        out.push_str("| PROCESS-SMI V01.00  Driver Version 1.00 |\n");
        out.push_str("-------------------------------------------\n");
        out.push_str(&format!("CPU Utilization: {:.0}%\n", self.cpu_utilization()));
        out.push_str(&format!(
            "Memory Usage: {} KB / {} KB\n",
            memory.used, memory.max_memory
        ));
        out.push_str(&format!("Memory Utilization: {:.0}%\n", memory.utilization()));
        out.push_str("-------------------------------------------\n");
        out.push_str("Running processes and memory usage:\n");
        if memory.residents.is_empty() {
            out.push_str("    No processes in memory.\n");
        }
        for r in &memory.residents {
            out.push_str(&format!("{}\t{} KB\n", r.name, r.size));
        }
        out.push_str("-------------------------------------------\n");
        out
    }

    /// The `vmstat` text: memory totals, tick counters, paging counters.
    pub fn vmstat(&self) -> String {
        let memory = self.memory_snapshot();
        let ticks = self.tick_counts();
        let mut out = String::new();
        out.push_str(&format!("{:>10} K total memory\n", memory.max_memory));
        out.push_str(&format!("{:>10} K used memory\n", memory.used));
        out.push_str(&format!("{:>10} K free memory\n", memory.available));
        out.push_str(&format!("{:>10} K idle cpu ticks\n", ticks.idle));
        out.push_str(&format!("{:>10} K active cpu ticks\n", ticks.active));
        out.push_str(&format!("{:>10} K total cpu ticks\n", ticks.total()));
        out.push_str(&format!("{:>10} K num paged in\n", memory.paged_in));
        out.push_str(&format!("{:>10} K num paged out\n", memory.paged_out));
        out
    }

    /// Write the `process-smi` text to the report file.
    pub fn write_report(&self) -> io::Result<PathBuf> {
        fs::write(&self.report_path, self.process_smi())?;
        Ok(self.report_path.clone())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerPolicy;

    fn test_config() -> Config {
        Config {
            num_cpu: 2,
            scheduler: SchedulerPolicy::Fcfs,
            quantum_cycles: 2,
            batch_process_freq: 1,
            min_ins: 5,
            max_ins: 10,
            delay_per_exec: 50,
            max_overall_mem: 1024,
            mem_per_frame: 1024,
            min_mem_per_proc: 64,
            max_mem_per_proc: 64,
        }
    }

    fn test_scheduler() -> (Scheduler, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = SchedulerPaths {
            backing_store: dir.path().join("backing-store.txt"),
            report: dir.path().join("csopesy-log.txt"),
            stamp_dir: dir.path().join("memory"),
        };
        (Scheduler::with_paths(&test_config(), paths), dir)
    }

    #[test]
    fn pids_start_at_1001_and_increase() {
        let (scheduler, _dir) = test_scheduler();
        let p1 = scheduler.submit_process("a", 5, 64);
        let p2 = scheduler.submit_process("b", 5, 64);
        assert_eq!(p1.pid(), 1001);
        assert_eq!(p2.pid(), 1002);
    }

    #[test]
    fn submission_preserves_queue_order() {
        let (scheduler, _dir) = test_scheduler();
        scheduler.submit_process("a", 5, 64);
        scheduler.submit_process("b", 5, 64);
        scheduler.submit_process("c", 5, 64);

        let st = scheduler.shared.state.lock();
        let names: Vec<String> =
            st.queue.iter().map(|p| String::from(p.name())).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn find_process_returns_the_latest_record() {
        let (scheduler, _dir) = test_scheduler();
        let first = scheduler.submit_process("job", 5, 64);
        let second = scheduler.submit_process("job", 5, 64);
        let found = scheduler.find_process("job").unwrap();
        assert_eq!(found.pid(), second.pid());
        assert_ne!(found.pid(), first.pid());
    }

    #[test]
    fn reports_on_an_idle_scheduler() {
        let (scheduler, _dir) = test_scheduler();
        let report = scheduler.utilization_report();
        assert!(report.contains("CPU Utilization: 0%"));
        assert!(report.contains("No running processes."));
        assert!(report.contains("No finished processes."));

        let vmstat = scheduler.vmstat();
        assert!(vmstat.contains(" K total memory"));
        assert_eq!(vmstat.lines().count(), 8);
    }

    #[test]
    fn write_report_emits_the_process_smi_text() {
        let (scheduler, _dir) = test_scheduler();
        let path = scheduler.write_report().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, scheduler.process_smi());
        assert!(text.contains("PROCESS-SMI"));
    }
}
