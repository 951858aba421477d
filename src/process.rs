use chrono::Local;
use parking_lot::Mutex;

/// Wall-clock timestamp format used everywhere a process or report carries a
/// time: `MM/DD/YYYY hh:mm:ss AM/PM`.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Current wall-clock time in the emulator's timestamp format.
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Unique process identifier. Assigned monotonically starting at 1001.
pub type Pid = u32;

/// Process state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Waiting,
    Finished,
}

/// A single synthetic job.
///
/// Identity (pid, name, instruction count, memory footprint) is fixed at
/// creation; the program counter, state, core binding and timestamps are
/// mutated by the worker currently running the process and by the
/// dispatcher, behind the internal mutex.
pub struct Process {
    pid: Pid,
    name: String,
    lines_of_code: u64,
    memory_size: u64,
    created: String,
    inner: Mutex<ProcessInner>,
}

struct ProcessInner {
    state: ProcessState,
    command_counter: u64,
    core_id: i32,
    start_time: Option<String>,
    end_time: Option<String>,
}

/// Consistent view of a process's mutable fields, taken under one lock.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub command_counter: u64,
    pub lines_of_code: u64,
    pub memory_size: u64,
    pub core_id: i32,
    pub created: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl Process {
    pub fn new(pid: Pid, name: &str, lines_of_code: u64, memory_size: u64) -> Self {
        Process {
            pid,
            name: String::from(name),
            lines_of_code,
            memory_size,
            created: timestamp_now(),
            inner: Mutex::new(ProcessInner {
                state: ProcessState::Ready,
                command_counter: 0,
                core_id: -1,
                start_time: None,
                end_time: None,
            }),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines_of_code(&self) -> u64 {
        self.lines_of_code
    }

    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    pub fn state(&self) -> ProcessState {
        self.inner.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ProcessState::Finished
    }

    pub fn command_counter(&self) -> u64 {
        self.inner.lock().command_counter
    }

    pub fn core_id(&self) -> i32 {
        self.inner.lock().core_id
    }

    pub fn set_state(&self, state: ProcessState) {
        self.inner.lock().state = state;
    }

    pub fn set_core(&self, core_id: i32) {
        self.inner.lock().core_id = core_id;
    }

    /// Record the first-dispatch timestamp. Later dispatches keep the
    /// original value.
    pub fn mark_started(&self) {
        let mut inner = self.inner.lock();
        if inner.start_time.is_none() {
            inner.start_time = Some(timestamp_now());
        }
    }

    /// Execute a single instruction on `core_id`.
    ///
    /// Advances the command counter while the process is Running; reaching
    /// the instruction count transitions to Finished and records the end
    /// timestamp. Calling this on a Finished process is an invariant
    /// violation: fatal in debug builds, a no-op in release.
    pub fn execute_one(&self, core_id: u32) {
        let mut inner = self.inner.lock();
        if inner.state == ProcessState::Finished {
            debug_assert!(
                false,
                "execute_one on finished process {} ({})",
                self.pid, self.name
            );
            return;
        }
        if inner.state != ProcessState::Running {
            return;
        }
        inner.core_id = core_id as i32;
        if inner.command_counter < self.lines_of_code {
            inner.command_counter += 1;
        }
        if inner.command_counter >= self.lines_of_code {
            inner.state = ProcessState::Finished;
            inner.end_time = Some(timestamp_now());
        }
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        let inner = self.inner.lock();
        ProcessSnapshot {
            pid: self.pid,
            name: self.name.clone(),
            state: inner.state,
            command_counter: inner.command_counter,
            lines_of_code: self.lines_of_code,
            memory_size: self.memory_size,
            core_id: inner.core_id,
            created: self.created.clone(),
            start_time: inner.start_time.clone(),
            end_time: inner.end_time.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_advances_and_finishes() {
        let p = Process::new(1001, "P1001", 3, 64);
        p.set_state(ProcessState::Running);

        p.execute_one(0);
        p.execute_one(0);
        assert_eq!(p.command_counter(), 2);
        assert_eq!(p.state(), ProcessState::Running);

        p.execute_one(0);
        assert_eq!(p.command_counter(), 3);
        assert_eq!(p.state(), ProcessState::Finished);
        assert!(p.snapshot().end_time.is_some());
    }

    #[test]
    fn execute_is_gated_on_running_state() {
        let p = Process::new(1002, "P1002", 5, 64);
        p.execute_one(0); // still Ready
        assert_eq!(p.command_counter(), 0);

        p.set_state(ProcessState::Waiting);
        p.execute_one(0);
        assert_eq!(p.command_counter(), 0);
    }

    #[test]
    fn counter_never_exceeds_lines_of_code() {
        let p = Process::new(1003, "P1003", 1, 64);
        p.set_state(ProcessState::Running);
        p.execute_one(1);
        assert_eq!(p.command_counter(), p.lines_of_code());
        assert!(p.is_finished());
    }

    #[test]
    fn mark_started_keeps_first_timestamp() {
        let p = Process::new(1004, "P1004", 2, 64);
        p.mark_started();
        let first = p.snapshot().start_time;
        p.mark_started();
        assert_eq!(p.snapshot().start_time, first);
    }
}
