use std::sync::Arc;
use std::thread;

use log::warn;

use super::Shared;
use crate::config::SchedulerPolicy;
use crate::memory::ResidencyStatus;
use crate::process::{Process, ProcessState};

/// Body of one dispatched (core, process) pair. Runs on its own thread and
/// exits when the slice ends or the process finishes.
pub(crate) fn run(shared: Arc<Shared>, core_id: usize, process: Arc<Process>) {
    match shared.policy {
        SchedulerPolicy::Fcfs => run_fcfs(&shared, core_id, &process),
        SchedulerPolicy::RoundRobin => run_rr(&shared, core_id, &process),
    }
}

/// FCFS keeps the core until the process finishes (or is externally put
/// back to Waiting), then frees its memory.
fn run_fcfs(shared: &Shared, core_id: usize, process: &Arc<Process>) {
    process.set_state(ProcessState::Running);
    process.set_core(core_id as i32);
    process.mark_started();

    while process.state() == ProcessState::Running {
        process.execute_one(core_id as u32);
        shared.ticks.increment_active(1);
        thread::sleep(shared.delay);
    }

    shared.memory.release(process.pid());
    if process.is_finished() {
        shared.backing.remove(process.pid());
    }
    shared.finish_dispatch(core_id, None);
}

/// Round-Robin runs at most one quantum, then either releases memory
/// (finished) or parks the resident as Idle and re-enqueues the process.
fn run_rr(shared: &Shared, core_id: usize, process: &Arc<Process>) {
    process.set_state(ProcessState::Running);
    process.set_core(core_id as i32);
    process.mark_started();
    // A re-dispatched resident was left Idle at its last slice boundary.
    shared.memory.set_status(process.pid(), ResidencyStatus::Running);

    let mut executed = 0;
    while executed < shared.quantum && !process.is_finished() {
        process.execute_one(core_id as u32);
        executed += 1;
        shared.ticks.increment_active(1);
        thread::sleep(shared.delay);
    }

    let stamp = shared.ticks.read().active / shared.quantum;
    if let Err(e) = shared.memory.write_stamp(stamp) {
        warn!("memory stamp {} not written: {}", stamp, e);
    }

    if process.is_finished() {
        shared.memory.release(process.pid());
        shared.backing.remove(process.pid());
        shared.finish_dispatch(core_id, None);
    } else {
        shared.memory.set_status(process.pid(), ResidencyStatus::Idle);
        process.set_state(ProcessState::Waiting);
        process.set_core(-1);
        shared.finish_dispatch(core_id, Some(Arc::clone(process)));
    }
}
