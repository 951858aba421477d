use crate::scheduler::Scheduler;

/// process-smi — utilization and memory summary.
pub fn run(scheduler: &Scheduler) {
    print!("{}", scheduler.process_smi());
}
