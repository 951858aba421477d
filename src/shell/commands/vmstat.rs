use crate::scheduler::Scheduler;

/// vmstat — memory totals, tick counters and paging counters.
pub fn run(scheduler: &Scheduler) {
    print!("{}", scheduler.vmstat());
}
