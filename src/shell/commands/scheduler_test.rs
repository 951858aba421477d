use crate::scheduler::Scheduler;

/// scheduler-test — start generating dummy processes on cadence.
pub fn run(scheduler: &mut Scheduler) {
    if scheduler.is_generating() {
        println!("Scheduler is already generating processes.\n");
        return;
    }
    println!("Scheduler is now generating dummy processes...\n");
    scheduler.begin_generation();
}
