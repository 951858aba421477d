use crate::scheduler::Scheduler;

/// scheduler-stop — stop generating dummy processes.
pub fn run(scheduler: &mut Scheduler) {
    if !scheduler.is_generating() {
        println!("No generator running.\n");
        return;
    }
    scheduler.end_generation();
    println!("Scheduler has stopped generating dummy processes...\n");
}
