use crate::error::ShellResult;
use crate::scheduler::Scheduler;

/// report-util — write the process-smi text to the log file.
pub fn run(scheduler: &Scheduler) -> ShellResult<()> {
    let path = scheduler.write_report()?;
    println!("Report generated at {}\n", path.display());
    Ok(())
}
