/// help — list available commands.
pub fn run() {
    println!("Available commands:");
    println!("  initialize          load config.txt and start the scheduler");
    println!("  screen -s <name>    create a process and attach its screen");
    println!("  screen -r <name>    re-attach a process screen");
    println!("  screen -ls          list running and finished processes");
    println!("  scheduler-test      start generating dummy processes");
    println!("  scheduler-stop      stop generating dummy processes");
    println!("  process-smi         utilization and memory summary");
    println!("  vmstat              memory and cpu tick counters");
    println!("  report-util         write the summary to csopesy-log.txt");
    println!("  clear               clear the screen");
    println!("  exit                quit the emulator");
    println!();
}
