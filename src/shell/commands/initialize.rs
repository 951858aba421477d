use crate::config::Config;
use crate::error::ShellResult;
use crate::scheduler::Scheduler;
use crate::shell::Shell;

/// initialize — load config.txt, construct the scheduler and start the
/// dispatcher and idle sampler.
pub fn run(shell: &mut Shell) -> ShellResult<()> {
    if shell.is_initialized() {
        println!("Scheduler already initialized.\n");
        return Ok(());
    }

    let config = Config::load(&shell.config_path)?;
    let mut scheduler = Scheduler::new(&config);
    scheduler.start();
    shell.scheduler = Some(scheduler);

    println!("Program configuration initialized!");
    println!("CPU settings set to:");
    println!("   Number of CPUs                - {}", config.num_cpu);
    println!("   Scheduler                     - {}", config.scheduler.label());
    println!("   Quantum Cycles                - {}", config.quantum_cycles);
    println!("   Frequency of Adding Processes - {}", config.batch_process_freq);
    println!("   Range of Instructions         - {}-{}", config.min_ins, config.max_ins);
    println!("   Delay per Execution           - {}\n", config.delay_per_exec);
    println!("Memory settings set to:");
    println!("   Maximum Memory Available      - {}", config.max_overall_mem);
    println!("   Memory Size per Frame         - {}", config.mem_per_frame);
    println!("   Minimum Size per Process      - {}", config.min_mem_per_proc);
    println!("   Maximum Size per Process      - {}\n", config.max_mem_per_proc);
    Ok(())
}
