use std::sync::Arc;

use crate::error::{ShellError, ShellResult};
use crate::process::Process;
use crate::shell::{prompt_line, Shell};

/// screen — process screens: `-s <name>` creates, `-r <name>` re-attaches,
/// `-ls` lists running and finished processes.
pub fn run(shell: &Shell, args: &str) -> ShellResult<()> {
    let scheduler = shell.scheduler()?;
    let mut parts = args.split_whitespace();
    let mode = parts.next().unwrap_or("");
    let name = parts.next().unwrap_or("");

    match mode {
        "-ls" => {
            print!("{}", scheduler.utilization_report());
            Ok(())
        }
        "-s" if !name.is_empty() => {
            if let Some(existing) = scheduler.find_process(name) {
                if !existing.is_finished() {
                    return Err(ShellError::DuplicateScreen(String::from(name)));
                }
            }
            println!("Creating new screen: {}\n", name);
            let process = scheduler.create_process(name);
            attach(&process)
        }
        "-r" if !name.is_empty() => {
            let process = scheduler
                .find_process(name)
                .ok_or_else(|| ShellError::ScreenNotFound(String::from(name)))?;
            if process.is_finished() {
                println!(
                    "Can't access screen '{}'. (Already done executing)\n",
                    name
                );
                return Ok(());
            }
            attach(&process)
        }
        _ => Err(ShellError::InvalidScreenOption),
    }
}

/// Interactive process screen: refresh with `process-smi`, leave with
/// `exit`.
fn attach(process: &Arc<Process>) -> ShellResult<()> {
    print_info(process);
    loop {
        let line = match prompt_line("root:\\> ")? {
            Some(line) => line,
            None => return Ok(()),
        };
        match line.trim() {
            "exit" => return Ok(()),
            "process-smi" => print_updates(process),
            "" => {}
            _ => {
                println!("Invalid command, please try again. Type 'exit' to go back.\n");
            }
        }
    }
}

fn print_info(process: &Arc<Process>) {
    let s = process.snapshot();
    println!("Process Name: {}", s.name);
    println!("ID: {}", s.pid);
    println!("Created: {}", s.created);
    println!(
        "Current Line of Instruction: {} / {}",
        s.command_counter, s.lines_of_code
    );
    if process.is_finished() {
        println!("Process '{}' has finished executing!", s.name);
    }
    println!();
}

fn print_updates(process: &Arc<Process>) {
    let s = process.snapshot();
    println!("Process Name: {}", s.name);
    println!("ID: {}\n", s.pid);
    if process.is_finished() {
        println!("Finished!");
    } else {
        println!("Current Line of Instruction: {}", s.command_counter);
        println!("Lines of code: {}", s.lines_of_code);
    }
    println!();
}
