pub mod commands;

use std::io::{self, Write};
use std::path::PathBuf;

use crate::error::{ShellError, ShellResult};
use crate::scheduler::Scheduler;

/// What the console loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// Console state: the scheduler facade once `initialize` has run.
pub struct Shell {
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) config_path: PathBuf,
}

impl Shell {
    pub fn new() -> Self {
        Shell::with_config_path(PathBuf::from("config.txt"))
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Shell {
            scheduler: None,
            config_path,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.scheduler.is_some()
    }

    pub(crate) fn scheduler(&self) -> ShellResult<&Scheduler> {
        self.scheduler.as_ref().ok_or(ShellError::NotInitialized)
    }

    pub(crate) fn scheduler_mut(&mut self) -> ShellResult<&mut Scheduler> {
        self.scheduler.as_mut().ok_or(ShellError::NotInitialized)
    }

    /// Parse input line into command + arguments, then dispatch.
    pub fn exec_command(&mut self, input: &str) -> ShellResult<Outcome> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Outcome::Continue);
        }

        // Split by whitespace: first token = command, rest = args
        let mut parts = trimmed.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let args = parts.next().unwrap_or("").trim();

        match cmd.as_str() {
            "initialize"     => commands::initialize::run(self)?,
            "screen"         => commands::screen::run(self, args)?,
            "scheduler-test" => commands::scheduler_test::run(self.scheduler_mut()?),
            "scheduler-stop" => commands::scheduler_stop::run(self.scheduler_mut()?),
            "process-smi"    => commands::process_smi::run(self.scheduler()?),
            "vmstat"         => commands::vmstat::run(self.scheduler()?),
            "report-util"    => commands::report_util::run(self.scheduler()?)?,
            "clear"          => commands::clear::run(),
            "help"           => commands::help::run(),
            "exit"           => {
                self.shutdown();
                return Ok(Outcome::Exit);
            }
            _ => println!("{}: command not found", cmd),
        }
        Ok(Outcome::Continue)
    }

    /// Stop generation and scheduling and drop the facade.
    pub fn shutdown(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.end_generation();
            scheduler.stop();
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new()
    }
}

/// Print the emulator banner.
pub fn banner() {
    println!("  _____ _____   ___  _____  ______ _______   __");
    println!(" /  ___/  ___| / _ \\|  _  \\|  ____/  ___\\ \\ / /");
    println!("|  |   \\____ \\| | | | |_>  |  __| \\____ \\\\ V /");
    println!("|  |___ ____> | |_| |  ___/|  |___ ____> || |");
    println!(" \\_____|_____/ \\___/|_|    |______|_____/ |_|");
    println!("------------------------------------------------");
    println!("Welcome to the CSOPESY Emulator!");
    println!("Type 'initialize' to begin, 'help' for commands.");
    println!("------------------------------------------------");
    println!();
}

/// Print `prompt`, then read one line from stdin. None on end of input.
pub fn prompt_line(prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}
