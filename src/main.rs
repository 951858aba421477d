use std::process::ExitCode;

use csopesy::error::ShellError;
use csopesy::shell::{self, Outcome, Shell};

fn main() -> ExitCode {
    env_logger::init();

    let mut shell = Shell::new();
    shell::banner();

    loop {
        let line = match shell::prompt_line("root:\\> ") {
            Ok(Some(line)) => line,
            Ok(None) => {
                // End of input counts as a clean exit.
                shell.shutdown();
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
                shell.shutdown();
                return ExitCode::FAILURE;
            }
        };

        match shell.exec_command(&line) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Exit) => {
                println!("Exiting program...");
                return ExitCode::SUCCESS;
            }
            Err(e @ ShellError::Config(_)) => {
                eprintln!("ERROR: {}", e);
                return ExitCode::FAILURE;
            }
            Err(e) => println!("ERROR: {}\n", e),
        }
    }
}
