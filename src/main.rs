//! taskorder - Dependency-aware task ordering

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = task_order::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
