use std::process::ExitCode;

fn main() -> ExitCode {
    expensey_cli::run()
}
