use std::process::ExitCode;

fn main() -> ExitCode {
    wayfarer_cli::run()
}
