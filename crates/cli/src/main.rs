use std::process::ExitCode;

fn main() -> ExitCode {
    resetline_cli::run()
}
