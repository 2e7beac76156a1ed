use std::process::ExitCode;

fn main() -> ExitCode {
    taskshift::run()
}
