use std::process::ExitCode;

fn main() -> ExitCode {
    screwwatch_lib::run()
}
