use std::process::ExitCode;

fn main() -> ExitCode {
    slicer_picker::run()
}
