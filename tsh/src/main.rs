use std::process::ExitCode;

fn main() -> ExitCode {
    tsh::lib_main()
}
