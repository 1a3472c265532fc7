use std::process::ExitCode;

fn main() -> ExitCode {
    adb_provisioner_lib::run()
}
