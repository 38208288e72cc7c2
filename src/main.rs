fn main() -> std::process::ExitCode {
    vehicle_scanner_lib::run()
}
