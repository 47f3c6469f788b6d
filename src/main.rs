fn main() {
    let code = dl::run_cli();
    if code != 0 {
        std::process::exit(code);
    }
}
