fn main() {
    rerec::cli::run_cli();
}
