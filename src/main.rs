fn main() {
    rec_repair::cli::run();
}
