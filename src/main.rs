fn main() {
    rapd_pipeline::cli::run();
}
