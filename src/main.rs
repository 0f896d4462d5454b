fn main() {
    radar_scan_pipeline::cli::run();
}
