// Assay command line: runs the built-in self-check units.
// Usage: cargo run --bin assay -- run [unit] [--json]

fn main() {
    assay::cli::run();
}
