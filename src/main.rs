//! Gitfarm binary entry point.

fn main() {
    if let Err(err) = gitfarm::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
