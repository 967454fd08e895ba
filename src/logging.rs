use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::Path;

const DEFAULT_FILTER: &str = "warn";

/// Logs to stderr; `RUST_LOG` overrides the default filter.
pub fn init_stderr() {
    let _ = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp(None)
        .try_init();
}

/// Logs to a file so the terminal UI is not drawn over. Falls back to
/// stderr if the file cannot be opened.
pub fn init_file(path: &Path) {
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(_) => return init_stderr(),
    };
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .try_init();
}
