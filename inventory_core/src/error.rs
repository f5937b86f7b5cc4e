use std::sync::atomic::{AtomicBool, Ordering};

/// Whether to log verbose error output (full cause chains).
/// Use the `--debug` flag to override.
static VERBOSE_ERRORS: AtomicBool = AtomicBool::new(false);

pub fn verbose_errors_enabled(enabled: bool) {
    VERBOSE_ERRORS.store(enabled, Ordering::Relaxed);
}

/// Log a failed operation before its error is propagated to the caller.
pub fn log_failure(what: &str, err: &anyhow::Error) {
    eprintln!("{}: {}", what, err);
    if VERBOSE_ERRORS.load(Ordering::Relaxed) {
        for cause in err.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
    }
}
