use std::error::Error;

/// Prints an error and every `source()` beneath it to stderr.
pub fn log_error(error: &(dyn Error + 'static)) {
    eprintln!("Error: {}", error);
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}
