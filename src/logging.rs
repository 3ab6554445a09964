use flexi_logger::{
    colored_default_format, detailed_format, Cleanup, Criterion, Duplicate, FileSpec,
    FlexiLoggerError, Logger, LoggerHandle, Naming,
};
use std::path::Path;

/// Start the global logger. `RUST_LOG` wins over `default_level`.
///
/// With a `log_dir`, records also go to a size-rotated file there and
/// warnings are duplicated to stderr. Keep the returned handle alive for the
/// lifetime of the process.
pub fn setup_logging(
    default_level: &str,
    log_dir: Option<&Path>,
) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(default_level)?;

    match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename("prefs_portal"))
            .format_for_files(detailed_format)
            .format_for_stderr(colored_default_format)
            .duplicate_to_stderr(Duplicate::Warn)
            .rotate(
                Criterion::Size(10 * 1024 * 1024),
                Naming::Numbers,
                Cleanup::KeepLogFiles(7),
            )
            .start(),
        None => logger.format(colored_default_format).start(),
    }
}
