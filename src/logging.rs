use std::fs::OpenOptions;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

use crate::config::Settings;

/// Install the process logger: warnings to stderr, plus a debug transcript of
/// every probe in `settings.log_path()` when `settings.debug` is set.
/// Best-effort: a log file that cannot be opened only costs the transcript.
pub fn init(settings: &Settings) {
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if settings.debug
        && let Some(path) = settings.log_path()
    {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
            Err(e) => eprintln!("sh-expand: cannot open {}: {e}", path.display()),
        }
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("sh-expand: logger already installed: {e}");
    }
}
