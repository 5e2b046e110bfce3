//! Dual-sink logging and graceful-interrupt plumbing shared by every binary
//! and background task in the workspace.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Initialize dual logging (terminal + file) with a timestamped log file.
/// Creates `logs/` in the current directory and writes `Debug` to file,
/// `Info` to terminal.
pub fn init_logging() {
    if let Err(e) = std::fs::create_dir_all("logs") {
        eprintln!("warning: could not create logs directory: {e}");
    }
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs();
    let file_sink = std::fs::File::create(format!("logs/{timestamp}.log"))
        .map(|f| simplelog::WriteLogger::new(log::LevelFilter::Debug, config.clone(), f) as Box<dyn simplelog::SharedLogger>);
    let term_sink = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![term_sink];
    match file_sink {
        Ok(sink) => loggers.push(sink),
        Err(e) => eprintln!("warning: could not open log file: {e}"),
    }
    if simplelog::CombinedLogger::init(loggers).is_err() {
        eprintln!("warning: logger already initialized");
    }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Register a `Ctrl+C`/`SIGTERM` handler that flips a graceful-shutdown
/// flag instead of killing the process immediately. Long-running loops
/// (the transcode worker pool, the moderator-continuity and room-GC
/// timers) poll `interrupted()` between units of work.
pub fn install_interrupt_handler() {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, finishing in-flight work before exit");
            INTERRUPTED.store(true, Ordering::Relaxed);
        }
    });
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninterrupted() {
        assert!(!interrupted());
    }
}
