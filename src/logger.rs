use std::io::Write;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;

struct HarkLogger {
    file: Option<Mutex<std::fs::File>>,
    filter: LevelFilter,
    start: Instant,
}

impl HarkLogger {
    fn format(&self, record: &Record) -> String {
        let elapsed = self.start.elapsed().as_secs_f64();
        format!(
            "[{elapsed:.3}s] [{}] {} - {}",
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl Log for HarkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        match self.file {
            Some(ref file) => {
                let _ = writeln!(file.lock(), "{line}");
            }
            None => eprintln!("{line}"),
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Level filter from `RUST_LOG`, defaulting to `info`.
fn filter_from_env() -> LevelFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Initialize the global logger. Records go to `log_file` when given, stderr otherwise.
///
/// # Errors
///
/// Returns `SetLoggerError` if a logger is already installed.
pub fn init(log_file: Option<std::fs::File>) -> Result<(), SetLoggerError> {
    let filter = filter_from_env();
    let logger = HarkLogger {
        file: log_file.map(Mutex::new),
        filter,
        start: Instant::now(),
    };
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(filter);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::io::{Read, Seek};

    #[test]
    fn test_writes_formatted_records_to_file() {
        let mut file = tempfile::tempfile().unwrap();
        let logger = HarkLogger {
            file: Some(Mutex::new(file.try_clone().unwrap())),
            filter: LevelFilter::Info,
            start: Instant::now(),
        };
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("hark::install")
                .args(format_args!("installed hello"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("hark::install")
                .args(format_args!("hidden"))
                .build(),
        );
        logger.flush();

        let mut contents = String::new();
        file.rewind().unwrap();
        file.read_to_string(&mut contents).unwrap();
        assert!(
            contents.ends_with("[INFO] hark::install - installed hello\n"),
            "{contents}"
        );
        assert!(!contents.contains("hidden"));
    }
}
