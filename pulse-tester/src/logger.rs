use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Appends `log` records to a session file, timestamped relative to startup.
///
/// The terminal belongs to the front-end, so nothing is ever echoed to
/// stdout or stderr from here.
pub struct FileLogger {
    writer: Mutex<BufWriter<File>>,
    started_at: Instant,
    level: LevelFilter,
}

impl FileLogger {
    pub fn create(path: &Path, level: LevelFilter) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "# Pulse tester session log")?;
        writeln!(writer, "# Timestamps are milliseconds since session start")?;
        writeln!(writer)?;
        writer.flush()?;

        Ok(Self {
            writer: Mutex::new(writer),
            started_at: Instant::now(),
            level,
        })
    }

    /// Installs the logger as the global `log` backend.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started_at.elapsed();
        if let Ok(mut writer) = self.writer.lock() {
            // Write failures are dropped.
            let _ = writeln!(
                writer,
                "[+{:>6} ms] {:<5} {} {}",
                elapsed.as_millis(),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
