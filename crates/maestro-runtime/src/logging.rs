use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub const LOG_LEVEL_ENV: &str = "MAESTRO_LOG_LEVEL";

/// Keeps the log file open for the life of the process.
pub struct LogGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl LogGuard {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

struct MultiWriter {
    stderr: Option<io::Stderr>,
    file: Option<Arc<Mutex<File>>>,
}

impl MultiWriter {
    fn new(mirror_stderr: bool, file: Option<Arc<Mutex<File>>>) -> Self {
        Self {
            stderr: mirror_stderr.then(io::stderr),
            file,
        }
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(stderr) = &mut self.stderr {
            let _ = stderr.write_all(buf);
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(stderr) = &mut self.stderr {
            let _ = stderr.flush();
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// `MAESTRO_LOG_LEVEL` wins over the configured level. `RUST_LOG`, when
/// set, overrides both inside [`init_logging`].
pub fn resolve_level(env_level: Option<String>, config: &LoggingConfig) -> String {
    env_level
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

fn open_log_file(log_dir: &Path) -> io::Result<LogGuard> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!("maestro-{}.log", std::process::id()));
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}

/// Returns `None` when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Option<LogGuard> {
    let level = resolve_level(std::env::var(LOG_LEVEL_ENV).ok(), config);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let guard = match &config.log_dir {
        Some(dir) => match open_log_file(dir) {
            Ok(guard) => guard,
            Err(err) => {
                eprintln!("log_file_error: {err}");
                LogGuard { file: None }
            }
        },
        None => LogGuard { file: None },
    };
    // Without a file, stderr is the only sink left.
    let mirror_stderr = config.log_stderr || guard.file.is_none();
    let file = guard.file.clone();
    let make_writer = BoxMakeWriter::new(move || MultiWriter::new(mirror_stderr, file.clone()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_ansi(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}
