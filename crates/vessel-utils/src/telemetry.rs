use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
const MAX_BACKUPS: u32 = 5;

/// A `std::io::Write` sink that rotates `path` once it grows past
/// [`MAX_LOG_BYTES`], keeping up to [`MAX_BACKUPS`] numbered backups
/// (`<name>.log.1` is the newest backup, `<name>.log.5` the oldest —
/// anything past that is deleted).
struct SizeRotatingWriter {
    path: PathBuf,
    file: File,
    written: u64,
}

impl SizeRotatingWriter {
    fn open(path: PathBuf) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self { path, file, written })
    }

    fn rotate(&mut self) -> io::Result<()> {
        for idx in (1..MAX_BACKUPS).rev() {
            let from = backup_path(&self.path, idx);
            let to = backup_path(&self.path, idx + 1);
            if from.exists() {
                let _ = fs::rename(&from, &to);
            }
        }
        let first_backup = backup_path(&self.path, 1);
        if self.path.exists() {
            fs::rename(&self.path, &first_backup)?;
        }
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn backup_path(path: &Path, idx: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{idx}"));
    PathBuf::from(name)
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= MAX_LOG_BYTES {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// `tracing_subscriber::fmt::MakeWriter` impl backed by a single shared
/// [`SizeRotatingWriter`] — logging happens from many tasks, so the
/// rotation decision is serialized behind a mutex.
#[derive(Clone)]
struct RotatingFileMakeWriter {
    inner: std::sync::Arc<Mutex<SizeRotatingWriter>>,
}

impl RotatingFileMakeWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        Ok(Self {
            inner: std::sync::Arc::new(Mutex::new(SizeRotatingWriter::open(path)?)),
        })
    }
}

impl<'a> fmt::MakeWriter<'a> for RotatingFileMakeWriter {
    type Writer = RotatingFileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileHandle {
            inner: self.inner.clone(),
        }
    }
}

struct RotatingFileHandle {
    inner: std::sync::Arc<Mutex<SizeRotatingWriter>>,
}

impl Write for RotatingFileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .expect("log writer lock poisoned")
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().expect("log writer lock poisoned").flush()
    }
}

/// Install the process-wide `tracing` subscriber: `log` records are bridged
/// in via [`LogTracer`], output goes to stderr plus a rotating file under
/// `<state_root>/logs/<name>.log`, and verbosity is controlled by `RUST_LOG`
/// (falling back to `info` when unset).
///
/// `state_root` is the agent's persisted-state directory (see the session
/// store), so each agent gets its own log file.
pub fn setup_logging(service_name: &str, state_root: &Path) {
    LogTracer::init().expect("failed to install log bridge");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let log_path = state_root.join("logs").join(format!("{service_name}.log"));
    match RotatingFileMakeWriter::new(log_path) {
        Ok(writer) => {
            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            let subscriber = Registry::default()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer);
            tracing::subscriber::set_global_default(subscriber)
                .expect("failed to install tracing subscriber");
        }
        Err(err) => {
            // No writable state root yet (e.g. first run before the
            // directory exists) — still log to stderr rather than panic.
            let subscriber = Registry::default().with(filter).with(stderr_layer);
            tracing::subscriber::set_global_default(subscriber)
                .expect("failed to install tracing subscriber");
            tracing::warn!("could not open rotating log file: {err}");
        }
    }
}
