//! Queue files: plain-text lists of file names handed from one run to the next.
//!
//! Access is guarded by an advisory marker file next to the queue (same path,
//! extension `LOCK`). Only processes that follow the same protocol are kept
//! out; nothing stops an unrelated writer.

use crate::error::QueueError;
use crate::logging::log;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Reads and writes queue files under the marker-file protocol
#[derive(Debug, Clone)]
pub struct QueueStore {
    /// Sleeps between successive checks of a busy marker
    waits: Vec<Duration>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    /// Four polls, sleeping 1, 2, 3 and 4 seconds
    pub fn new() -> Self {
        QueueStore {
            waits: (1..=4).map(Duration::from_secs).collect(),
        }
    }

    pub fn with_waits(waits: Vec<Duration>) -> Self {
        QueueStore { waits }
    }

    /// Companion lock marker of a queue file
    pub fn lock_path(queue: &Path) -> PathBuf {
        queue.with_extension("LOCK")
    }

    /// Names in the queue, in file order
    ///
    /// # Errors
    /// `Missing` when the queue file does not exist, `Locked` on contention
    pub fn read(&self, queue: &Path) -> Result<Vec<String>, QueueError> {
        self.guarded(queue, || {
            if !queue.is_file() {
                return Err(QueueError::Missing(queue.to_path_buf()));
            }
            let file = fs::File::open(queue).map_err(|source| io_error(queue, source))?;
            BufReader::new(file)
                .lines()
                .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
                .collect::<io::Result<Vec<_>>>()
                .map_err(|source| io_error(queue, source))
        })
    }

    /// Replaces the queue contents with `names`
    pub fn write(&self, queue: &Path, names: &[String]) -> Result<(), QueueError> {
        self.guarded(queue, || {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(queue)
                .map_err(|source| io_error(queue, source))?;
            write_lines(&mut file, names).map_err(|source| io_error(queue, source))
        })
    }

    /// Adds `names` to the end of the queue, creating it if needed
    pub fn append(&self, queue: &Path, names: &[String]) -> Result<(), QueueError> {
        self.guarded(queue, || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(queue)
                .map_err(|source| io_error(queue, source))?;
            write_lines(&mut file, names).map_err(|source| io_error(queue, source))
        })
    }

    /// Runs `op` while holding the queue's marker
    fn guarded<T>(&self, queue: &Path, op: impl FnOnce() -> Result<T, QueueError>) -> Result<T, QueueError> {
        let marker = Self::lock_path(queue);

        if self.still_locked(&marker) {
            return Err(QueueError::Locked(queue.to_path_buf()));
        }

        // create_new so two cooperating processes cannot both take the marker
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(QueueError::Locked(queue.to_path_buf()));
            }
            Err(source) => return Err(io_error(&marker, source)),
        }

        let _release = scopeguard::guard(marker, |marker| {
            if let Err(e) = fs::remove_file(&marker) {
                let _ = log(&format!("Failed to remove lock marker {}: {}", marker.display(), e));
            }
        });

        op()
    }

    /// Polls the marker; true if it is still there after the last wait
    fn still_locked(&self, marker: &Path) -> bool {
        for wait in &self.waits {
            if !marker.exists() {
                return false;
            }
            let _ = log(&format!("{} is present, waiting {:?}", marker.display(), wait));
            thread::sleep(*wait);
        }
        marker.exists()
    }
}

fn write_lines(file: &mut fs::File, names: &[String]) -> io::Result<()> {
    let mut buf = String::new();
    for name in names {
        buf.push_str(name);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes())?;
    file.sync_all()
}

fn io_error(path: &Path, source: io::Error) -> QueueError {
    QueueError::Io {
        path: path.to_path_buf(),
        source,
    }
}
