//! Append-only log sink with lazy one-shot file initialization.
//!
//! The storage root becomes known some time after the first log calls, so
//! the file handle is opened lazily: every write retries the open until it
//! succeeds once, after which the handle is reused for the process
//! lifetime. Until then lines only reach the host log.

use std::fs::{File, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Local;

struct SinkState {
    root: Option<PathBuf>,
    file: Option<File>,
}

pub struct LogSink {
    label: &'static str,
    rel_path: &'static str,
    state: Mutex<SinkState>,
}

impl LogSink {
    /// `rel_path` is joined under the storage root once that is known.
    pub const fn new(label: &'static str, rel_path: &'static str) -> Self {
        Self {
            label,
            rel_path,
            state: Mutex::new(SinkState {
                root: None,
                file: None,
            }),
        }
    }

    /// Publish the storage root. The first call wins; later calls are
    /// no-ops so the sink never switches files mid-process.
    pub fn set_storage_root(&self, root: impl AsRef<Path>) {
        let mut state = self.lock();
        if state.root.is_none() {
            state.root = Some(root.as_ref().to_path_buf());
        }
    }

    /// Append a timestamped line, mirroring it to the host log first.
    pub fn write(&self, message: &str) {
        tracing::info!(target: "remora", sink = self.label, "{}", message);
        let mut state = self.lock();
        Self::append(&mut state, self.rel_path, message);
    }

    /// Best-effort variant for the fault path: never blocks on the sink
    /// lock, since the faulting thread may already hold it.
    pub fn write_nonblocking(&self, message: &str) {
        tracing::error!(target: "remora", sink = self.label, "{}", message);
        if let Ok(mut state) = self.state.try_lock() {
            Self::append(&mut state, self.rel_path, message);
        }
    }

    /// True once the file handle has been opened.
    pub fn is_open(&self) -> bool {
        self.lock().file.is_some()
    }

    fn append(state: &mut SinkState, rel_path: &str, message: &str) {
        if state.file.is_none() {
            let Some(root) = state.root.as_ref() else {
                return;
            };
            let path = root.join(rel_path);
            if let Some(dir) = path.parent() {
                let _ = create_dir_all(dir);
            }
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => state.file = Some(file),
                // Retried on the next write.
                Err(_) => return,
            }
        }

        if let Some(file) = state.file.as_mut() {
            let stamp = Local::now().format("[%I:%M:%S]");
            let _ = writeln!(file, "{stamp} {message}");
            let _ = file.flush();
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
