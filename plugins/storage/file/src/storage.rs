use std::collections::HashSet;
use std::fs::File;
use std::future::Future;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use messenger_api::{date_from_ms, Message, MessageId, MessageStore, StoreError};

use super::config::{DiskMessage, FileStoreConfig};

// ════════════════════════════════════════════════════════════════
//  FileStore
// ════════════════════════════════════════════════════════════════

#[derive(Default)]
struct State {
    initialized: bool,
    ids: HashSet<MessageId>,
}

/// Durable message store: append-only JSON Lines, one file per UTC day
/// of `created_at`.
///
/// The day in the file name is the range-scan access path: a query only
/// opens files on or after the day of its lower bound. Every insert opens
/// its file, appends one line and closes it again. All file I/O runs on
/// the blocking pool, so a caller's timeout can always fire.
pub struct FileStore {
    files: Arc<DayFiles>,
    state: Arc<RwLock<State>>,
}

impl FileStore {
    pub fn new(config: &FileStoreConfig) -> Self {
        Self {
            files: Arc::new(DayFiles {
                data_dir: PathBuf::from(&config.data_dir),
                sync_writes: config.sync_writes,
            }),
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

struct DayFiles {
    data_dir: PathBuf,
    sync_writes: bool,
}

impl DayFiles {
    fn day_path(&self, created_at: i64) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", date_from_ms(created_at)))
    }

    // ── Init ──

    fn init(&self, state: &mut State) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::unavailable(format!("mkdir {}: {e}", self.data_dir.display())))?;

        let mut ids = HashSet::new();
        for path in self.day_files(None)? {
            terminate_torn_line(&path)?;
            for message in read_messages(&path)? {
                ids.insert(message.id);
            }
        }

        tracing::info!(dir = %self.data_dir.display(), messages = ids.len(), "file store opened");
        state.ids = ids;
        state.initialized = true;
        Ok(())
    }

    // ── Insert ──

    fn insert(&self, state: &mut State, message: &Message, abandoned: &AtomicBool) -> Result<(), StoreError> {
        if !state.initialized {
            return Err(StoreError::unavailable("file store not initialized"));
        }
        if state.ids.contains(&message.id) {
            return Err(StoreError::Conflict(message.id));
        }
        if abandoned.load(Ordering::Acquire) {
            return Err(StoreError::unavailable("insert abandoned before write"));
        }

        let line = serde_json::to_string(&DiskMessage::from(message))
            .map_err(|e| StoreError::unavailable(format!("serialize: {e}")))?;
        let path = self.day_path(message.created_at);

        // Scoped handle: closed on drop on every exit path.
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::unavailable(format!("open {}: {e}", path.display())))?;

        append_record(&mut f, &path, &line, |f| {
            if self.sync_writes {
                f.sync_data()?;
            }
            // A caller that already gave up was told the insert failed.
            if abandoned.load(Ordering::Acquire) {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "insert abandoned by caller"));
            }
            Ok(())
        })
        .map_err(|e| StoreError::unavailable(format!("append {}: {e}", path.display())))?;

        state.ids.insert(message.id);
        Ok(())
    }

    // ── Query ──

    fn query(&self, state: &State, since_ms: i64) -> Result<Vec<Message>, StoreError> {
        if !state.initialized {
            return Err(StoreError::unavailable("file store not initialized"));
        }

        let mut result = Vec::new();
        for path in self.day_files(Some(&date_from_ms(since_ms)))? {
            result.extend(
                read_messages(&path)?
                    .into_iter()
                    .filter(|m| m.created_at >= since_ms),
            );
        }

        // Concurrent inserts may land slightly out of order within a day
        // file; a stable sort keeps file (insertion) order on ties.
        result.sort_by_key(|m| m.created_at);
        Ok(result)
    }

    /// Day files in chronological order, optionally starting at `from_date`.
    fn day_files(&self, from_date: Option<&str>) -> Result<Vec<PathBuf>, StoreError> {
        let dir = match std::fs::read_dir(&self.data_dir) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::unavailable(format!(
                    "read dir {}: {e}",
                    self.data_dir.display()
                )));
            }
        };

        let mut files = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(date) = name.strip_suffix(".jsonl") else {
                continue;
            };
            if !is_day_stamp(date) {
                continue;
            }
            if let Some(from) = from_date {
                if date < from {
                    continue;
                }
            }
            files.push(entry.path());
        }
        files.sort();
        Ok(files)
    }

    // ── Flush ──

    fn flush(&self) -> Result<(), StoreError> {
        if self.sync_writes {
            return Ok(());
        }
        for path in self.day_files(None)? {
            File::open(&path)
                .and_then(|f| f.sync_all())
                .map_err(|e| StoreError::unavailable(format!("sync {}: {e}", path.display())))?;
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════
//  MessageStore impl
// ════════════════════════════════════════════════════════════════

impl MessageStore for FileStore {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let files = Arc::clone(&self.files);
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.write_owned().await;
            offload("init", move || files.init(&mut state)).await
        })
    }

    fn insert(&self, message: &Message) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let message = message.clone();
        let files = Arc::clone(&self.files);
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let abandoned = Arc::new(AtomicBool::new(false));
            let _on_drop = AbandonOnDrop(Arc::clone(&abandoned));
            let mut state = state.write_owned().await;
            offload("insert", move || files.insert(&mut state, &message, &abandoned)).await
        })
    }

    fn query_since(&self, since_ms: i64) -> Pin<Box<dyn Future<Output = Result<Vec<Message>, StoreError>> + Send + '_>> {
        let files = Arc::clone(&self.files);
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let state = state.read_owned().await;
            offload("query", move || files.query(&state, since_ms)).await
        })
    }

    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let files = Arc::clone(&self.files);
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            // Exclusive: no append may race the sync.
            let state = state.write_owned().await;
            offload("flush", move || {
                let _state = state;
                files.flush()
            })
            .await
        })
    }
}

/// Run blocking file work on the blocking pool. The lock guard moves in
/// with the closure and is held until the work finishes, even when the
/// awaiting caller has stopped waiting.
async fn offload<T, F>(op: &'static str, work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::unavailable(format!("{op}: blocking task failed: {e}")))?
}

/// Raised when an insert future is dropped, which is how a timed-out
/// caller goes away. Checked by the blocking append before it commits.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

// ════════════════════════════════════════════════════════════════
//  Helpers
// ════════════════════════════════════════════════════════════════

/// Append one record line. A torn tail left by an earlier failure gets
/// its own line first. If the write or `commit` fails the file is cut
/// back to its previous length, so a failed append leaves nothing behind.
fn append_record(
    f: &mut File,
    path: &Path,
    line: &str,
    commit: impl FnOnce(&File) -> io::Result<()>,
) -> io::Result<()> {
    let len = f.metadata()?.len();

    let mut record = Vec::with_capacity(line.len() + 2);
    if len > 0 && !ends_with_newline(f, len)? {
        tracing::warn!(file = %path.display(), "terminating torn trailing record before append");
        record.push(b'\n');
    }
    record.extend_from_slice(line.as_bytes());
    record.push(b'\n');

    let written = f.write_all(&record).and_then(|()| commit(&*f));
    if let Err(e) = written {
        if let Err(undo) = f.set_len(len) {
            tracing::error!(file = %path.display(), error = %undo, "failed to roll back append");
        }
        return Err(e);
    }
    Ok(())
}

fn ends_with_newline(f: &mut File, len: u64) -> io::Result<bool> {
    f.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// `YYYY-MM-DD`.
fn is_day_stamp(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

/// Parse every well-formed line of a day file, in file order.
/// Malformed lines (a write torn by a crash) are skipped.
fn read_messages(path: &Path) -> Result<Vec<Message>, StoreError> {
    let f = std::fs::File::open(path)
        .map_err(|e| StoreError::unavailable(format!("open {}: {e}", path.display())))?;
    let reader = std::io::BufReader::new(f);

    let mut messages = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StoreError::unavailable(format!("read {}: {e}", path.display())))?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DiskMessage>(&line) {
            Ok(d) => messages.push(d.into()),
            Err(e) => {
                tracing::warn!(file = %path.display(), line = lineno + 1, error = %e, "skipping malformed record");
            }
        }
    }
    Ok(messages)
}

/// Make sure the file ends with a newline so the next append starts a
/// fresh line instead of extending a torn one.
fn terminate_torn_line(path: &Path) -> Result<(), StoreError> {
    let mut f = std::fs::OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::unavailable(format!("open {}: {e}", path.display())))?;

    let len = f
        .metadata()
        .map_err(|e| StoreError::unavailable(format!("stat {}: {e}", path.display())))?
        .len();
    if len == 0 {
        return Ok(());
    }

    let terminated =
        ends_with_newline(&mut f, len).map_err(|e| StoreError::unavailable(format!("read {}: {e}", path.display())))?;
    if !terminated {
        tracing::warn!(file = %path.display(), "terminating torn trailing record");
        f.write_all(b"\n")
            .map_err(|e| StoreError::unavailable(format!("write: {e}")))?;
    }
    Ok(())
}
