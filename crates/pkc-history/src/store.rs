use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::LockGuard;

/// Complete records read from an offset, plus where the next read resumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadBatch {
    pub records: Vec<String>,
    pub next_offset: u64,
}

/// Line-oriented record storage.
///
/// Offsets are byte positions. A record becomes visible only once its
/// terminating newline is written.
pub trait RecordStore {
    fn append(&mut self, record: &str) -> Result<()>;
    fn read_from(&self, offset: u64) -> Result<ReadBatch>;
    /// Replace every record at once.
    fn replace_all(&mut self, records: &[String]) -> Result<()>;
    /// Drop all but the newest `keep` records as one step, so an append
    /// from another writer cannot land between the read and the rewrite.
    /// Returns how many were dropped.
    fn retain_last(&mut self, keep: usize) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// JSONL file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonlFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl JsonlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock = path.clone().into_os_string();
        lock.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock),
            lock_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonlFileStore {
    fn append(&mut self, record: &str) -> Result<()> {
        let _guard = LockGuard::acquire(&self.lock_path, self.lock_timeout)?;

        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open history log {:?}", self.path))?;

        // A crashed writer can leave a partial line; start ours on a fresh one.
        let mut line = String::with_capacity(record.len() + 2);
        if !ends_with_newline(&mut f)? {
            line.push('\n');
        }
        line.push_str(record);
        line.push('\n');

        f.write_all(line.as_bytes())
            .with_context(|| format!("append history log {:?}", self.path))?;
        f.sync_data()
            .with_context(|| format!("sync history log {:?}", self.path))?;
        Ok(())
    }

    fn read_from(&self, offset: u64) -> Result<ReadBatch> {
        let mut f = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ReadBatch {
                    records: Vec::new(),
                    next_offset: offset,
                })
            }
            Err(e) => return Err(e).with_context(|| format!("open history log {:?}", self.path)),
        };
        f.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek history log {:?}", self.path))?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)
            .with_context(|| format!("read history log {:?}", self.path))?;
        Ok(split_complete_lines(&buf, offset))
    }

    fn replace_all(&mut self, records: &[String]) -> Result<()> {
        let _guard = LockGuard::acquire(&self.lock_path, self.lock_timeout)?;
        self.rewrite_locked(records)
    }

    fn retain_last(&mut self, keep: usize) -> Result<usize> {
        let _guard = LockGuard::acquire(&self.lock_path, self.lock_timeout)?;
        let records = self.read_from(0)?.records;
        if records.len() <= keep {
            return Ok(0);
        }
        let dropped = records.len() - keep;
        self.rewrite_locked(&records[dropped..])?;
        Ok(dropped)
    }
}

impl JsonlFileStore {
    /// Caller holds the lock.
    fn rewrite_locked(&self, records: &[String]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("create history dir {:?}", dir))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {:?}", dir))?;
        for r in records {
            tmp.write_all(r.as_bytes())?;
            tmp.write_all(b"\n")?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("replace history log {:?}", self.path))?;
        Ok(())
    }
}

fn ends_with_newline(f: &mut File) -> Result<bool> {
    let len = f.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    f.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Lines terminated by `\n`. A trailing fragment is left for a later read.
fn split_complete_lines(buf: &[u8], base_offset: u64) -> ReadBatch {
    let complete = match buf.iter().rposition(|b| *b == b'\n') {
        Some(i) => i + 1,
        None => 0,
    };
    let records = String::from_utf8_lossy(&buf[..complete])
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    ReadBatch {
        records,
        next_offset: base_offset + complete as u64,
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Byte-for-byte stand-in for the JSONL file.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buf: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes as a crashed writer might leave them.
    pub fn push_raw(&mut self, raw: &str) {
        self.buf.extend_from_slice(raw.as_bytes());
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

impl RecordStore for MemoryStore {
    fn append(&mut self, record: &str) -> Result<()> {
        if self.buf.last().is_some_and(|b| *b != b'\n') {
            self.buf.push(b'\n');
        }
        self.buf.extend_from_slice(record.as_bytes());
        self.buf.push(b'\n');
        Ok(())
    }

    fn read_from(&self, offset: u64) -> Result<ReadBatch> {
        let start = (offset as usize).min(self.buf.len());
        Ok(split_complete_lines(&self.buf[start..], start as u64))
    }

    fn replace_all(&mut self, records: &[String]) -> Result<()> {
        self.buf.clear();
        for r in records {
            self.buf.extend_from_slice(r.as_bytes());
            self.buf.push(b'\n');
        }
        Ok(())
    }

    fn retain_last(&mut self, keep: usize) -> Result<usize> {
        let records = self.read_from(0)?.records;
        if records.len() <= keep {
            return Ok(0);
        }
        let dropped = records.len() - keep;
        self.replace_all(&records[dropped..])?;
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_log() -> PathBuf {
        std::env::temp_dir()
            .join(format!("pkc_store_{}", uuid::Uuid::new_v4()))
            .join("history.jsonl")
    }

    #[test]
    fn missing_file_reads_empty_and_creates_nothing() {
        let p = tmp_log();
        let store = JsonlFileStore::new(&p);
        let batch = store.read_from(0).unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.next_offset, 0);
        assert!(!p.parent().unwrap().exists());
    }

    #[test]
    fn append_then_incremental_read() {
        let p = tmp_log();
        let mut store = JsonlFileStore::new(&p);
        store.append(r#"{"n":1}"#).unwrap();
        let first = store.read_from(0).unwrap();
        assert_eq!(first.records, vec![r#"{"n":1}"#]);

        store.append(r#"{"n":2}"#).unwrap();
        let second = store.read_from(first.next_offset).unwrap();
        assert_eq!(second.records, vec![r#"{"n":2}"#]);
        assert!(!PathBuf::from(format!("{}.lock", p.display())).exists());
    }

    #[test]
    fn partial_trailing_line_is_held_back_then_isolated() {
        let p = tmp_log();
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, "{\"n\":1}\n{\"n\":2,\"trunc").unwrap();

        let mut store = JsonlFileStore::new(&p);
        let batch = store.read_from(0).unwrap();
        assert_eq!(batch.records.len(), 1);

        store.append(r#"{"n":3}"#).unwrap();
        let all = store.read_from(0).unwrap().records;
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], r#"{"n":3}"#);
    }

    #[test]
    fn replace_all_rewrites_atomically() {
        let p = tmp_log();
        let mut store = JsonlFileStore::new(&p);
        for i in 0..5 {
            store.append(&format!("{{\"n\":{i}}}")).unwrap();
        }
        store.replace_all(&[r#"{"n":4}"#.to_string()]).unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "{\"n\":4}\n");
    }

    #[test]
    fn retain_last_keeps_records_appended_by_another_handle() {
        let p = tmp_log();
        let mut pruner = JsonlFileStore::new(&p);
        let mut writer = JsonlFileStore::new(&p);
        for i in 0..4 {
            pruner.append(&format!("{{\"n\":{i}}}")).unwrap();
        }
        let stale = pruner.read_from(0).unwrap();
        assert_eq!(stale.records.len(), 4);

        writer.append(r#"{"n":4}"#).unwrap();
        assert_eq!(pruner.retain_last(2).unwrap(), 3);
        assert_eq!(fs::read_to_string(&p).unwrap(), "{\"n\":3}\n{\"n\":4}\n");
        assert_eq!(pruner.retain_last(2).unwrap(), 0);
    }

    #[test]
    fn retain_last_waits_for_the_log_lock() {
        let p = tmp_log();
        let mut store = JsonlFileStore::new(&p).with_lock_timeout(Duration::from_millis(50));
        store.append(r#"{"n":1}"#).unwrap();
        store.append(r#"{"n":2}"#).unwrap();

        let lock = PathBuf::from(format!("{}.lock", p.display()));
        let held = LockGuard::acquire(&lock, Duration::from_secs(1)).unwrap();
        assert!(store.retain_last(1).is_err());
        assert_eq!(store.read_from(0).unwrap().records.len(), 2);

        drop(held);
        assert_eq!(store.retain_last(1).unwrap(), 1);
    }

    #[test]
    fn memory_store_matches_file_semantics() {
        let mut m = MemoryStore::new();
        m.push_raw("{\"a\":1}\n{\"half");
        assert_eq!(m.read_from(0).unwrap().records.len(), 1);
        m.append("{\"b\":2}").unwrap();
        assert_eq!(m.read_from(0).unwrap().records, vec!["{\"a\":1}", "{\"half", "{\"b\":2}"]);
    }
}
