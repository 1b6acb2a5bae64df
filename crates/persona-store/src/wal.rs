use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use persona_types::{Profile, ProfileKey, ViewerRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{StoreError, StoreResult};
use crate::txn::TxnWrite;

/// One committed mutation, as persisted in the write-ahead log.
///
/// On-disk framing of each record:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (JSON-serialized StoreEvent)]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreEvent {
    ProfileCreated {
        profile: Profile,
    },
    Committed {
        key: ProfileKey,
        profile: Option<Profile>,
        new_viewer: Option<ViewerRecord>,
    },
}

impl StoreEvent {
    pub fn committed(key: &ProfileKey, write: &TxnWrite) -> Self {
        Self::Committed {
            key: key.clone(),
            profile: write.profile.clone(),
            new_viewer: write.new_viewer.clone(),
        }
    }
}

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every record. A commit is durable once it returns.
    #[default]
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

/// Configuration for the write-ahead log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// The file a log appends to.
///
/// Opened in append mode, so every write lands at the current end of file,
/// including right after a `truncate`.
pub(crate) trait LogFile: Write + Send {
    fn sync_data(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct WalWriter {
    file: Box<dyn LogFile>,
    /// End of the last intact record.
    offset: u64,
    /// Set when a failed append could not be rolled back; the file may end
    /// in a partial record and nothing more may be appended behind it.
    poisoned: bool,
}

impl WalWriter {
    fn write_frame(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        if sync_mode == SyncMode::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Cut the file back to `len` and make the cut durable.
    fn rollback(&mut self, len: u64) -> io::Result<()> {
        self.file.truncate(len)?;
        self.file.sync_data()
    }
}

/// Append-only, crash-recoverable log of store mutations.
///
/// Recovery reads the file front-to-back and stops at the first record that
/// is truncated, fails its CRC check, or does not decode. Everything after
/// that point is a torn write and is cut off so new records follow the last
/// intact one.
///
/// An append that fails is rolled back before the error is returned, so a
/// record reported as failed is never replayed. If the rollback itself
/// fails the log refuses every later append.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    config: WalConfig,
}

impl WriteAheadLog {
    /// Open (or create) a log file at the given path.
    pub fn open(path: &Path, config: WalConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();
        Ok(Self::from_parts(path, Box::new(file), offset, config))
    }

    pub(crate) fn from_parts(
        path: &Path,
        file: Box<dyn LogFile>,
        offset: u64,
        config: WalConfig,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                file,
                offset,
                poisoned: false,
            }),
            config,
        }
    }

    /// Append one record. Returns the byte offset it was written at.
    pub fn append(&self, event: &StoreEvent) -> StoreResult<u64> {
        let payload =
            serde_json::to_vec(event).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("WAL record exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.lock()?;
        if w.poisoned {
            return Err(StoreError::Backend(format!(
                "write-ahead log {} is poisoned by an earlier failed append",
                self.path.display()
            )));
        }
        let entry_offset = w.offset;

        if let Err(err) = w.write_frame(&frame, self.config.sync_mode) {
            warn!(offset = entry_offset, error = %err, "WAL append failed; rolling back");
            if let Err(rollback) = w.rollback(entry_offset) {
                error!(
                    offset = entry_offset,
                    error = %rollback,
                    "WAL rollback failed; refusing further appends"
                );
                w.poisoned = true;
            }
            return Err(err.into());
        }
        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, len = payload.len(), "WAL append");
        Ok(entry_offset)
    }

    /// Read back every intact record, cutting off any torn tail.
    pub fn recover(&self) -> StoreResult<Vec<StoreEvent>> {
        let mut w = self.lock()?;
        let data = fs::read(&self.path)?;
        let (events, valid_len) = decode_records(&data);

        if valid_len < data.len() {
            warn!(
                path = %self.path.display(),
                valid_len,
                file_len = data.len(),
                "discarding torn WAL tail"
            );
            w.rollback(valid_len as u64)?;
        }
        w.offset = valid_len as u64;
        w.poisoned = false;

        debug!(recovered = events.len(), "WAL recovery complete");
        Ok(events)
    }

    /// Current write offset.
    pub fn offset(&self) -> StoreResult<u64> {
        Ok(self.lock()?.offset)
    }

    /// Returns `true` once a failed append could not be rolled back.
    pub fn is_poisoned(&self) -> StoreResult<bool> {
        Ok(self.lock()?.poisoned)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, WalWriter>> {
        self.writer
            .lock()
            .map_err(|e| StoreError::Backend(format!("WAL mutex poisoned: {e}")))
    }
}

/// Decode records from the start of `data`.
///
/// Returns the decoded events and the length of the intact prefix.
fn decode_records(data: &[u8]) -> (Vec<StoreEvent>, usize) {
    let mut events = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let end = offset + HEADER_SIZE + length;
        if length == 0 || end > data.len() {
            warn!(offset, length, "truncated WAL record; stopping recovery");
            return (events, offset);
        }

        let payload = &data[offset + HEADER_SIZE..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; stopping recovery"
            );
            return (events, offset);
        }

        match serde_json::from_slice::<StoreEvent>(payload) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(offset, error = %e, "undecodable WAL record; stopping recovery");
                return (events, offset);
            }
        }
        offset = end;
    }

    if offset < data.len() {
        warn!(offset, "partial WAL header; stopping recovery");
    }
    (events, offset)
}
