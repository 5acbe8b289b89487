//! Store file access
//!
//! The store file is an append-only log of committed transactions. This
//! module owns the file handle: it replays the file at open, truncates a
//! torn tail left by a crash, and appends new commits.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::config::SyncStrategy;
use crate::error::{Result, RuleDbError};

use super::record::{
    check_header, file_header, find_later_frame, is_partial_header, Frame, TxRecord, HEADER_SIZE,
};

/// Result of replaying the store file
#[derive(Debug, Default)]
pub struct RecoveryResult {
    /// Number of committed transactions replayed
    pub records_recovered: u64,

    /// Bytes dropped from the end of the file (partial last commit)
    pub bytes_truncated: u64,

    /// Id of the last replayed transaction
    pub last_txid: u64,
}

/// Exclusive handle on the store file
pub(crate) struct LogFile {
    file: File,

    /// Length of the valid prefix; new frames are written here
    len: u64,

    sync_strategy: SyncStrategy,
}

impl LogFile {
    /// Replay an already-locked store file
    ///
    /// An empty file, or one holding only part of a header, gets a fresh
    /// header. A frame that runs past the end of the file, or a bad frame
    /// that is the last thing in the file, is a partial commit and is cut
    /// off. A bad frame followed by more data, or by an intact frame, is
    /// corruption and the file is left alone.
    pub fn recover(
        mut file: File,
        path: &Path,
        sync_strategy: SyncStrategy,
    ) -> Result<(Self, Vec<TxRecord>, RecoveryResult)> {
        let mut buf = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut buf)?;

        if is_partial_header(&buf) {
            tracing::warn!(
                "Reinitializing {} ({} bytes of an unfinished header)",
                path.display(),
                buf.len()
            );
            file.set_len(0)?;
            buf.clear();
        }

        if buf.is_empty() {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&file_header())?;
            file.sync_all()?;
            let log = Self {
                file,
                len: HEADER_SIZE,
                sync_strategy,
            };
            return Ok((log, Vec::new(), RecoveryResult::default()));
        }

        check_header(&buf)?;

        let mut records = Vec::new();
        let mut result = RecoveryResult::default();
        let mut offset = HEADER_SIZE as usize;

        while offset < buf.len() {
            match TxRecord::decode(&buf[offset..]) {
                Frame::Complete(record, used) => {
                    if record.txid <= result.last_txid {
                        return Err(RuleDbError::Corruption(format!(
                            "transaction id {} at offset {} does not follow {}",
                            record.txid, offset, result.last_txid
                        )));
                    }
                    result.last_txid = record.txid;
                    result.records_recovered += 1;
                    records.push(record);
                    offset += used;
                }
                Frame::Incomplete => {
                    Self::ensure_tail(&buf, offset, result.last_txid, path, "truncated frame")?;
                    break;
                }
                Frame::Invalid { len, reason } => {
                    if offset + len < buf.len() {
                        return Err(RuleDbError::Corruption(format!(
                            "{} at offset {} in {}",
                            reason,
                            offset,
                            path.display()
                        )));
                    }
                    Self::ensure_tail(&buf, offset, result.last_txid, path, &reason)?;
                    tracing::warn!(offset, %reason, "Discarding damaged final commit");
                    break;
                }
            }
        }

        let valid_len = offset as u64;
        if valid_len < buf.len() as u64 {
            result.bytes_truncated = buf.len() as u64 - valid_len;
            tracing::warn!(
                "Truncating {} bytes of partial commit from {}",
                result.bytes_truncated,
                path.display()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        let log = Self {
            file,
            len: valid_len,
            sync_strategy,
        };
        Ok((log, records, result))
    }

    /// Fail unless the bad frame at `offset` is the last thing in the file
    ///
    /// A crash can only tear the commit being appended. An intact commit
    /// behind the bad frame means its length field is damaged, and cutting
    /// the file there would destroy committed data.
    fn ensure_tail(
        buf: &[u8],
        offset: usize,
        last_txid: u64,
        path: &Path,
        reason: &str,
    ) -> Result<()> {
        match find_later_frame(&buf[offset..], last_txid) {
            Some(found) => Err(RuleDbError::Corruption(format!(
                "{} at offset {} in {}, with an intact commit at offset {}",
                reason,
                offset,
                path.display(),
                offset + found
            ))),
            None => Ok(()),
        }
    }

    /// Replace the file with `image`, a complete store image
    ///
    /// The image is written and synced to a sibling file, locked, and then
    /// renamed over `path`. The old file (and its lock) is released only
    /// after the rename, so the store is never without a lock holder.
    pub fn compact(&mut self, path: &Path, image: &[u8]) -> Result<u64> {
        let temp_path = compaction_path(path);

        let written = Self::write_image(&temp_path, image).and_then(|file| {
            fs::rename(&temp_path, path)?;
            sync_parent_dir(path)?;
            Ok(file)
        });

        let file = match written {
            Ok(file) => file,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        let old = std::mem::replace(&mut self.file, file);
        let _ = FileExt::unlock(&old);
        self.len = image.len() as u64;
        Ok(self.len)
    }

    fn write_image(temp_path: &Path, image: &[u8]) -> Result<File> {
        let mut file = open_store_file(temp_path, true)?;
        file.try_lock_exclusive()?;
        file.write_all(image)?;
        file.sync_all()?;
        Ok(file)
    }

    /// Append one committed transaction and sync it to disk
    ///
    /// On failure the file is cut back to its previous length so a later
    /// commit never lands behind half a frame.
    pub fn append(&mut self, record: &TxRecord) -> Result<u64> {
        let frame = record.encode()?;

        if let Err(e) = self.write_frame(&frame) {
            let _ = self.file.set_len(self.len);
            return Err(e);
        }

        self.len += frame.len() as u64;
        Ok(self.len)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(frame)?;
        match self.sync_strategy {
            SyncStrategy::Full => self.file.sync_all()?,
            SyncStrategy::DataOnly => self.file.sync_data()?,
        }
        Ok(())
    }

    /// Current length of the file (bytes)
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Sync and release the file lock
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        FileExt::unlock(&self.file)?;
        Ok(())
    }
}

/// Open (or create) a store file for reading and writing, 0600 on unix
pub(crate) fn open_store_file(path: &Path, truncate: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(truncate);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    Ok(options.open(path)?)
}

/// Whether `file` is still the file found at `path`
///
/// Compaction renames a new file over the store path, so a handle opened
/// before the rename can end up locking the replaced file.
#[cfg(unix)]
pub(crate) fn is_current(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    let current = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(held.dev() == current.dev() && held.ino() == current.ino())
}

#[cfg(not(unix))]
pub(crate) fn is_current(_file: &File, _path: &Path) -> Result<bool> {
    Ok(true)
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".compact");
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
