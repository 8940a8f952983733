use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::fingerprint::{hash_bytes, hash_file_contents};

const MAGIC: u32 = u32::from_le_bytes(*b"DDC0");
const FORMAT_VERSION: u16 = 1;
const KEY_HASH_LEN: usize = 40;

/// A derived-data cache value read back from the store: the payload bytes
/// plus the header fields that described them. `content_hash` is recomputed
/// from `payload` on every read, never stored - the store persists bytes
/// only (§3).
#[derive(Debug, Clone)]
pub struct DdcValue {
    pub payload: Vec<u8>,
    pub content_hash: String,
}

/// Content-addressed store of cooked asset blobs, keyed by the strings
/// `build_ddc_key` produces. Entries live at
/// `<root>/<key_hash[0:2]>/<key_hash[2:4]>/<key_hash>.bin`, sharded two
/// levels deep so no single directory holds more than a few thousand
/// entries even at large library sizes.
///
/// Reads never take a lock: a `.bin` file is only ever visible at its final
/// path once fully written, via rename. Writes serialize through a single
/// mutex, matching this pipeline's "one writer, many readers" usage - the
/// store is not meant to be a high-throughput write path.
pub struct DdcStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    temp_counter: AtomicU64,
}

impl DdcStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_hash(key: &str) -> String {
        // SHA-1 of the key string itself, reusing the one hash primitive
        // this crate uses everywhere else.
        crate::fingerprint::hash_toolchain_tag(key)
    }

    fn shard_path(&self, key_hash: &str) -> PathBuf {
        self.root
            .join(&key_hash[0..2])
            .join(&key_hash[2..4])
            .join(format!("{key_hash}.bin"))
    }

    pub fn exists(&self, key: &str) -> bool {
        let key_hash = Self::key_hash(key);
        self.shard_path(&key_hash).is_file()
    }

    /// A truncated, bad-magic, bad-version, or key-mismatched entry is
    /// treated the same as a miss, never as an error: the corrupt file is
    /// left on disk for a future `put` to atomically overwrite.
    pub fn get(&self, key: &str) -> Result<Option<DdcValue>> {
        let key_hash = Self::key_hash(key);
        let path = self.shard_path(&key_hash);
        let mut file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::Io(err)),
        };

        match Self::read_entry(&mut file, &key_hash) {
            Ok(payload) => {
                let content_hash = hash_bytes(&payload);
                Ok(Some(DdcValue {
                    payload,
                    content_hash,
                }))
            }
            Err(_) => {
                log::warn!("ddc entry {path:?} is corrupt, treating as a miss");
                Ok(None)
            }
        }
    }

    fn read_entry(file: &mut fs::File, key_hash: &str) -> io::Result<Vec<u8>> {
        let header_len = Self::header_len() as u64;
        let total_len = file.metadata()?.len();
        if total_len < header_len {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "ddc entry shorter than header"));
        }

        let magic = file.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad ddc magic"));
        }
        let version = file.read_u16::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported ddc entry version",
            ));
        }
        let _reserved = file.read_u16::<LittleEndian>()?;
        let payload_size = file.read_u64::<LittleEndian>()?;
        let mut stored_key_hash = [0u8; KEY_HASH_LEN];
        file.read_exact(&mut stored_key_hash)?;
        if stored_key_hash.as_slice() != key_hash.as_bytes() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "ddc entry key hash mismatch",
            ));
        }

        let remaining = total_len - header_len;
        if payload_size > remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "ddc entry payloadSize exceeds remaining bytes",
            ));
        }

        let mut payload = vec![0u8; payload_size as usize];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Size in bytes of the fixed header: magic + version + reserved +
    /// payloadSize + keyHash, before the payload itself begins.
    const fn header_len() -> usize {
        4 + 2 + 2 + 8 + KEY_HASH_LEN
    }

    /// Writes `payload` under `key`, atomically: the blob is built in a
    /// uniquely-named temp file beside the target shard directory, then
    /// renamed into place. A reader can never observe a partially written
    /// entry, and a crash mid-write leaves only an orphaned temp file.
    pub fn put(&self, key: &str, payload: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();

        let key_hash = Self::key_hash(key);
        let final_path = self.shard_path(&key_hash);
        let shard_dir = final_path
            .parent()
            .expect("shard_path always has a parent")
            .to_path_buf();
        fs::create_dir_all(&shard_dir)?;

        let counter = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let temp_path = shard_dir.join(format!(
            "{key_hash}.{}.{}.tmp",
            std::process::id(),
            counter
        ));

        {
            let mut temp_file = fs::File::create(&temp_path)?;
            temp_file.write_u32::<LittleEndian>(MAGIC)?;
            temp_file.write_u16::<LittleEndian>(FORMAT_VERSION)?;
            temp_file.write_u16::<LittleEndian>(0)?; // reserved
            temp_file.write_u64::<LittleEndian>(payload.len() as u64)?;
            debug_assert_eq!(key_hash.len(), KEY_HASH_LEN);
            temp_file.write_all(key_hash.as_bytes())?;
            temp_file.write_all(payload)?;
            temp_file.sync_all()?;
        }

        if let Err(err) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Io(err));
        }
        Ok(())
    }
}

/// Returns whether `source_path`'s current content hash differs from
/// `last_hash`. Thin wrapper kept here because both the manager and
/// registry need the same "did the source change" test.
pub fn source_changed(source_path: &Path, last_hash: &str) -> bool {
    hash_file_contents(source_path) != last_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_payload() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        store.put("key-a", b"hello world").unwrap();
        assert!(store.exists("key-a"));
        let value = store.get("key-a").unwrap().unwrap();
        assert_eq!(value.payload, b"hello world");
    }

    #[test]
    fn missing_key_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        assert!(store.get("nope").unwrap().is_none());
        assert!(!store.exists("nope"));
    }

    #[test]
    fn corrupt_entry_reads_as_a_miss_not_an_error() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        let key_hash = DdcStore::key_hash("key-a");
        let path = store.shard_path(&key_hash);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not a real ddc entry").unwrap();

        let result = store.get("key-a").unwrap();
        assert!(result.is_none());
        assert!(path.is_file(), "corrupt entry must be left on disk");
    }

    #[test]
    fn overwriting_a_key_replaces_its_payload() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        store.put("key-a", b"first").unwrap();
        store.put("key-a", b"second").unwrap();
        let value = store.get("key-a").unwrap().unwrap();
        assert_eq!(value.payload, b"second");
    }

    #[test]
    fn oversized_payload_size_header_reads_as_a_miss_not_an_oom() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        let key_hash = DdcStore::key_hash("key-a");
        let path = store.shard_path(&key_hash);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut bogus = Vec::new();
        bogus.write_u32::<LittleEndian>(MAGIC).unwrap();
        bogus.write_u16::<LittleEndian>(FORMAT_VERSION).unwrap();
        bogus.write_u16::<LittleEndian>(0).unwrap();
        bogus.write_u64::<LittleEndian>(u64::MAX).unwrap(); // claims an impossible payload
        bogus.write_all(key_hash.as_bytes()).unwrap();
        fs::write(&path, &bogus).unwrap();

        let result = store.get("key-a").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn get_recomputes_content_hash_from_payload() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        store.put("key-a", b"hello world").unwrap();
        let value = store.get("key-a").unwrap().unwrap();
        assert_eq!(value.content_hash, hash_bytes(b"hello world"));
    }

    #[test]
    fn no_leftover_temp_files_after_a_successful_put() {
        let dir = tempdir().unwrap();
        let store = DdcStore::new(dir.path()).unwrap();
        store.put("key-a", b"hello").unwrap();
        let key_hash = DdcStore::key_hash("key-a");
        let shard_dir = dir.path().join(&key_hash[0..2]).join(&key_hash[2..4]);
        let leftovers: Vec<_> = fs::read_dir(&shard_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|e| e.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
