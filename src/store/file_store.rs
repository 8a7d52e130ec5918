//! Single-file store with transactional per-user writes
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("RELMAPDB")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - payload_len: 8 bytes (u64 LE)
//!   - checksum: 32 bytes (BLAKE3 of the payload)
//!   - reserved: 8 bytes
//!
//! [PAYLOAD: payload_len bytes]
//!   - zstd-compressed bincode image of all tables
//! ```
//!
//! Every committed transaction rewrites the image to a sibling temp file and
//! renames it over the database file, so a crash leaves either the old or the
//! new image on disk.

use super::tables::{Partition, Tables, UserTx};
use crate::model::{Checksum, UserId};
use crate::{Error, Result, FORMAT_VERSION, MAGIC};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER_SIZE: usize = 64;
const ZSTD_LEVEL: i32 = 3;

/// The graph and version store
///
/// Reads share the lock; transactions take it exclusively, which serializes
/// version numbering for every user.
pub struct Store {
    /// Backing file (None for in-memory stores)
    path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl Store {
    /// Create a new, empty database file (truncating any existing one)
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let store = Store {
            path: Some(path.as_ref().to_path_buf()),
            tables: RwLock::new(Tables::default()),
        };
        store.sync()?;
        Ok(store)
    }

    /// Open an existing database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        let tables = decode_image(&data)?;
        debug!(path = %path.display(), bytes = data.len(), "opened store");
        Ok(Store {
            path: Some(path),
            tables: RwLock::new(tables),
        })
    }

    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// A store that lives only in memory
    pub fn in_memory() -> Self {
        Store {
            path: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Run `f` against a read-only view of one user's partition
    ///
    /// A user with no rows sees an empty partition.
    pub fn read<R>(&self, user: UserId, f: impl FnOnce(&Partition) -> R) -> R {
        let tables = self.tables.read();
        match tables.partitions.get(&user) {
            Some(partition) => f(partition),
            None => f(&Partition::default()),
        }
    }

    /// Run `f` as one all-or-nothing transaction over a user's partition
    ///
    /// `f` works on private copies of the id sequences and the partition. If
    /// it returns `Ok` the copies are written to disk and then installed; if
    /// it returns `Err` (or the write fails) nothing changes.
    pub fn transaction<R>(
        &self,
        user: UserId,
        f: impl FnOnce(&mut UserTx<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut tables = self.tables.write();
        let mut sequences = tables.sequences.clone();
        let mut partition = tables.partitions.get(&user).cloned().unwrap_or_default();

        let result = {
            let mut tx = UserTx::new(user, &mut sequences, &mut partition);
            f(&mut tx)
        };
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                warn!(user = %user, error = %e, "transaction rolled back");
                return Err(e);
            }
        };

        let old_sequences = std::mem::replace(&mut tables.sequences, sequences);
        let old_partition = tables.partitions.insert(user, partition);

        if let Err(e) = self.persist(&tables) {
            warn!(user = %user, error = %e, "failed to persist transaction, rolling back");
            tables.sequences = old_sequences;
            match old_partition {
                Some(p) => {
                    tables.partitions.insert(user, p);
                }
                None => {
                    tables.partitions.remove(&user);
                }
            }
            return Err(e);
        }

        Ok(value)
    }

    /// Users that own at least one row
    pub fn users(&self) -> Vec<UserId> {
        self.tables.read().partitions.keys().copied().collect()
    }

    /// Write the current image to disk
    pub fn sync(&self) -> Result<()> {
        let tables = self.tables.read();
        self.persist(&tables)
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let image = encode_image(tables)?;
        let tmp = temp_path(path);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&image)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            // Best-effort: make the rename itself durable
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }

        debug!(path = %path.display(), bytes = image.len(), "persisted store image");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode_image(tables: &Tables) -> Result<Vec<u8>> {
    let raw = bincode::serialize(tables)?;
    let payload = zstd::encode_all(raw.as_slice(), ZSTD_LEVEL)?;
    let checksum = Checksum::of_bytes(&payload);

    let mut image = Vec::with_capacity(HEADER_SIZE + payload.len());
    image.extend_from_slice(MAGIC);
    image.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes());
    image.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    image.extend_from_slice(checksum.as_bytes());
    image.resize(HEADER_SIZE, 0);
    image.extend_from_slice(&payload);
    Ok(image)
}

fn decode_image(data: &[u8]) -> Result<Tables> {
    if data.len() < HEADER_SIZE {
        return Err(Error::InvalidFile("file shorter than header".into()));
    }
    let (header, payload) = data.split_at(HEADER_SIZE);

    if &header[0..8] != MAGIC {
        return Err(Error::InvalidFile("Invalid magic bytes".into()));
    }

    let version = u32::from_le_bytes(read_array(&header[8..12]));
    if version != FORMAT_VERSION {
        return Err(Error::VersionMismatch {
            expected: FORMAT_VERSION,
            found: version,
        });
    }

    let payload_len = u64::from_le_bytes(read_array(&header[16..24])) as usize;
    if payload.len() != payload_len {
        return Err(Error::Corruption(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            payload_len
        )));
    }

    let expected = Checksum::from_bytes(read_array(&header[24..56]));
    let actual = Checksum::of_bytes(payload);
    if expected != actual {
        return Err(Error::Corruption(format!(
            "payload checksum mismatch: expected {}, found {}",
            expected.short(),
            actual.short()
        )));
    }

    let raw = zstd::decode_all(payload)?;
    Ok(bincode::deserialize(&raw)?)
}

/// Copy a header slice of known length into a fixed array
fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewEntity, Snapshot};
    use crate::store::{GraphRead, GraphStore};
    use tempfile::tempdir;

    #[test]
    fn test_create_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.relmap");

        {
            let store = Store::create(&path).unwrap();
            assert!(store.users().is_empty());
        }

        {
            let store = Store::open(&path).unwrap();
            assert!(store.users().is_empty());
        }
    }

    #[test]
    fn test_commit_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.relmap");

        {
            let store = Store::create(&path).unwrap();
            store
                .transaction(UserId(1), |tx| {
                    tx.insert_entity(NewEntity::new("Alice", "person"))?;
                    tx.insert_version(1, Some("first"), "user", Snapshot::default())
                })
                .unwrap();
        }

        let store = Store::open(&path).unwrap();
        store.read(UserId(1), |p| {
            assert_eq!(p.entities().len(), 1);
            assert_eq!(p.entities()[0].name, "Alice");
            assert_eq!(p.versions()[0].description, "first");
        });
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = Store::in_memory();
        store
            .transaction(UserId(1), |tx| tx.insert_entity(NewEntity::new("Alice", "person")))
            .unwrap();

        let result: Result<()> = store.transaction(UserId(1), |tx| {
            tx.insert_entity(NewEntity::new("Bob", "person"))?;
            tx.clear_relations();
            Err(Error::Validation("abort".into()))
        });
        assert!(result.is_err());

        store.read(UserId(1), |p| {
            assert_eq!(p.entities().len(), 1);
        });

        // The rolled-back insert did not consume an id visible to later writes
        let carol = store
            .transaction(UserId(1), |tx| tx.insert_entity(NewEntity::new("Carol", "person")))
            .unwrap();
        assert_eq!(carol.id.get(), 2);
    }

    #[test]
    fn test_partitions_are_isolated() {
        let store = Store::in_memory();
        store
            .transaction(UserId(1), |tx| tx.insert_entity(NewEntity::new("Alice", "person")))
            .unwrap();
        store.read(UserId(2), |p| assert!(p.entities().is_empty()));
        assert_eq!(store.users(), vec![UserId(1)]);
    }

    #[test]
    fn test_detects_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.relmap");
        {
            let store = Store::create(&path).unwrap();
            store
                .transaction(UserId(1), |tx| tx.insert_entity(NewEntity::new("Alice", "person")))
                .unwrap();
        }

        let mut data = fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        fs::write(&path, &data).unwrap();

        assert!(matches!(Store::open(&path), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_rejects_foreign_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-store");
        fs::write(&path, vec![0u8; 128]).unwrap();
        assert!(matches!(Store::open(&path), Err(Error::InvalidFile(_))));

        let mut image = encode_image(&Tables::default()).unwrap();
        image[8..12].copy_from_slice(&99u32.to_le_bytes());
        fs::write(&path, &image).unwrap();
        assert!(matches!(
            Store::open(&path),
            Err(Error::VersionMismatch { found: 99, .. })
        ));
    }
}
