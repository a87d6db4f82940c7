//! File-Backed Persistent Store
//!
//! One JSON document per record under `<root>/<namespace>/<encoded id>.json`.
//! Writes go to a uniquely named temp file in the same directory and are
//! renamed into place, so a reader never sees a half-written record. A
//! record file is never replaced by a different record. Each namespace
//! directory is assumed to have a single writer.
//!
//! Ids are encoded byte-wise: `[A-Za-z0-9_-]` pass through, every other byte
//! becomes `%XX`. The mapping is injective and never yields `.` or `..`.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::{PersistentError, PersistentStore};
use crate::constants::PERSISTENT_NAMESPACE_BYTES_MAX;
use crate::memory::record::VectorRecord;

const RECORD_FILE_EXTENSION: &str = "json";

/// Persistent store writing JSON files under a namespace directory.
#[derive(Clone, Debug)]
pub struct FilePersistentStore {
    namespace: String,
    dir: PathBuf,
}

impl FilePersistentStore {
    /// Create a store rooted at `root`, writing under `root/namespace`.
    ///
    /// The directory is created on first write.
    ///
    /// # Errors
    /// Returns [`PersistentError::InvalidNamespace`] unless the namespace is
    /// 1 to `PERSISTENT_NAMESPACE_BYTES_MAX` bytes of `[A-Za-z0-9_.-]` and not
    /// `.` or `..`.
    pub fn new(root: impl AsRef<Path>, namespace: impl Into<String>) -> Result<Self, PersistentError> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        let dir = root.as_ref().join(&namespace);
        Ok(Self { namespace, dir })
    }

    /// Directory holding this namespace's records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, PersistentError> {
        if id.is_empty() {
            return Err(PersistentError::InvalidId { id: id.to_string() });
        }
        Ok(self
            .dir
            .join(format!("{}.{RECORD_FILE_EXTENSION}", encode_id(id))))
    }
}

fn validate_namespace(namespace: &str) -> Result<(), PersistentError> {
    let valid = !namespace.is_empty()
        && namespace.len() <= PERSISTENT_NAMESPACE_BYTES_MAX
        && namespace != "."
        && namespace != ".."
        && namespace
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(PersistentError::InvalidNamespace {
            namespace: namespace.to_string(),
        })
    }
}

/// Record id for a directory entry, if the entry is a record file.
///
/// Temp files and names that `encode_id` would not produce are skipped.
fn id_from_file_name(name: &str) -> Option<String> {
    if name.starts_with('.') {
        return None;
    }
    let stem = name.strip_suffix(RECORD_FILE_EXTENSION)?.strip_suffix('.')?;
    decode_id(stem)
}

fn encode_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

fn decode_id(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-') {
            decoded.push(byte);
            i += 1;
        } else {
            return None;
        }
    }

    let id = String::from_utf8(decoded).ok()?;
    // Reject alternate spellings such as "%41" for "A".
    (!id.is_empty() && encode_id(&id) == encoded).then_some(id)
}

#[async_trait]
impl PersistentStore for FilePersistentStore {
    #[tracing::instrument(skip(self, record), fields(id = %record.id, namespace = %self.namespace))]
    async fn put(&self, record: &VectorRecord) -> Result<(), PersistentError> {
        let path = self.record_path(&record.id)?;
        let bytes = serde_json::to_vec(record)
            .map_err(|e| PersistentError::serialization(e.to_string()))?;

        if let Some(existing) = self.get(&record.id).await? {
            if existing != *record {
                tracing::warn!(path = %path.display(), "refusing to replace a different record");
                return Err(PersistentError::conflict(&record.id));
            }
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistentError::write(format!("{}: {e}", self.dir.display())))?;

        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PersistentError::write(format!("{}: {e}", tmp.display())));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PersistentError::write(format!("{}: {e}", path.display())));
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>, PersistentError> {
        let path = self.record_path(id)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistentError::read(format!("{}: {e}", path.display()))),
        };

        let record: VectorRecord = serde_json::from_slice(&bytes)
            .map_err(|e| PersistentError::serialization(format!("{}: {e}", path.display())))?;
        Ok(Some(record))
    }

    async fn has(&self, id: &str) -> Result<bool, PersistentError> {
        let path = self.record_path(id)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| PersistentError::read(format!("{}: {e}", path.display())))
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistentError> {
        let path = self.record_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistentError::write(format!("{}: {e}", path.display()))),
        }
    }

    async fn len(&self) -> Result<usize, PersistentError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(PersistentError::read(format!("{}: {e}", self.dir.display()))),
        };

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistentError::read(e.to_string()))?
        {
            if entry.file_name().to_str().and_then(id_from_file_name).is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn stored_ids(&self) -> Result<Vec<String>, PersistentError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistentError::read(format!("{}: {e}", self.dir.display()))),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PersistentError::read(e.to_string()))?;
            if let Some(id) = entry.file_name().to_str().and_then(id_from_file_name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
