//! Byte-level persistence for session fields.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use keyring::Entry;
use parking_lot::Mutex;
use tracing::debug;

use super::Field;
use crate::error::StoreError;

/// Keyring service name for the session fields
pub const KEYRING_SERVICE: &str = "talemo";

/// Where the persisted value of each field lives.
///
/// Each call touches exactly one field and is atomic for it.
pub trait FieldBackend: Send + Sync {
    fn read(&self, field: Field) -> Result<Option<String>, StoreError>;

    fn write(&self, field: Field, value: &str) -> Result<(), StoreError>;

    /// Removing a field that is not stored is not an error.
    fn delete(&self, field: Field) -> Result<(), StoreError>;
}

/// Process-local backend. Used in tests and as the fail-closed fallback when
/// the real storage cannot be opened.
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<Field, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FieldBackend for MemoryBackend {
    fn read(&self, field: Field) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(&field).cloned())
    }

    fn write(&self, field: Field, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(field, value.to_string());
        Ok(())
    }

    fn delete(&self, field: Field) -> Result<(), StoreError> {
        self.values.lock().remove(&field);
        Ok(())
    }
}

/// One file per field inside a directory shared by the whole installation.
///
/// Writes go through a temporary file and a rename so a concurrent reader in
/// another process never sees a half-written value.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened file session backend");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn field_path(&self, field: Field) -> PathBuf {
        self.dir.join(field.key())
    }
}

impl FieldBackend for FileBackend {
    fn read(&self, field: Field) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.field_path(field)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, field: Field, value: &str) -> Result<(), StoreError> {
        let path = self.field_path(field);
        let tmp = self.dir.join(format!(".{}.tmp", field.key()));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, field: Field) -> Result<(), StoreError> {
        match std::fs::remove_file(self.field_path(field)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// OS keychain, one entry per field under [`KEYRING_SERVICE`].
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, field: Field) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, field.key())?)
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldBackend for KeyringBackend {
    fn read(&self, field: Field) -> Result<Option<String>, StoreError> {
        match self.entry(field)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, field: Field, value: &str) -> Result<(), StoreError> {
        self.entry(field)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, field: Field) -> Result<(), StoreError> {
        match self.entry(field)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_read_write_delete() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read(Field::Token).unwrap(), None);

        backend.write(Field::Token, "abc").unwrap();
        assert_eq!(backend.read(Field::Token).unwrap().as_deref(), Some("abc"));
        assert_eq!(backend.read(Field::User).unwrap(), None);

        backend.delete(Field::Token).unwrap();
        assert_eq!(backend.read(Field::Token).unwrap(), None);
        // Deleting again is fine
        backend.delete(Field::Token).unwrap();
    }

    #[test]
    fn test_file_backend_one_file_per_field() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path().join("session")).unwrap();

        backend.write(Field::Token, "tok").unwrap();
        backend.write(Field::User, r#"{"id":"1","email":"a@x.com"}"#).unwrap();

        assert!(backend.dir().join("token").exists());
        assert!(backend.dir().join("user").exists());
        assert!(!backend.dir().join(".token.tmp").exists());

        backend.delete(Field::Token).unwrap();
        assert_eq!(backend.read(Field::Token).unwrap(), None);
        assert!(backend.read(Field::User).unwrap().is_some());
    }

    #[test]
    fn test_file_backend_shared_between_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let a = FileBackend::open(tmp.path()).unwrap();
        let b = FileBackend::open(tmp.path()).unwrap();

        a.write(Field::Token, "from-a").unwrap();
        assert_eq!(b.read(Field::Token).unwrap().as_deref(), Some("from-a"));
    }

    #[test]
    fn test_file_backend_delete_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();
        assert!(backend.delete(Field::User).is_ok());
    }
}
