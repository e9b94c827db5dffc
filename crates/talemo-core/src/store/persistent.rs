use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{ChangeHandler, Field, FieldBackend, FieldChange, Notifier, SessionStore, Subscription};
use crate::error::StoreError;

impl FieldBackend for Box<dyn FieldBackend> {
    fn read(&self, field: Field) -> Result<Option<String>, StoreError> {
        (**self).read(field)
    }

    fn write(&self, field: Field, value: &str) -> Result<(), StoreError> {
        (**self).write(field, value)
    }

    fn delete(&self, field: Field) -> Result<(), StoreError> {
        (**self).delete(field)
    }
}

/// [`SessionStore`] over a [`FieldBackend`].
///
/// Besides its own mutations, the store can pick up writes made by other
/// processes sharing the backend: [`PersistentStore::refresh`] compares what
/// is persisted against the last value this process saw and notifies for
/// every field that differs.
pub struct PersistentStore<B> {
    backend: B,
    observed: Mutex<HashMap<Field, Option<String>>>,
    token_changes: Notifier<FieldChange>,
    user_changes: Notifier<FieldChange>,
}

impl<B: FieldBackend> PersistentStore<B> {
    pub fn new(backend: B) -> Self {
        let mut observed = HashMap::new();
        for field in Field::ALL {
            let value = match backend.read(field) {
                Ok(value) => value,
                Err(e) => {
                    warn!(%field, error = %e, "Failed to read field while opening store");
                    None
                }
            };
            observed.insert(field, value);
        }

        Self {
            backend,
            observed: Mutex::new(observed),
            token_changes: Notifier::new(),
            user_changes: Notifier::new(),
        }
    }

    /// Convenience for the common `Arc<dyn SessionStore>` use.
    pub fn shared(backend: B) -> Arc<Self> {
        Arc::new(Self::new(backend))
    }

    /// Re-read every field and notify for those changed behind our back.
    ///
    /// Returns the fields that were reported as changed. A field that cannot
    /// be read is skipped for this pass; the others are still checked and
    /// notified, and the first read error is returned afterwards.
    pub fn refresh(&self) -> Result<Vec<Field>, StoreError> {
        let mut changes = Vec::new();
        let mut first_error = None;
        for field in Field::ALL {
            let current = match self.backend.read(field) {
                Ok(current) => current,
                Err(e) => {
                    debug!(%field, error = %e, "Skipping unreadable field during refresh");
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            let mut observed = self.observed.lock();
            if observed.get(&field) != Some(&current) {
                observed.insert(field, current.clone());
                changes.push(FieldChange {
                    field,
                    value: current,
                });
            }
        }

        let changed: Vec<Field> = changes.iter().map(|c| c.field).collect();
        if !changed.is_empty() {
            debug!(?changed, "External session change detected");
        }
        for change in &changes {
            self.notifier(change.field).notify(change);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(changed),
        }
    }

    fn notifier(&self, field: Field) -> &Notifier<FieldChange> {
        match field {
            Field::Token => &self.token_changes,
            Field::User => &self.user_changes,
        }
    }

    fn record_and_notify(&self, field: Field, value: Option<String>) {
        self.observed.lock().insert(field, value.clone());
        self.notifier(field).notify(&FieldChange { field, value });
    }
}

impl<B: FieldBackend> SessionStore for PersistentStore<B> {
    fn get(&self, field: Field) -> Result<Option<String>, StoreError> {
        self.backend.read(field)
    }

    fn set(&self, field: Field, value: &str) -> Result<(), StoreError> {
        self.backend.write(field, value)?;
        debug!(%field, "Session field written");
        self.record_and_notify(field, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, field: Field) -> Result<(), StoreError> {
        self.backend.delete(field)?;
        debug!(%field, "Session field removed");
        self.record_and_notify(field, None);
        Ok(())
    }

    fn subscribe(&self, field: Field, handler: ChangeHandler) -> Subscription {
        self.notifier(field).subscribe(handler)
    }
}
