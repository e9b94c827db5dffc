//! Persistent session storage with per-field change notification.
//!
//! The session lives in two independently-keyed fields, `token` and `user`.
//! There is no transaction spanning both: writing or clearing a session is
//! two separate mutations, each of which notifies its own subscribers.
//!
//! - `SessionStore`: the injected key-value interface every component uses
//! - `PersistentStore`: the implementation, generic over a `FieldBackend`
//! - `FieldBackend`: where the bytes live (memory, files, OS keyring)

pub mod backend;
pub mod notifier;
pub mod persistent;

use std::fmt;
use std::sync::Arc;

pub use backend::{FieldBackend, FileBackend, KeyringBackend, MemoryBackend};
pub use notifier::{Notifier, Subscription};
pub use persistent::PersistentStore;

use crate::error::StoreError;

/// One independently-addressable persisted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Token,
    User,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Token, Field::User];

    /// Stable storage key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Token => "token",
            Field::User => "user",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Delivered to subscribers after a field was mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Field,
    /// The value the field now holds; `None` once removed.
    pub value: Option<String>,
}

impl FieldChange {
    /// Whether the field now holds a non-empty value.
    pub fn is_present(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Handler invoked for every change of a subscribed field.
pub type ChangeHandler = Arc<dyn Fn(&FieldChange) + Send + Sync>;

/// The key-value interface shared by every session component.
///
/// Mutations are synchronous and notify subscribers of the mutated field
/// before returning. Handlers run re-entrantly inside the mutating call, with
/// no store lock held, so they may read or write the store themselves; they
/// must not assume anything about the other field.
pub trait SessionStore: Send + Sync {
    fn get(&self, field: Field) -> Result<Option<String>, StoreError>;

    fn set(&self, field: Field, value: &str) -> Result<(), StoreError>;

    fn remove(&self, field: Field) -> Result<(), StoreError>;

    /// Register `handler` for changes to `field` until the returned guard is dropped.
    fn subscribe(&self, field: Field, handler: ChangeHandler) -> Subscription;
}
