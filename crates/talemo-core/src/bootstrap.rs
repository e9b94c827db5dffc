//! Startup wiring.
//!
//! This is the one place where a setup failure is turned into a logged,
//! non-fatal fallback instead of an error: if the configured storage cannot
//! be opened the host still starts, on an in-memory store, which means no
//! session and therefore the login surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::accounts::AccountsAdapter;
use crate::api::AuthBackend;
use crate::config::{Config, StoreKind};
use crate::error::StoreError;
use crate::gate::{AuthGate, OverlayContainer};
use crate::login::{CompletionCallback, LoginCompleted};
use crate::signout::SignOut;
use crate::store::{Field, FieldBackend, FileBackend, KeyringBackend, MemoryBackend, PersistentStore};

/// The store type the host runs on; the backend is picked from config.
pub type SharedStore = PersistentStore<Box<dyn FieldBackend>>;

/// Everything a host needs after startup.
pub struct Services {
    pub store: Arc<SharedStore>,
    pub gate: Arc<AuthGate>,
    pub accounts: Arc<AccountsAdapter>,
    pub sign_out: SignOut,
}

impl Services {
    /// Pick up session changes made by other processes. Subscribers hear
    /// about every readable field that changed; read errors are logged and
    /// the next tick tries again.
    pub fn refresh(&self) -> Vec<Field> {
        match self.store.refresh() {
            Ok(changed) => changed,
            Err(e) => {
                debug!(error = %e, "Session refresh failed");
                Vec::new()
            }
        }
    }
}

/// Open the configured field backend.
pub fn open_backend(config: &Config) -> Result<Box<dyn FieldBackend>> {
    let backend: Box<dyn FieldBackend> = match config.store {
        StoreKind::File => {
            let dir = config.session_dir()?;
            Box::new(
                FileBackend::open(&dir)
                    .with_context(|| format!("Failed to open session directory {}", dir.display()))?,
            )
        }
        StoreKind::Keyring => {
            let backend = KeyringBackend::new();
            check_keyring(&backend).context("Keyring is not usable")?;
            Box::new(backend)
        }
        StoreKind::Memory => Box::new(MemoryBackend::new()),
    };
    Ok(backend)
}

fn check_keyring(backend: &dyn FieldBackend) -> Result<(), StoreError> {
    backend.read(Field::Token).map(|_| ())
}

/// Telemetry-only completion hook installed on every login surface.
fn log_login_completion() -> CompletionCallback {
    Arc::new(|done: &LoginCompleted| {
        info!(
            surface = %done.surface,
            elapsed_ms = done.elapsed.num_milliseconds(),
            completed_at = %done.completed_at,
            "Login completed"
        );
    })
}

/// Open storage and start every observer.
pub fn bootstrap(
    config: &Config,
    backend: Arc<dyn AuthBackend>,
    container: Arc<dyn OverlayContainer>,
) -> Services {
    let field_backend = match open_backend(config) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %format!("{:#}", e), store = ?config.store, "Session storage unavailable, falling back to memory");
            Box::new(MemoryBackend::new())
        }
    };

    let store: Arc<SharedStore> = PersistentStore::shared(field_backend);
    let accounts = AccountsAdapter::start(store.clone());
    let gate = AuthGate::start(store.clone(), backend, container, Some(log_login_completion()));
    let sign_out = SignOut::new(store.clone());

    info!(store = ?config.store, signed_in = !gate.is_overlay_attached(), "Session services started");

    Services {
        store,
        gate,
        accounts,
        sign_out,
    }
}
