//! Sign-out.
//!
//! Only clears the store. The gate and the accounts adapter are subscribed
//! to the token field and react on their own; sign-out never touches UI.

use std::sync::Arc;

use tracing::info;

use crate::error::StoreError;
use crate::session;
use crate::store::SessionStore;

/// Command id for hosts that register commands
pub const SIGN_OUT_COMMAND: &str = "talemo.signOut";

#[derive(Clone)]
pub struct SignOut {
    store: Arc<dyn SessionStore>,
}

impl SignOut {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Remove `token`, then `user`.
    pub fn run(&self) -> Result<(), StoreError> {
        session::clear_session(self.store.as_ref())?;
        info!("Signed out");
        Ok(())
    }
}
