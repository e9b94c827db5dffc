//! Accounts adapter: the current session as a host accounts UI sees it.
//!
//! There is at most one session. Every query re-derives it from the store.
//!
//! Removal events are asymmetric. When the adapter itself removes the
//! session it read the session first, so the event carries it in `removed`.
//! When some other writer clears the store (sign-out, another process) the
//! adapter only learns that the token is gone and emits an empty event.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AccountsError, StoreError};
use crate::session::{self, ExternalSession, SessionChangeEvent};
use crate::store::{Field, FieldChange, Notifier, SessionStore, Subscription};

/// Narrows a session query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Only return the session of this account id.
    pub account: Option<String>,
}

pub type SessionChangeHandler = Arc<dyn Fn(&SessionChangeEvent) + Send + Sync>;

/// A removal started by `remove_session`, waiting for its token notification.
struct PendingRemoval {
    /// The session read just before clearing, if there was one.
    previous: Option<ExternalSession>,
}

pub struct AccountsAdapter {
    store: Arc<dyn SessionStore>,
    changes: Notifier<SessionChangeEvent>,
    /// Claimed by the first token-absent notification after `remove_session`
    /// starts clearing. Present notifications never touch it.
    pending_removal: Mutex<Option<PendingRemoval>>,
    _subscription: Subscription,
}

impl AccountsAdapter {
    pub fn start(store: Arc<dyn SessionStore>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<AccountsAdapter>| {
            let weak = this.clone();
            let subscription = store.subscribe(
                Field::Token,
                Arc::new(move |change: &FieldChange| {
                    if let Some(adapter) = weak.upgrade() {
                        adapter.on_token_change(change);
                    }
                }),
            );

            Self {
                store,
                changes: Notifier::new(),
                pending_removal: Mutex::new(None),
                _subscription: subscription,
            }
        })
    }

    /// Zero or one session, read from the store now.
    pub fn list_sessions(&self) -> Result<Vec<ExternalSession>, StoreError> {
        Ok(session::read_session(self.store.as_ref())?
            .map(|record| record.to_external())
            .into_iter()
            .collect())
    }

    /// Sessions carrying every scope in `scopes`, optionally for one account.
    pub fn get_sessions(
        &self,
        scopes: &[&str],
        query: &SessionQuery,
    ) -> Result<Vec<ExternalSession>, AccountsError> {
        Ok(self
            .list_sessions()?
            .into_iter()
            .filter(|s| scopes.iter().all(|scope| s.scopes.iter().any(|have| have == scope)))
            .filter(|s| {
                query
                    .account
                    .as_deref()
                    .map_or(true, |account| s.account.id == account)
            })
            .collect())
    }

    /// Report the existing session. Never signs in.
    pub fn create_session(
        &self,
        scopes: &[&str],
        query: &SessionQuery,
    ) -> Result<ExternalSession, AccountsError> {
        self.get_sessions(scopes, query)?
            .into_iter()
            .next()
            .ok_or(AccountsError::NoSession)
    }

    /// Clear the session if `id` names it. The `removed` event carries the
    /// session as it was just before and goes out as soon as the token is
    /// gone, even if clearing the user field then fails.
    pub fn remove_session(&self, id: &str) -> Result<(), AccountsError> {
        let previous = session::read_session(self.store.as_ref())?.map(|r| r.to_external());

        if let Some(current) = &previous {
            if current.id != id {
                warn!(requested = id, current = %current.id, "Ignoring removal of unknown session");
                return Ok(());
            }
        }

        match &previous {
            Some(removed) => info!(session = %removed.id, "Removing session through accounts adapter"),
            None => debug!(requested = id, "No session to remove, clearing fields"),
        }

        *self.pending_removal.lock() = Some(PendingRemoval { previous });
        let cleared = session::clear_session(self.store.as_ref());
        // Unclaimed when the token removal itself failed.
        self.pending_removal.lock().take();

        cleared?;
        Ok(())
    }

    pub fn on_did_change_sessions(&self, handler: SessionChangeHandler) -> Subscription {
        self.changes.subscribe(handler)
    }

    fn on_token_change(&self, change: &FieldChange) {
        let own_removal = if change.is_present() {
            None
        } else {
            self.pending_removal.lock().take()
        };

        // The store, not the notification, says what is true now.
        let current = match session::read_session(self.store.as_ref()) {
            Ok(record) => record.map(|r| r.to_external()),
            Err(e) => {
                warn!(error = %e, "Failed to read session after token change");
                None
            }
        };
        debug!(
            reported = change.is_present(),
            present = current.is_some(),
            own_removal = own_removal.is_some(),
            "Re-broadcasting session change"
        );

        match (own_removal, current) {
            (Some(removal), current) => {
                if let Some(removed) = removal.previous {
                    self.changes.notify(&SessionChangeEvent::removed(removed));
                }
                // Someone signed in again from inside the removal.
                if let Some(added) = current {
                    self.changes.notify(&SessionChangeEvent::added(added));
                }
            }
            (None, Some(added)) => self.changes.notify(&SessionChangeEvent::added(added)),
            (None, None) => self.changes.notify(&SessionChangeEvent::default()),
        }
    }
}
