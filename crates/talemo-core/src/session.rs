//! Session data model and the read/write helpers every component shares.
//!
//! A session is *present* iff the `token` field is non-empty. The `user`
//! field is display metadata: absent or malformed user data falls back to a
//! placeholder identity and never invalidates the token.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{Field, SessionStore};

/// Prefix of every externally-visible session id
pub const SESSION_ID_PREFIX: &str = "talemo-";

/// The single scope carried by talemo sessions
pub const SESSION_SCOPE: &str = "talemo";

const PLACEHOLDER_USER_ID: &str = "unknown";
const PLACEHOLDER_USER_EMAIL: &str = "Unknown user";

/// Email/password pair for one login submission. Never persisted.
#[derive(Clone, Serialize)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Both parts must be non-empty once trimmed.
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity stored in the `user` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
}

impl UserInfo {
    pub fn placeholder() -> Self {
        Self {
            id: PLACEHOLDER_USER_ID.to_string(),
            email: PLACEHOLDER_USER_EMAIL.to_string(),
        }
    }
}

/// What is persisted across the two fields, read back in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    /// `None` when the user field is missing or could not be parsed.
    pub user: Option<UserInfo>,
}

impl SessionRecord {
    /// The stored identity, or the placeholder when there is none.
    pub fn identity(&self) -> UserInfo {
        self.user.clone().unwrap_or_else(UserInfo::placeholder)
    }

    pub fn to_external(&self) -> ExternalSession {
        let user = self.identity();
        ExternalSession {
            id: format!("{}{}", SESSION_ID_PREFIX, user.id),
            access_token: self.token.clone(),
            account: SessionAccount {
                id: user.id,
                label: user.email,
            },
            scopes: vec![SESSION_SCOPE.to_string()],
        }
    }
}

/// Account half of an [`ExternalSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionAccount {
    pub id: String,
    pub label: String,
}

/// The session as the host accounts UI sees it. Always derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ExternalSession {
    pub id: String,
    pub access_token: String,
    pub account: SessionAccount,
    pub scopes: Vec<String>,
}

/// Emitted by the accounts adapter. At most one side is populated; both empty
/// means "the session went away and the removed value is unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionChangeEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<ExternalSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<ExternalSession>,
}

impl SessionChangeEvent {
    pub fn added(session: ExternalSession) -> Self {
        Self {
            added: Some(session),
            removed: None,
        }
    }

    pub fn removed(session: ExternalSession) -> Self {
        Self {
            added: None,
            removed: Some(session),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.removed.is_none()
    }
}

/// Parse the `user` field. Malformed data yields `None`, never an error.
pub fn parse_user(raw: &str) -> Option<UserInfo> {
    match serde_json::from_str::<UserInfo>(raw) {
        Ok(user) => Some(user),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed user field");
            None
        }
    }
}

/// Whether the token field currently holds a session.
pub fn has_session(store: &dyn SessionStore) -> Result<bool, StoreError> {
    Ok(store
        .get(Field::Token)?
        .is_some_and(|token| !token.is_empty()))
}

/// Read the current session from the store.
///
/// Only a failure to read the token is an error; problems with the user field
/// degrade to the placeholder identity.
pub fn read_session(store: &dyn SessionStore) -> Result<Option<SessionRecord>, StoreError> {
    let token = match store.get(Field::Token)? {
        Some(token) if !token.is_empty() => token,
        _ => return Ok(None),
    };

    let user = match store.get(Field::User) {
        Ok(Some(raw)) => parse_user(&raw),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read user field, using placeholder identity");
            None
        }
    };

    Ok(Some(SessionRecord { token, user }))
}

/// Persist a new session: `token` first, then `user`.
pub fn write_session(
    store: &dyn SessionStore,
    token: &str,
    user: &UserInfo,
) -> Result<(), StoreError> {
    let user_json = serde_json::to_string(user)?;
    store.set(Field::Token, token)?;
    store.set(Field::User, &user_json)?;
    Ok(())
}

/// Clear the session: `token` first so observers see "no session" as early
/// as possible, then `user`.
pub fn clear_session(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove(Field::Token)?;
    store.remove(Field::User)?;
    Ok(())
}
