//! Talemo session synchronization.
//!
//! Keeps three observers consistent with one persisted session:
//!
//! - `AuthGate`: shows a `LoginSurface` whenever there is no session
//! - `LoginSurface`: runs the remote login and writes the session
//! - `AccountsAdapter`: exposes the session to a host accounts UI
//!
//! All of them talk only to the `SessionStore`; `SignOut` clears it and the
//! observers react through their subscriptions.

pub mod accounts;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gate;
pub mod login;
pub mod session;
pub mod signout;
pub mod store;

pub use accounts::{AccountsAdapter, SessionQuery};
pub use api::{ApiClient, ApiError, AuthBackend, LoginResponse};
pub use bootstrap::{bootstrap, Services, SharedStore};
pub use config::{Config, StoreKind};
pub use error::{AccountsError, StoreError};
pub use gate::{AuthGate, GateState, HeadlessContainer, OverlayContainer};
pub use login::{LoginCompleted, LoginSurface, SubmitOutcome, SurfaceId, SurfaceState};
pub use session::{
    Credential, ExternalSession, SessionAccount, SessionChangeEvent, SessionRecord, UserInfo,
};
pub use signout::{SignOut, SIGN_OUT_COMMAND};
pub use store::{Field, FieldChange, PersistentStore, SessionStore, Subscription};
