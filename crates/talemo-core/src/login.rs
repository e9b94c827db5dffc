//! Credential-collecting login surface.
//!
//! A surface goes `Idle -> Submitting -> Error | Success`. On success it
//! persists the session into the store and asks its owner (the gate) to
//! dispose it. Once disposed, an in-flight exchange is aborted and any late
//! response is dropped without touching the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::AuthBackend;
use crate::session::{self, Credential};
use crate::store::SessionStore;

/// Shown when either field is blank
pub const VALIDATION_MESSAGE: &str = "Please enter your email and password.";

/// Shown when the exchange succeeded but the session could not be persisted
pub const SAVE_FAILURE_MESSAGE: &str = "Unable to save your session.";

const SUBMIT_LABEL: &str = "Sign in";
const SUBMITTING_LABEL: &str = "Signing in…";

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one surface instance. A new overlay always gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    fn next() -> Self {
        SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "login-surface-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceState {
    Idle,
    Submitting,
    /// Idle with an inline message; the user may resubmit.
    Error(String),
    Success,
}

/// What a call to [`LoginSurface::submit`] ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    SignedIn,
    /// Validation failed; no request was sent.
    Invalid,
    /// The exchange or the session write failed; carries the shown message.
    Failed(String),
    /// A submission was already in flight, or this surface already signed in.
    Busy,
    /// The surface was disposed before or during the exchange.
    Cancelled,
}

/// Telemetry for a completed login. Carries no session data:
/// anyone who needs the session reads the store.
#[derive(Debug, Clone)]
pub struct LoginCompleted {
    pub surface: SurfaceId,
    pub completed_at: DateTime<Utc>,
    pub elapsed: Duration,
}

pub type CompletionCallback = Arc<dyn Fn(&LoginCompleted) + Send + Sync>;

pub(crate) type DismissHook = Box<dyn Fn(SurfaceId) + Send + Sync>;

struct SurfaceInner {
    state: SurfaceState,
    in_flight: Option<AbortHandle>,
    disposed: bool,
}

pub struct LoginSurface {
    id: SurfaceId,
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn AuthBackend>,
    inner: Mutex<SurfaceInner>,
    on_success: Option<DismissHook>,
    on_complete: Option<CompletionCallback>,
}

impl LoginSurface {
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            id: SurfaceId::next(),
            store,
            backend,
            inner: Mutex::new(SurfaceInner {
                state: SurfaceState::Idle,
                in_flight: None,
                disposed: false,
            }),
            on_success: None,
            on_complete: None,
        }
    }

    pub fn with_completion(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub(crate) fn with_dismiss(mut self, hook: DismissHook) -> Self {
        self.on_success = Some(hook);
        self
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn state(&self) -> SurfaceState {
        self.inner.lock().state.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.inner.lock().state {
            SurfaceState::Error(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn is_submit_enabled(&self) -> bool {
        let inner = self.inner.lock();
        !inner.disposed && matches!(inner.state, SurfaceState::Idle | SurfaceState::Error(_))
    }

    pub fn submit_label(&self) -> &'static str {
        match self.inner.lock().state {
            SurfaceState::Submitting => SUBMITTING_LABEL,
            _ => SUBMIT_LABEL,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    /// Tear the surface down. Aborts an in-flight exchange; idempotent.
    pub fn dispose(&self) {
        let in_flight = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.in_flight.take()
        };

        if let Some(handle) = in_flight {
            debug!(surface = %self.id, "Aborting in-flight login");
            handle.abort();
        }
    }

    /// Validate, run the remote exchange, and persist the session on success.
    pub async fn submit(&self, credential: Credential) -> SubmitOutcome {
        let started = Utc::now();

        let registration = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return SubmitOutcome::Cancelled;
            }
            if matches!(inner.state, SurfaceState::Submitting | SurfaceState::Success) {
                return SubmitOutcome::Busy;
            }
            if !credential.is_complete() {
                inner.state = SurfaceState::Error(VALIDATION_MESSAGE.to_string());
                return SubmitOutcome::Invalid;
            }

            let (handle, registration) = AbortHandle::new_pair();
            inner.in_flight = Some(handle);
            inner.state = SurfaceState::Submitting;
            registration
        };

        let credential = Credential {
            email: credential.email.trim().to_string(),
            password: credential.password,
        };
        debug!(surface = %self.id, email = %credential.email, "Submitting login");

        let result = Abortable::new(self.backend.login(&credential), registration).await;

        {
            let mut inner = self.inner.lock();
            inner.in_flight = None;
            if inner.disposed {
                debug!(surface = %self.id, "Surface disposed during login, dropping response");
                return SubmitOutcome::Cancelled;
            }
        }

        let response = match result {
            Err(_aborted) => return SubmitOutcome::Cancelled,
            Ok(Err(e)) => {
                warn!(surface = %self.id, error = %e, "Login failed");
                return self.fail(e.user_message());
            }
            Ok(Ok(response)) => response,
        };

        if let Err(e) =
            session::write_session(self.store.as_ref(), &response.access_token, &response.user)
        {
            error!(surface = %self.id, error = %e, "Failed to persist session");
            return self.fail(SAVE_FAILURE_MESSAGE.to_string());
        }

        self.inner.lock().state = SurfaceState::Success;
        info!(surface = %self.id, user_id = %response.user.id, "Login successful");

        if let Some(dismiss) = &self.on_success {
            dismiss(self.id);
        }
        if let Some(callback) = &self.on_complete {
            let completed_at = Utc::now();
            callback(&LoginCompleted {
                surface: self.id,
                completed_at,
                elapsed: completed_at - started,
            });
        }

        SubmitOutcome::SignedIn
    }

    fn fail(&self, message: String) -> SubmitOutcome {
        let mut inner = self.inner.lock();
        if !inner.disposed {
            inner.state = SurfaceState::Error(message.clone());
        }
        SubmitOutcome::Failed(message)
    }
}

impl std::fmt::Debug for LoginSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LoginSurface")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("disposed", &inner.disposed)
            .finish()
    }
}
