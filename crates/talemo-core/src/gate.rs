//! The login gate.
//!
//! Shows a login surface whenever the token field holds no session and
//! removes it when one appears. The gate only reacts to the store: sign-out,
//! expiry and changes made by other processes all bring the overlay back the
//! same way.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::AuthBackend;
use crate::login::{CompletionCallback, LoginSurface, SurfaceId};
use crate::session;
use crate::store::{Field, FieldChange, SessionStore, Subscription};

/// The host container the overlay is mounted into.
///
/// `attach` is called once per constructed overlay and `detach` once when it
/// is disposed. Hosts that render by polling [`AuthGate::overlay`] can use
/// [`HeadlessContainer`].
pub trait OverlayContainer: Send + Sync {
    fn attach(&self, surface: &Arc<LoginSurface>);

    fn detach(&self, surface: &Arc<LoginSurface>);
}

/// Container that does nothing; the host polls the gate instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessContainer;

impl OverlayContainer for HeadlessContainer {
    fn attach(&self, _surface: &Arc<LoginSurface>) {}

    fn detach(&self, _surface: &Arc<LoginSurface>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Overlay shown, interaction blocked
    Unauthenticated,
    /// No overlay
    Authenticated,
}

pub struct AuthGate {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn AuthBackend>,
    container: Arc<dyn OverlayContainer>,
    on_login: Option<CompletionCallback>,
    /// The single owned overlay instance, if attached
    overlay: Mutex<Option<Arc<LoginSurface>>>,
    _subscription: Subscription,
    this: Weak<AuthGate>,
}

impl AuthGate {
    /// Start observing the store and compute the initial state.
    ///
    /// A failing initial read counts as "no session": the gate fails closed
    /// to the login surface.
    pub fn start(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn AuthBackend>,
        container: Arc<dyn OverlayContainer>,
        on_login: Option<CompletionCallback>,
    ) -> Arc<Self> {
        let gate = Arc::new_cyclic(|this: &Weak<AuthGate>| {
            // Subscribe before the initial read so nothing slips in between.
            let weak = this.clone();
            let subscription = store.subscribe(
                Field::Token,
                Arc::new(move |change: &FieldChange| {
                    if let Some(gate) = weak.upgrade() {
                        gate.on_token_change(change);
                    }
                }),
            );

            Self {
                store,
                backend,
                container,
                on_login,
                overlay: Mutex::new(None),
                _subscription: subscription,
                this: this.clone(),
            }
        });

        match session::has_session(gate.store.as_ref()) {
            Ok(true) => debug!("Session present at startup"),
            Ok(false) => {
                debug!("No session at startup");
                gate.show_login_overlay();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session at startup, treating as signed out");
                gate.show_login_overlay();
            }
        }

        gate
    }

    pub fn state(&self) -> GateState {
        if self.overlay.lock().is_some() {
            GateState::Unauthenticated
        } else {
            GateState::Authenticated
        }
    }

    pub fn is_overlay_attached(&self) -> bool {
        self.state() == GateState::Unauthenticated
    }

    /// The attached overlay, if any.
    pub fn overlay(&self) -> Option<Arc<LoginSurface>> {
        self.overlay.lock().clone()
    }

    /// Attach the login overlay. Returns the existing one if already attached.
    pub fn show_login_overlay(&self) -> Arc<LoginSurface> {
        let (surface, created) = {
            let mut overlay = self.overlay.lock();
            match overlay.as_ref() {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let surface = Arc::new(self.build_surface());
                    *overlay = Some(Arc::clone(&surface));
                    (surface, true)
                }
            }
        };

        if created {
            self.container.attach(&surface);
            info!(surface = %surface.id(), "Login overlay shown");
        }
        surface
    }

    /// Dispose the attached overlay. Returns whether there was one.
    pub fn hide_login_overlay(&self) -> bool {
        let surface = self.overlay.lock().take();
        match surface {
            Some(surface) => {
                self.dispose(surface);
                true
            }
            None => false,
        }
    }

    fn build_surface(&self) -> LoginSurface {
        let weak = self.this.clone();
        let mut surface = LoginSurface::new(Arc::clone(&self.store), Arc::clone(&self.backend))
            .with_dismiss(Box::new(move |id| {
                if let Some(gate) = weak.upgrade() {
                    gate.dismiss(id);
                }
            }));
        if let Some(callback) = &self.on_login {
            surface = surface.with_completion(Arc::clone(callback));
        }
        surface
    }

    /// A surface finished signing in; drop it if it is still the attached one.
    fn dismiss(&self, id: SurfaceId) {
        let surface = {
            let mut overlay = self.overlay.lock();
            if overlay.as_ref().is_some_and(|s| s.id() == id) {
                overlay.take()
            } else {
                None
            }
        };
        if let Some(surface) = surface {
            self.dispose(surface);
        }
    }

    fn dispose(&self, surface: Arc<LoginSurface>) {
        surface.dispose();
        self.container.detach(&surface);
        info!(surface = %surface.id(), "Login overlay hidden");
    }

    fn on_token_change(&self, change: &FieldChange) {
        // The notification says which field moved; the store says what is true now.
        let present = match session::has_session(self.store.as_ref()) {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Failed to read session after token change");
                false
            }
        };
        debug!(reported = change.is_present(), present, "Token field changed");

        if present {
            self.hide_login_overlay();
        } else {
            self.show_login_overlay();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, LoginResponse};
    use crate::error::StoreError;
    use crate::login::{SubmitOutcome, SurfaceState};
    use crate::session::{Credential, UserInfo};
    use crate::store::{FieldBackend, MemoryBackend, PersistentStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedBackend;

    #[async_trait]
    impl AuthBackend for FixedBackend {
        async fn login(&self, credential: &Credential) -> Result<LoginResponse, ApiError> {
            Ok(LoginResponse {
                access_token: "tok1".to_string(),
                user: UserInfo {
                    id: "42".to_string(),
                    email: credential.email.clone(),
                },
            })
        }
    }

    #[derive(Default)]
    struct CountingContainer {
        attached: AtomicUsize,
        detached: AtomicUsize,
    }

    impl CountingContainer {
        fn mounted(&self) -> usize {
            self.attached.load(Ordering::SeqCst) - self.detached.load(Ordering::SeqCst)
        }
    }

    impl OverlayContainer for CountingContainer {
        fn attach(&self, _surface: &Arc<LoginSurface>) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }

        fn detach(&self, _surface: &Arc<LoginSurface>) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Backend whose reads always fail.
    struct BrokenBackend;

    impl FieldBackend for BrokenBackend {
        fn read(&self, _field: Field) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }

        fn write(&self, _field: Field, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }

        fn delete(&self, _field: Field) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }
    }

    fn start_gate() -> (
        Arc<PersistentStore<MemoryBackend>>,
        Arc<CountingContainer>,
        Arc<AuthGate>,
    ) {
        let store = PersistentStore::shared(MemoryBackend::new());
        let container = Arc::new(CountingContainer::default());
        let gate = AuthGate::start(store.clone(), Arc::new(FixedBackend), container.clone(), None);
        (store, container, gate)
    }

    #[test]
    fn test_starts_unauthenticated_without_session() {
        let (_store, container, gate) = start_gate();
        assert_eq!(gate.state(), GateState::Unauthenticated);
        assert_eq!(container.mounted(), 1);
    }

    #[test]
    fn test_starts_authenticated_with_session() {
        let store = PersistentStore::shared(MemoryBackend::new());
        store.set(Field::Token, "abc").unwrap();
        let container = Arc::new(CountingContainer::default());
        let gate = AuthGate::start(store, Arc::new(FixedBackend), container.clone(), None);

        assert_eq!(gate.state(), GateState::Authenticated);
        assert_eq!(container.attached.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unreadable_store_fails_closed() {
        let store = PersistentStore::shared(BrokenBackend);
        let gate = AuthGate::start(store, Arc::new(FixedBackend), Arc::new(HeadlessContainer), None);
        assert!(gate.is_overlay_attached());
    }

    #[test]
    fn test_show_twice_attaches_once() {
        let (_store, container, gate) = start_gate();
        let first = gate.show_login_overlay();
        let second = gate.show_login_overlay();

        assert_eq!(first.id(), second.id());
        assert_eq!(container.attached.load(Ordering::SeqCst), 1);
        assert_eq!(container.mounted(), 1);
    }

    #[test]
    fn test_overlay_tracks_last_token_operation() {
        let (store, container, gate) = start_gate();
        // true = set, false = remove; repeats in both directions
        let ops = [true, true, false, false, true, false, true, true, false];

        for (i, set) in ops.iter().enumerate() {
            if *set {
                store.set(Field::Token, &format!("t{}", i)).unwrap();
            } else {
                store.remove(Field::Token).unwrap();
            }
            assert_eq!(gate.is_overlay_attached(), !set, "after op {}", i);
            assert!(container.mounted() <= 1);
        }
    }

    #[test]
    fn test_removal_recreates_fresh_surface() {
        let (store, _container, gate) = start_gate();
        let before = gate.overlay().unwrap();

        store.set(Field::Token, "abc").unwrap();
        assert!(before.is_disposed());
        store.remove(Field::Token).unwrap();

        let after = gate.overlay().unwrap();
        assert_ne!(before.id(), after.id());
        assert!(!after.is_disposed());
    }

    #[test]
    fn test_user_field_changes_do_not_move_gate() {
        let (store, _container, gate) = start_gate();
        store.set(Field::User, r#"{"id":"1","email":"a@x.com"}"#).unwrap();
        assert!(gate.is_overlay_attached());

        store.set(Field::Token, "abc").unwrap();
        store.remove(Field::User).unwrap();
        assert!(!gate.is_overlay_attached());
    }

    #[tokio::test]
    async fn test_successful_login_hides_overlay() {
        let (store, container, gate) = start_gate();
        let surface = gate.overlay().unwrap();

        let outcome = surface.submit(Credential::new("a@x.com", "p")).await;

        assert_eq!(outcome, SubmitOutcome::SignedIn);
        assert_eq!(surface.state(), SurfaceState::Success);
        assert_eq!(gate.state(), GateState::Authenticated);
        assert_eq!(container.mounted(), 0);
        assert_eq!(container.detached.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(Field::Token).unwrap().as_deref(), Some("tok1"));
    }

    #[test]
    fn test_dropping_gate_unsubscribes() {
        let (store, _container, gate) = start_gate();
        drop(gate);
        // Nobody left to react; must not panic
        store.remove(Field::Token).unwrap();
        store.set(Field::Token, "abc").unwrap();
    }
}
