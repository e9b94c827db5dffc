//! Application state for the talemo terminal host.
//!
//! The host owns no session state of its own. What it shows comes from the
//! core services: the gate decides whether the login overlay is up, the
//! accounts adapter supplies the session list and change events.

use std::collections::VecDeque;
use std::sync::Arc;

use talemo_core::{
    Credential, ExternalSession, Services, SessionChangeEvent, SubmitOutcome, Subscription,
    SurfaceId, SIGN_OUT_COMMAND,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for email input.
/// RFC 5321 caps a forward path at 254 characters.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Number of session events kept for the activity panel.
const MAX_EVENT_LOG: usize = 20;

/// Poll ticks between checks for session changes made by other processes.
/// With the 100ms poll timeout this is roughly once a second.
const EXTERNAL_REFRESH_TICKS: u32 = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

/// Text typed into the login overlay. Belongs to one surface instance and
/// is reset whenever the gate puts up a new one.
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub surface: Option<SurfaceId>,
    pub email: String,
    pub password: String,
    pub focus: LoginFocus,
}

/// Results sent back from spawned login submissions.
enum BackgroundResult {
    Submitted(SurfaceId, SubmitOutcome),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub services: Services,
    pub state: AppState,
    pub login: LoginForm,
    pub sessions: Vec<ExternalSession>,
    pub event_log: VecDeque<String>,
    pub status_message: Option<String>,

    events_rx: mpsc::UnboundedReceiver<SessionChangeEvent>,
    _events_subscription: Subscription,
    results_rx: mpsc::Receiver<BackgroundResult>,
    results_tx: mpsc::Sender<BackgroundResult>,
    ticks: u32,
}

impl App {
    pub fn new(services: Services, remembered_email: Option<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscription = services
            .accounts
            .on_did_change_sessions(Arc::new(move |event: &SessionChangeEvent| {
                // Receiver gone means we are shutting down.
                let _ = events_tx.send(event.clone());
            }));

        let (results_tx, results_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut app = Self {
            services,
            state: AppState::Normal,
            login: LoginForm {
                surface: None,
                email: remembered_email.unwrap_or_default(),
                password: String::new(),
                focus: LoginFocus::Email,
            },
            sessions: Vec::new(),
            event_log: VecDeque::new(),
            status_message: None,
            events_rx,
            _events_subscription: subscription,
            results_rx,
            results_tx,
            ticks: 0,
        };
        app.refresh_sessions();
        app.sync_login_form();
        app
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_login_visible(&self) -> bool {
        self.services.gate.is_overlay_attached()
    }

    /// Reset the form when the gate has put up a different surface.
    pub fn sync_login_form(&mut self) {
        let current = self.services.gate.overlay().map(|s| s.id());
        if current == self.login.surface {
            return;
        }

        debug!(?current, previous = ?self.login.surface, "Login surface changed");
        self.login.surface = current;
        self.login.password.clear();
        self.login.focus = if self.login.email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
    }

    /// Hand the typed credentials to the current surface without blocking
    /// the UI loop.
    pub fn attempt_login(&mut self) {
        let Some(surface) = self.services.gate.overlay() else {
            return;
        };
        if !surface.is_submit_enabled() {
            return;
        }

        let credential = Credential::new(self.login.email.clone(), self.login.password.clone());
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let outcome = surface.submit(credential).await;
            if tx
                .send(BackgroundResult::Submitted(surface.id(), outcome))
                .await
                .is_err()
            {
                debug!("Result channel closed before login finished");
            }
        });
    }

    pub fn sign_out(&mut self) {
        debug!(command = SIGN_OUT_COMMAND, "Running sign-out");
        match self.services.sign_out.run() {
            Ok(()) => self.status_message = Some("Signed out".to_string()),
            Err(e) => {
                error!(error = %e, "Sign-out failed");
                self.status_message = Some(format!("Sign-out failed: {}", e));
            }
        }
    }

    /// Remove the session through the accounts adapter rather than the store.
    pub fn remove_session(&mut self) {
        let Some(id) = self.sessions.first().map(|s| s.id.clone()) else {
            self.status_message = Some("No session to remove".to_string());
            return;
        };

        match self.services.accounts.remove_session(&id) {
            Ok(()) => self.status_message = Some(format!("Removed {}", id)),
            Err(e) => {
                error!(error = %e, session = %id, "Session removal failed");
                self.status_message = Some(format!("Removal failed: {}", e));
            }
        }
    }

    // =========================================================================
    // Background Updates
    // =========================================================================

    /// Called once per loop iteration.
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            self.process_result(result);
        }

        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % EXTERNAL_REFRESH_TICKS == 0 {
            let changed = self.services.refresh();
            if !changed.is_empty() {
                info!(?changed, "Session changed in another process");
            }
        }

        let mut saw_event = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.push_event(describe_event(&event));
            saw_event = true;
        }
        if saw_event {
            self.refresh_sessions();
        }

        self.sync_login_form();
    }

    fn process_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::Submitted(surface, SubmitOutcome::SignedIn) => {
                debug!(%surface, "Login finished");
                self.status_message = Some("Signed in".to_string());
            }
            BackgroundResult::Submitted(surface, SubmitOutcome::Failed(message)) => {
                debug!(%surface, %message, "Login failed");
            }
            BackgroundResult::Submitted(surface, outcome) => {
                debug!(%surface, ?outcome, "Login submission ended");
            }
        }
    }

    pub fn refresh_sessions(&mut self) {
        self.sessions = match self.services.accounts.list_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Failed to list sessions");
                Vec::new()
            }
        };
    }

    fn push_event(&mut self, line: String) {
        if self.event_log.len() == MAX_EVENT_LOG {
            self.event_log.pop_front();
        }
        self.event_log.push_back(line);
    }
}

/// One line for the activity panel.
pub fn describe_event(event: &SessionChangeEvent) -> String {
    match (&event.added, &event.removed) {
        (Some(added), _) => format!("+ {} ({})", added.account.label, added.id),
        (None, Some(removed)) => format!("- {} ({})", removed.account.label, removed.id),
        (None, None) => "- session ended".to_string(),
    }
}

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use talemo_core::{ExternalSession, SessionAccount};

    fn session(id: &str, label: &str) -> ExternalSession {
        ExternalSession {
            id: format!("talemo-{}", id),
            access_token: "tok".to_string(),
            account: SessionAccount {
                id: id.to_string(),
                label: label.to_string(),
            },
            scopes: vec!["talemo".to_string()],
        }
    }

    #[test]
    fn test_describe_added_event() {
        let event = SessionChangeEvent::added(session("42", "a@x.com"));
        assert_eq!(describe_event(&event), "+ a@x.com (talemo-42)");
    }

    #[test]
    fn test_describe_removed_event() {
        let event = SessionChangeEvent::removed(session("42", "a@x.com"));
        assert_eq!(describe_event(&event), "- a@x.com (talemo-42)");
    }

    #[test]
    fn test_describe_empty_event() {
        assert_eq!(
            describe_event(&SessionChangeEvent::default()),
            "- session ended"
        );
    }

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(0, '@'));
        assert!(can_add_email_char(253, 'z'));
        // Exceeds max length
        assert!(!can_add_email_char(254, 'a'));
        // Whitespace and control characters rejected
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(0, '\n'));
        assert!(!can_add_email_char(0, '\x00'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(0, ' '));
        assert!(can_add_password_char(127, '!'));
        // Exceeds max length
        assert!(!can_add_password_char(128, 'a'));
        // Control characters rejected
        assert!(!can_add_password_char(0, '\x00'));
        assert!(!can_add_password_char(0, '\r'));
    }
}
