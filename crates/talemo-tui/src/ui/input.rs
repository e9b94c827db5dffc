//! Keyboard input handling for the TUI.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{can_add_email_char, can_add_password_char, App, AppState, LoginFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    if app.state == AppState::ConfirmingQuit {
        return handle_quit_confirmation(app, key);
    }

    // The overlay is modal while the gate has one attached.
    if app.is_login_visible() {
        return handle_login_input(app, key);
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('o') => app.sign_out(),
        KeyCode::Char('x') => app.remove_session(),
        KeyCode::Char('r') => {
            app.services.refresh();
            app.refresh_sessions();
            app.status_message = Some("Refreshed".to_string());
        }
        _ => {}
    }
    false
}

fn handle_quit_confirmation(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.state = AppState::Quitting;
            true
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.state = AppState::Normal;
            false
        }
        _ => false,
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    let form = &mut app.login;
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => {
            form.focus = match form.focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Email,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            form.focus = match form.focus {
                LoginFocus::Email => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match form.focus {
            LoginFocus::Email => form.focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                form.focus = LoginFocus::Button;
                app.attempt_login();
            }
        },
        KeyCode::Backspace => match form.focus {
            LoginFocus::Email => {
                form.email.pop();
            }
            LoginFocus::Password => {
                form.password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match form.focus {
            LoginFocus::Email => {
                if can_add_email_char(form.email.chars().count(), c) {
                    form.email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(form.password.chars().count(), c) {
                    form.password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::sync::Arc;
    use std::time::Duration;
    use talemo_core::{
        bootstrap, ApiClient, Config, Field, HeadlessContainer, SessionStore, StoreKind,
    };

    fn app() -> App {
        let config = Config {
            store: StoreKind::Memory,
            ..Config::default()
        };
        let client =
            ApiClient::new("http://127.0.0.1:9", "talemo-test", Duration::from_secs(1)).unwrap();
        let services = bootstrap(&config, Arc::new(client), Arc::new(HeadlessContainer));
        App::new(services, None)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn sign_in(app: &App) {
        app.services.store.set(Field::Token, "tok1").unwrap();
        app.services
            .store
            .set(Field::User, r#"{"id":"42","email":"a@x.com"}"#)
            .unwrap();
    }

    #[test]
    fn test_typing_goes_to_focused_field() {
        let mut app = app();
        assert!(app.is_login_visible());
        assert_eq!(app.login.focus, LoginFocus::Email);

        for c in "a@x.com".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Tab);
        for c in "pw".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);

        assert_eq!(app.login.email, "a@x.com");
        assert_eq!(app.login.password, "p");
        assert_eq!(app.login.focus, LoginFocus::Password);
    }

    #[test]
    fn test_focus_cycles_both_ways() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.login.focus, LoginFocus::Button);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.login.focus, LoginFocus::Email);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.login.focus, LoginFocus::Button);
    }

    #[test]
    fn test_escape_on_login_quits() {
        let mut app = app();
        assert!(press(&mut app, KeyCode::Esc));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn test_sign_out_key_brings_overlay_back() {
        let mut app = app();
        sign_in(&app);
        app.check_background_tasks();
        assert!(!app.is_login_visible());
        assert_eq!(app.sessions.len(), 1);

        press(&mut app, KeyCode::Char('o'));
        app.check_background_tasks();

        assert!(app.is_login_visible());
        assert!(app.sessions.is_empty());
        assert_eq!(app.login.focus, LoginFocus::Email);
    }

    #[test]
    fn test_remove_session_key_goes_through_adapter() {
        let mut app = app();
        sign_in(&app);
        app.check_background_tasks();
        app.event_log.clear();

        press(&mut app, KeyCode::Char('x'));
        app.check_background_tasks();

        assert!(app.is_login_visible());
        assert_eq!(app.status_message.as_deref(), Some("Removed talemo-42"));
        assert_eq!(
            app.event_log.iter().cloned().collect::<Vec<_>>(),
            vec!["- a@x.com (talemo-42)".to_string()]
        );
    }

    #[test]
    fn test_quit_needs_confirmation() {
        let mut app = app();
        sign_in(&app);

        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!press(&mut app, KeyCode::Char('n')));
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Char('q'));
        assert!(press(&mut app, KeyCode::Char('y')));
        assert_eq!(app.state, AppState::Quitting);
    }
}
