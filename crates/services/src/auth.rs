//! Learner sign-in state as seen by the quiz.
//!
//! The hosting application owns authentication; the quiz only asks whether a
//! session exists and can subscribe to changes instead of polling.

use tokio::sync::watch;

/// A signed-in learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
}

impl AuthSession {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

pub trait AuthProvider: Send + Sync {
    /// Current session, or `None` when signed out.
    fn get_session(&self) -> Option<AuthSession>;

    /// Receiver that is notified on every sign-in or sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>>;
}

/// In-process auth state backed by a watch channel.
#[derive(Debug)]
pub struct AuthState {
    tx: watch::Sender<Option<AuthSession>>,
}

impl AuthState {
    #[must_use]
    pub fn signed_out() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    #[must_use]
    pub fn signed_in(session: AuthSession) -> Self {
        let (tx, _rx) = watch::channel(Some(session));
        Self { tx }
    }

    pub fn sign_in(&self, session: AuthSession) {
        log::info!("learner {} signed in", session.user_id);
        self.tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            log::info!("learner {} signed out", previous.user_id);
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl AuthProvider for AuthState {
    fn get_session(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }
}
