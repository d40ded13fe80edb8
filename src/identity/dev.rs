use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AuthError, AuthState, IdentityProvider, Result, User};
use crate::requests::is_email;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_FAILED_ATTEMPTS: u32 = 5;
const DEFAULT_RECENT_LOGIN: Duration = Duration::from_secs(5 * 60);

struct Account {
    user: User,
    password: String,
    failed_attempts: u32,
}

#[derive(Default)]
struct Inner {
    // keyed by lowercase email
    accounts: HashMap<String, Account>,
    signed_in: Option<(String, Instant)>,
}

/// In-memory identity provider.
///
/// Starts in [`AuthState::Resolving`] until [`resolve`](Self::resolve) or the
/// first sign-in. Accounts lock after five consecutive wrong passwords.
pub struct DevIdentityProvider {
    inner: Mutex<Inner>,
    state: watch::Sender<AuthState>,
    recent_login: Duration,
}

impl Default for DevIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DevIdentityProvider {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            state: watch::channel(AuthState::Resolving).0,
            recent_login: DEFAULT_RECENT_LOGIN,
        }
    }

    /// How long after sign-in sensitive changes are allowed
    pub fn with_recent_login(mut self, window: Duration) -> Self {
        self.recent_login = window;
        self
    }

    /// Finish restoring the initial session: nobody is signed in
    pub fn resolve(&self) {
        self.state.send_if_modified(|state| {
            if *state == AuthState::Resolving {
                *state = AuthState::SignedOut;
                true
            } else {
                false
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_account<'a>(inner: &'a mut Inner) -> Result<&'a mut Account> {
        let (email, _) = inner.signed_in.as_ref().ok_or(AuthError::NotSignedIn)?;
        let email = email.clone();
        inner.accounts.get_mut(&email).ok_or(AuthError::NotSignedIn)
    }

    fn publish(&self, state: AuthState) {
        self.state.send_replace(state);
    }
}

fn normalize(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if is_email(&email) {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

fn check_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for DevIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<User> {
        let email = normalize(email)?;
        check_strength(password)?;

        let user = {
            let mut inner = self.lock();
            if inner.accounts.contains_key(&email) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let user = User {
                id: Uuid::now_v7().simple().to_string(),
                email: email.clone(),
                display_name: display_name.map(str::to_string),
                email_verified: false,
            };
            inner.accounts.insert(
                email.clone(),
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                    failed_attempts: 0,
                },
            );
            inner.signed_in = Some((email, Instant::now()));
            user
        };

        info!(user_id = %user.id, "Account created");
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize(email)?;

        let user = {
            let mut inner = self.lock();
            let account = inner.accounts.get_mut(&email).ok_or(AuthError::UserNotFound)?;
            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                return Err(AuthError::TooManyAttempts);
            }
            if account.password != password {
                account.failed_attempts += 1;
                warn!(user_id = %account.user.id, attempts = account.failed_attempts, "Wrong password");
                return Err(AuthError::WrongPassword);
            }
            account.failed_attempts = 0;
            let user = account.user.clone();
            inner.signed_in = Some((email, Instant::now()));
            user
        };

        info!(user_id = %user.id, "Signed in");
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.lock().signed_in = None;
        self.publish(AuthState::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        let email = normalize(email)?;
        if !self.lock().accounts.contains_key(&email) {
            return Err(AuthError::UserNotFound);
        }
        info!("Password reset requested");
        Ok(())
    }

    async fn resend_verification(&self) -> Result<()> {
        let mut inner = self.lock();
        let account = Self::current_account(&mut inner)?;
        info!(user_id = %account.user.id, "Verification e-mail sent");
        Ok(())
    }

    async fn verify_email(&self, email: &str) -> Result<()> {
        let email = normalize(email)?;
        let updated = {
            let mut inner = self.lock();
            let account = inner.accounts.get_mut(&email).ok_or(AuthError::UserNotFound)?;
            account.user.email_verified = true;
            let user = account.user.clone();
            let current = inner.signed_in.as_ref().is_some_and(|(e, _)| *e == email);
            current.then_some(user)
        };

        if let Some(user) = updated {
            self.publish(AuthState::SignedIn(user));
        }
        Ok(())
    }

    async fn update_display_name(&self, display_name: &str) -> Result<User> {
        let user = {
            let mut inner = self.lock();
            let account = Self::current_account(&mut inner)?;
            account.user.display_name = Some(display_name.trim().to_string());
            account.user.clone()
        };
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }

    async fn change_password(&self, current: &str, new: &str, confirm: &str) -> Result<()> {
        if new != confirm {
            return Err(AuthError::PasswordMismatch);
        }
        check_strength(new)?;

        let mut inner = self.lock();
        let signed_in_at = inner
            .signed_in
            .as_ref()
            .map(|(_, at)| *at)
            .ok_or(AuthError::NotSignedIn)?;
        if signed_in_at.elapsed() > self.recent_login {
            return Err(AuthError::RequiresRecentLogin);
        }

        let account = Self::current_account(&mut inner)?;
        if account.password != current {
            return Err(AuthError::WrongPassword);
        }
        account.password = new.to_string();
        info!(user_id = %account.user.id, "Password changed");
        Ok(())
    }

    fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_events() {
        let provider = DevIdentityProvider::new();
        let mut rx = provider.watch();
        assert_eq!(provider.state(), AuthState::Resolving);

        provider.resolve();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::SignedOut);

        let user = provider.sign_up("Me@Example.com", "secret1", Some("Me")).await.unwrap();
        assert_eq!(user.email, "me@example.com");
        assert!(!user.email_verified);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().owner_id(), Some(user.id.as_str()));

        provider.verify_email("me@example.com").await.unwrap();
        assert!(provider.state().user().unwrap().email_verified);

        provider.sign_out().await.unwrap();
        assert_eq!(provider.state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_up_errors() {
        let provider = DevIdentityProvider::new();
        assert_eq!(
            provider.sign_up("nope", "secret1", None).await,
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            provider.sign_up("a@b.co", "12345", None).await,
            Err(AuthError::WeakPassword)
        );
        provider.sign_up("a@b.co", "123456", None).await.unwrap();
        assert_eq!(
            provider.sign_up("A@B.co", "123456", None).await,
            Err(AuthError::EmailAlreadyInUse)
        );
    }

    #[tokio::test]
    async fn test_lockout_after_failures() {
        let provider = DevIdentityProvider::new();
        provider.sign_up("a@b.co", "correct", None).await.unwrap();
        provider.sign_out().await.unwrap();

        assert_eq!(
            provider.sign_in("x@b.co", "correct").await,
            Err(AuthError::UserNotFound)
        );
        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert_eq!(
                provider.sign_in("a@b.co", "wrong").await,
                Err(AuthError::WrongPassword)
            );
        }
        assert_eq!(
            provider.sign_in("a@b.co", "correct").await,
            Err(AuthError::TooManyAttempts)
        );
    }

    #[tokio::test]
    async fn test_change_password() {
        let provider = DevIdentityProvider::new();
        assert_eq!(
            provider.change_password("a", "newpass", "newpass").await,
            Err(AuthError::NotSignedIn)
        );

        provider.sign_up("a@b.co", "oldpass", None).await.unwrap();
        assert_eq!(
            provider.change_password("oldpass", "newpass", "other").await,
            Err(AuthError::PasswordMismatch)
        );
        assert_eq!(
            provider.change_password("bad", "newpass", "newpass").await,
            Err(AuthError::WrongPassword)
        );
        provider.change_password("oldpass", "newpass", "newpass").await.unwrap();

        provider.sign_out().await.unwrap();
        provider.sign_in("a@b.co", "newpass").await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_session_requires_relogin() {
        let provider = DevIdentityProvider::new().with_recent_login(Duration::ZERO);
        provider.sign_up("a@b.co", "oldpass", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            provider.change_password("oldpass", "newpass", "newpass").await,
            Err(AuthError::RequiresRecentLogin)
        );
    }

    #[tokio::test]
    async fn test_profile_updates() {
        let provider = DevIdentityProvider::new();
        assert_eq!(provider.resend_verification().await, Err(AuthError::NotSignedIn));
        provider.sign_up("a@b.co", "secret1", None).await.unwrap();
        provider.resend_verification().await.unwrap();

        let user = provider.update_display_name(" Ana ").await.unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Ana"));
        assert_eq!(provider.reset_password("z@b.co").await, Err(AuthError::UserNotFound));
        provider.reset_password("a@b.co").await.unwrap();
    }
}
