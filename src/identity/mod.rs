//! Identity collaborator seam
//!
//! The rest of the crate only needs a stable owner id and whether the
//! e-mail address is verified. [`IdentityProvider`] is the boundary to
//! whatever service issues those; [`DevIdentityProvider`] keeps accounts in
//! memory for development and tests.

mod dev;
mod routes;

pub use dev::DevIdentityProvider;
pub use routes::{Gate, Route, gate};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::preferences::Locale;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

/// Session lifecycle as observers see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Initial session not known yet
    Resolving,
    SignedOut,
    SignedIn(User),
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    /// Owner id for task and request scoping
    pub fn owner_id(&self) -> Option<&str> {
        self.user().map(|u| u.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("no account for this email")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("email already registered")]
    EmailAlreadyInUse,
    #[error("password too weak")]
    WeakPassword,
    #[error("too many failed attempts")]
    TooManyAttempts,
    #[error("recent sign-in required")]
    RequiresRecentLogin,
    #[error("not signed in")]
    NotSignedIn,
    #[error("passwords do not match")]
    PasswordMismatch,
}

impl AuthError {
    /// Stable code, in the `auth/...` namespace identity services use
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::UserNotFound => "auth/user-not-found",
            AuthError::WrongPassword => "auth/wrong-password",
            AuthError::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthError::WeakPassword => "auth/weak-password",
            AuthError::TooManyAttempts => "auth/too-many-requests",
            AuthError::RequiresRecentLogin => "auth/requires-recent-login",
            AuthError::NotSignedIn => "auth/no-current-user",
            AuthError::PasswordMismatch => "auth/password-mismatch",
        }
    }

    /// What the form shows the user
    pub fn message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (AuthError::InvalidEmail, Locale::En) => "The email address is not valid.",
            (AuthError::InvalidEmail, Locale::Vi) => "Email không hợp lệ.",
            (AuthError::UserNotFound, Locale::En) => "No account was found for this email.",
            (AuthError::UserNotFound, Locale::Vi) => "Không tìm thấy tài khoản với email này.",
            (AuthError::WrongPassword, Locale::En) => "The password is incorrect.",
            (AuthError::WrongPassword, Locale::Vi) => "Mật khẩu không chính xác.",
            (AuthError::EmailAlreadyInUse, Locale::En) => "This email is already in use.",
            (AuthError::EmailAlreadyInUse, Locale::Vi) => "Email này đã được sử dụng.",
            (AuthError::WeakPassword, Locale::En) => {
                "The password must be at least 6 characters."
            }
            (AuthError::WeakPassword, Locale::Vi) => "Mật khẩu phải có ít nhất 6 ký tự.",
            (AuthError::TooManyAttempts, Locale::En) => {
                "Too many failed attempts. Please try again later."
            }
            (AuthError::TooManyAttempts, Locale::Vi) => {
                "Quá nhiều lần thử không thành công. Vui lòng thử lại sau."
            }
            (AuthError::RequiresRecentLogin, Locale::En) => {
                "Please sign in again to complete this action."
            }
            (AuthError::RequiresRecentLogin, Locale::Vi) => {
                "Vui lòng đăng nhập lại để thực hiện thao tác này."
            }
            (AuthError::NotSignedIn, Locale::En) => "Please sign in first.",
            (AuthError::NotSignedIn, Locale::Vi) => "Vui lòng đăng nhập trước.",
            (AuthError::PasswordMismatch, Locale::En) => "The passwords do not match.",
            (AuthError::PasswordMismatch, Locale::Vi) => "Mật khẩu không khớp.",
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<User>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<User>;
    async fn sign_out(&self) -> Result<()>;
    /// Start a password reset for `email`
    async fn reset_password(&self, email: &str) -> Result<()>;
    async fn resend_verification(&self) -> Result<()>;
    /// Confirm ownership of `email`, as following the e-mailed link would
    async fn verify_email(&self, email: &str) -> Result<()>;
    async fn update_display_name(&self, display_name: &str) -> Result<User>;
    async fn change_password(&self, current: &str, new: &str, confirm: &str) -> Result<()>;

    fn state(&self) -> AuthState;
    fn watch(&self) -> watch::Receiver<AuthState>;
}
