use super::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Features,
    Pricing,
    Contact,
    Login,
    Signup,
    ForgotPassword,
    Dashboard,
    Scraper,
    CustomRequest,
    Profile,
}

/// Outcome of checking a route against the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Render,
    Loading,
    Redirect(&'static str),
}

pub const LOGIN_PATH: &str = "/login";
pub const VERIFY_EMAIL_PATH: &str = "/verify-email";

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Features => "/features",
            Route::Pricing => "/pricing",
            Route::Contact => "/contact",
            Route::Login => LOGIN_PATH,
            Route::Signup => "/signup",
            Route::ForgotPassword => "/forgot-password",
            Route::Dashboard => "/dashboard",
            Route::Scraper => "/scraper",
            Route::CustomRequest => "/custom-request",
            Route::Profile => "/profile",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        const ALL: [Route; 11] = [
            Route::Home,
            Route::Features,
            Route::Pricing,
            Route::Contact,
            Route::Login,
            Route::Signup,
            Route::ForgotPassword,
            Route::Dashboard,
            Route::Scraper,
            Route::CustomRequest,
            Route::Profile,
        ];
        ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            Route::Dashboard | Route::Scraper | Route::CustomRequest | Route::Profile
        )
    }
}

pub fn gate(route: Route, state: &AuthState) -> Gate {
    if !route.is_gated() {
        return Gate::Render;
    }
    match state {
        AuthState::Resolving => Gate::Loading,
        AuthState::SignedOut => Gate::Redirect(LOGIN_PATH),
        AuthState::SignedIn(user) if !user.email_verified => Gate::Redirect(VERIFY_EMAIL_PATH),
        AuthState::SignedIn(_) => Gate::Render,
    }
}
