use std::cell::RefCell;

use hunch::Authenticator;

/// The signed-in user's access token, as handed over by the auth provider on the JS side.
pub struct Session {
    access_token: RefCell<Option<String>>,
    redirect: Box<dyn Fn()>,
}

impl Session {
    /// `redirect` sends the user to the sign-in page.
    pub fn new(access_token: Option<String>, redirect: impl Fn() + 'static) -> Self {
        Self {
            access_token: RefCell::new(access_token),
            redirect: Box::new(redirect),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token.borrow().clone()
    }

    pub fn set_access_token(&self, access_token: Option<String>) {
        log::info!(
            "Session {}",
            if access_token.is_some() {
                "signed in"
            } else {
                "signed out"
            }
        );
        self.access_token.replace(access_token);
    }
}

impl Authenticator for Session {
    fn is_authenticated(&self) -> bool {
        self.access_token.borrow().is_some()
    }

    fn redirect_to_sign_in(&self) {
        (self.redirect)();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("signed_in", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
