//! Page context classification.
//!
//! Pure function of hostname + path; runs once per supervisor tick and
//! decides which automation routine owns the page.

/// The business application whose session cookie is harvested
pub const TARGET_HOST: &str = "labs.google";

/// The identity provider the sign-in flow runs on
pub const IDENTITY_HOST: &str = "accounts.google.com";

/// Path marker of the interstitial signin page on the target domain
const SIGNIN_MARKER: &str = "/fx/api/auth/signin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageContext {
    /// Regular application page; harvest + sync + keep-alive
    TargetBusinessPage,
    /// Consent/redirect page between the application and the identity provider
    TargetInterstitialSignin,
    /// Identity provider, account list showing
    IdentityAccountChooser,
    /// Identity provider, password challenge showing
    IdentityPasswordPrompt,
    /// Identity provider, any other step
    IdentityOther,
}

impl PageContext {
    /// All identity-provider variants run the same polling state machine;
    /// the per-tick DOM probes are the authority on the actual sub-state.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            PageContext::IdentityAccountChooser
                | PageContext::IdentityPasswordPrompt
                | PageContext::IdentityOther
        )
    }
}

/// Classify a location. First match wins. `None` means the page belongs
/// to neither domain and no automation applies.
pub fn classify(host: &str, path: &str) -> Option<PageContext> {
    if host == TARGET_HOST && path.contains(SIGNIN_MARKER) {
        return Some(PageContext::TargetInterstitialSignin);
    }
    if host == TARGET_HOST {
        return Some(PageContext::TargetBusinessPage);
    }
    if host == IDENTITY_HOST {
        if path.contains("accountchooser") {
            return Some(PageContext::IdentityAccountChooser);
        }
        if path.contains("/challenge/pwd") || path.contains("/signin/challenge") {
            return Some(PageContext::IdentityPasswordPrompt);
        }
        return Some(PageContext::IdentityOther);
    }
    None
}
