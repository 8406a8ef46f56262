//! Route guard decision for protected content.

use crate::user::User;

/// What a guard should do with a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the protected content.
    Render,
    /// Block on a loading state.
    Loading,
    /// Redirect to the login route.
    RedirectToLogin,
}

/// Decide whether protected content may render.
///
/// Protected content is never rendered before startup validation has
/// finished, no matter what the other inputs say.
pub fn evaluate_guard(
    initialized: bool,
    authenticated: bool,
    user: Option<&User>,
) -> GuardDecision {
    if !initialized {
        return GuardDecision::Loading;
    }
    if !authenticated {
        return GuardDecision::RedirectToLogin;
    }
    if user.is_none() {
        // Authenticated but the snapshot has not materialized yet
        return GuardDecision::Loading;
    }
    GuardDecision::Render
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{normalize, RawUser};

    fn some_user() -> User {
        let raw: RawUser = serde_json::from_str(r#"{"id": "u-1"}"#).unwrap();
        normalize(raw)
    }

    #[test]
    fn test_never_renders_before_initialized() {
        let user = some_user();
        // Even a fully authenticated session with a user must wait
        assert_eq!(
            evaluate_guard(false, true, Some(&user)),
            GuardDecision::Loading
        );
        assert_eq!(evaluate_guard(false, false, None), GuardDecision::Loading);
    }

    #[test]
    fn test_unauthenticated_redirects() {
        assert_eq!(
            evaluate_guard(true, false, None),
            GuardDecision::RedirectToLogin
        );
        let user = some_user();
        assert_eq!(
            evaluate_guard(true, false, Some(&user)),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_authenticated_without_user_loads() {
        assert_eq!(evaluate_guard(true, true, None), GuardDecision::Loading);
    }

    #[test]
    fn test_authenticated_with_user_renders() {
        let user = some_user();
        assert_eq!(
            evaluate_guard(true, true, Some(&user)),
            GuardDecision::Render
        );
    }
}
