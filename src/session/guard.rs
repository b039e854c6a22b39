use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting on the remote session check
    Checking { since: Instant },
    Authenticated,
    Unauthenticated { redirected: bool },
    /// Public route; the guard never engages
    Bypassed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Checking { .. } => "checking",
            SessionState::Authenticated => "authenticated",
            SessionState::Unauthenticated { .. } => "unauthenticated",
            SessionState::Bypassed => "bypassed",
        }
    }
}

/// What the caller should do after feeding the guard an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "location", rename_all = "snake_case")]
pub enum GuardAction {
    /// Keep showing the loading state
    Wait,
    Render,
    /// Client-side redirect to login; emitted once per guard
    Redirect(String),
    /// Full page navigation to login after the check got stuck
    HardNavigate(String),
}

/// Route guard for one page visit.
///
/// `checking` resolves to `authenticated` or `unauthenticated`. Unauthenticated
/// redirects to login exactly once no matter how often the page re-renders. A
/// check still pending after the timeout forces one hard navigation.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    login_route: String,
    timeout: Duration,
    state: SessionState,
    hard_navigated: bool,
}

/// True for the login route and any configured public route or its sub-paths
pub fn is_public_route(config: &SessionConfig, route: &str) -> bool {
    let matches = |public: &str| {
        route == public
            || route
                .strip_prefix(public)
                .map_or(false, |rest| rest.starts_with('/') || rest.starts_with('?'))
    };

    matches(&config.login_route) || config.public_routes.iter().any(|p| matches(p))
}

impl SessionGuard {
    pub fn new(config: &SessionConfig, route: &str, now: Instant) -> Self {
        let state = if is_public_route(config, route) {
            SessionState::Bypassed
        } else {
            SessionState::Checking { since: now }
        };

        Self {
            login_route: config.login_route.clone(),
            timeout: config.checking_timeout(),
            state,
            hard_navigated: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Result of the remote session check
    pub fn resolve(&mut self, authenticated: bool, now: Instant) -> GuardAction {
        self.state = match (self.state, authenticated) {
            (SessionState::Bypassed, _) => SessionState::Bypassed,
            (_, true) => SessionState::Authenticated,
            // keep the flag so a repeated negative answer does not redirect again
            (SessionState::Unauthenticated { redirected }, false) => SessionState::Unauthenticated { redirected },
            (_, false) => SessionState::Unauthenticated { redirected: false },
        };
        self.poll(now)
    }

    /// Called on every render
    pub fn poll(&mut self, now: Instant) -> GuardAction {
        match self.state {
            SessionState::Bypassed | SessionState::Authenticated => GuardAction::Render,
            SessionState::Unauthenticated { redirected: false } => {
                self.state = SessionState::Unauthenticated { redirected: true };
                GuardAction::Redirect(self.login_route.clone())
            }
            SessionState::Unauthenticated { redirected: true } => GuardAction::Wait,
            SessionState::Checking { since } => {
                if !self.hard_navigated && now.saturating_duration_since(since) >= self.timeout {
                    self.hard_navigated = true;
                    tracing::warn!("Session check still pending after {:?}, forcing navigation to login", self.timeout);
                    GuardAction::HardNavigate(self.login_route.clone())
                } else {
                    GuardAction::Wait
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn config() -> SessionConfig {
        let mut config = AppConfig::for_testing().session;
        config.checking_timeout_ms = 5_000;
        config
    }

    #[test]
    fn public_routes_bypass() {
        let config = config();
        assert!(is_public_route(&config, "/login"));
        assert!(is_public_route(&config, "/login?next=/dashboard"));
        assert!(is_public_route(&config, "/pricing/pro"));
        assert!(!is_public_route(&config, "/pricingx"));
        assert!(!is_public_route(&config, "/dashboard"));

        let mut guard = SessionGuard::new(&config, "/register", Instant::now());
        assert_eq!(guard.state(), SessionState::Bypassed);
        assert_eq!(guard.resolve(false, Instant::now()), GuardAction::Render);
    }

    #[test]
    fn authenticated_renders() {
        let now = Instant::now();
        let mut guard = SessionGuard::new(&config(), "/dashboard", now);
        assert_eq!(guard.poll(now), GuardAction::Wait);
        assert_eq!(guard.resolve(true, now), GuardAction::Render);
        assert_eq!(guard.state(), SessionState::Authenticated);
    }

    #[test]
    fn unauthenticated_redirects_exactly_once() {
        let now = Instant::now();
        let mut guard = SessionGuard::new(&config(), "/dashboard", now);

        assert_eq!(guard.resolve(false, now), GuardAction::Redirect("/login".into()));
        for _ in 0..5 {
            assert_eq!(guard.poll(now), GuardAction::Wait);
        }
        assert_eq!(guard.resolve(false, now), GuardAction::Wait);
    }

    #[test]
    fn stuck_check_forces_one_hard_navigation() {
        let start = Instant::now();
        let mut guard = SessionGuard::new(&config(), "/accounting", start);

        assert_eq!(guard.poll(start + Duration::from_millis(4_999)), GuardAction::Wait);
        assert_eq!(
            guard.poll(start + Duration::from_secs(5)),
            GuardAction::HardNavigate("/login".into())
        );
        assert_eq!(guard.poll(start + Duration::from_secs(9)), GuardAction::Wait);
    }

    #[test]
    fn session_loss_after_auth_redirects() {
        let now = Instant::now();
        let mut guard = SessionGuard::new(&config(), "/dashboard", now);
        guard.resolve(true, now);
        assert_eq!(guard.resolve(false, now), GuardAction::Redirect("/login".into()));
    }

    #[test]
    fn action_serializes_with_location() {
        let json = serde_json::to_value(GuardAction::Redirect("/login".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "redirect", "location": "/login" }));
        let json = serde_json::to_value(GuardAction::Render).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "render" }));
    }
}
