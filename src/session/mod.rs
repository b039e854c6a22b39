pub mod guard;

pub use guard::{is_public_route, GuardAction, SessionGuard, SessionState};
