//! Storage keys shared by every client instance.

/// Bearer token, persistent scope.
pub const AUTH_TOKEN: &str = "auth.token";
/// Refresh token, persistent scope.
pub const REFRESH_TOKEN: &str = "auth.refresh_token";
/// Logged-in user id, persistent scope.
pub const USER_ID: &str = "auth.user_id";
/// Per-tab session id, tab scope.
pub const SESSION_ID: &str = "session.id";

/// Keys cleared from the persistent scope on logout.
pub const AUTH_KEYS: [&str; 3] = [AUTH_TOKEN, REFRESH_TOKEN, USER_ID];
