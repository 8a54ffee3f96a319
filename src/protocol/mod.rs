use std::collections::HashMap;
use std::time::Duration;

pub(crate) mod async_fetch;
pub mod cancel;
pub mod query;
pub mod response;
pub mod session;

/// Server code instructing the client to renew the session token and retry.
pub const SESSION_EXPIRED_CODE: &str = "390112";

/// Server code for a synchronous query still executing; keep polling the
/// supplied result URL.
pub const QUERY_IN_PROGRESS_CODE: &str = "333333";

/// Server code for an asynchronously executing query; fetch the result in the
/// background and return a placeholder to the caller.
pub const QUERY_IN_PROGRESS_ASYNC_CODE: &str = "333334";

// Server endpoints. Login, authenticator and heartbeat are driven by outside
// collaborators; their paths live here with the rest.
pub const LOGIN_REQUEST_PATH: &str = "/session/v1/login-request";
pub const AUTHENTICATOR_REQUEST_PATH: &str = "/session/authenticator-request";
pub const TOKEN_REQUEST_PATH: &str = "/session/token-request";
pub const SESSION_REQUEST_PATH: &str = "/session";
pub const QUERY_REQUEST_PATH: &str = "/queries/v1/query-request";
pub const ABORT_REQUEST_PATH: &str = "/queries/v1/abort-request";
pub const HEARTBEAT_PATH: &str = "/session/heartbeat";

pub(crate) const REQUEST_ID_KEY: &str = "requestId";
pub(crate) const REQUEST_GUID_KEY: &str = "requestGuid";
pub(crate) const CLIENT_START_TIME_KEY: &str = "clientStartTime";

pub(crate) const AUTHORIZATION_HEADER: &str = "Authorization";

/// Session close ignores the caller's budget and uses this instead.
pub(crate) const CLOSE_SESSION_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn user_agent() -> String {
    format!("snowflake-rest/{}", env!("CARGO_PKG_VERSION"))
}

/// Headers every protocol request starts from.
pub fn default_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("accept".to_string(), "application/snowflake".to_string());
    headers.insert("User-Agent".to_string(), user_agent());
    headers
}

pub(crate) fn token_auth_header(token: &str) -> String {
    format!("Snowflake Token=\"{token}\"")
}
