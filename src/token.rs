use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct Tokens {
    session_token: String,
    master_token: String,
    session_id: i64,
}

/// Shared holder of the session token, master token and session id.
///
/// The triple is the only shared mutable state of the protocol engine. All
/// three values are read and written together; a reader that observes a new
/// session token is guaranteed to observe the master token issued with it.
/// `session_id` is `-1` until a session has been established.
#[derive(Debug, Clone)]
pub struct TokenAccessor {
    inner: Arc<Mutex<Tokens>>,
}

impl TokenAccessor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tokens {
                session_token: String::new(),
                master_token: String::new(),
                session_id: -1,
            })),
        }
    }

    /// Returns `(session_token, master_token, session_id)`.
    pub fn get_tokens(&self) -> (String, String, i64) {
        let tokens = self.inner.lock();
        (
            tokens.session_token.clone(),
            tokens.master_token.clone(),
            tokens.session_id,
        )
    }

    /// Replaces all three values atomically.
    pub fn set_tokens(
        &self,
        session_token: impl Into<String>,
        master_token: impl Into<String>,
        session_id: i64,
    ) {
        let mut tokens = self.inner.lock();
        tokens.session_token = session_token.into();
        tokens.master_token = master_token.into();
        tokens.session_id = session_id;
    }

    /// Resets the accessor to its unauthenticated state.
    pub fn clear(&self) {
        self.set_tokens("", "", -1);
    }

    /// The current session token, or `None` before login / after close.
    pub fn session_token(&self) -> Option<String> {
        let tokens = self.inner.lock();
        if tokens.session_token.is_empty() {
            None
        } else {
            Some(tokens.session_token.clone())
        }
    }
}

impl Default for TokenAccessor {
    fn default() -> Self {
        Self::new()
    }
}
