use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-operation request context.
///
/// The `request_id` names the logical operation: it is reused across every
/// retry and renewal re-drive, and it is the id the cancellation coordinator
/// sends to the server to abort the operation. A fresh `requestGuid` is
/// stamped per HTTP attempt by the transport instead.
pub struct QueryContext {
    request_id: Uuid,
    cancel: CancellationToken,
    resume_query_id: Option<String>,
    query_id_tx: Mutex<Option<oneshot::Sender<String>>>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            resume_query_id: None,
            query_id_tx: Mutex::new(None),
        }
    }

    /// Uses a caller-supplied request id instead of a generated one.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Ties the operation to an external cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Skips submission and fetches the result of a prior query instead.
    pub fn with_resume_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.resume_query_id = Some(query_id.into());
        self
    }

    /// Publishes the server-assigned queryId on `tx` as soon as it is known.
    /// Written at most once per operation.
    pub fn with_query_id_channel(self, tx: oneshot::Sender<String>) -> Self {
        *self.query_id_tx.lock() = Some(tx);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn resume_query_id(&self) -> Option<&str> {
        self.resume_query_id.as_deref()
    }

    pub(crate) fn take_query_id_sender(&self) -> Option<oneshot::Sender<String>> {
        self.query_id_tx.lock().take()
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_id_sender_is_taken_once() {
        let (tx, _rx) = oneshot::channel();
        let ctx = QueryContext::new().with_query_id_channel(tx);

        assert!(ctx.take_query_id_sender().is_some());
        assert!(ctx.take_query_id_sender().is_none());
    }

    #[test]
    fn caller_supplied_request_id_is_kept() {
        let id = Uuid::new_v4();
        let ctx = QueryContext::new().with_request_id(id);
        assert_eq!(ctx.request_id(), id);
    }
}
