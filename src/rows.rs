use std::fmt;

use tokio::sync::oneshot;

use crate::chunks::ChunkDownloader;
use crate::errors::Error;
use crate::http::client::HttpClient;
use crate::protocol::response::RowType;

/// Lifecycle of an asynchronously fetched query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    InProgress,
    Complete,
    Failed,
}

/// Everything the async result fetcher assembles before signalling
/// completion: the server query id, the row schema, and the started chunk
/// downloader.
pub struct FetchedResult<C: HttpClient> {
    pub query_id: String,
    pub row_types: Vec<RowType>,
    pub downloader: ChunkDownloader<C>,
}

/// Terminal message sent exactly once per async fetch. Completion carries the
/// whole result, so observing `Complete` implies a fully initialised handle.
pub(crate) enum FetchOutcome<C: HttpClient> {
    Complete(Box<FetchedResult<C>>),
    Failed(Error),
}

/// Placeholder returned to the caller while an async fetch runs.
///
/// Created with status [`QueryStatus::InProgress`]; [`wait`](Self::wait)
/// resolves the single-shot status channel, after which the query id, row
/// schema and downloader are available (or the failure via
/// [`take_error`](Self::take_error)).
pub struct RowHandle<C: HttpClient> {
    status: QueryStatus,
    rx: Option<oneshot::Receiver<FetchOutcome<C>>>,
    result: Option<FetchedResult<C>>,
    error: Option<Error>,
}

impl<C: HttpClient> RowHandle<C> {
    pub(crate) fn in_progress() -> (Self, oneshot::Sender<FetchOutcome<C>>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            status: QueryStatus::InProgress,
            rx: Some(rx),
            result: None,
            error: None,
        };
        (handle, tx)
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Waits for the async fetch to finish and returns the terminal status.
    /// Subsequent calls return the settled status immediately.
    pub async fn wait(&mut self) -> QueryStatus {
        if let Some(rx) = self.rx.take() {
            match rx.await {
                Ok(FetchOutcome::Complete(result)) => {
                    self.result = Some(*result);
                    self.status = QueryStatus::Complete;
                }
                Ok(FetchOutcome::Failed(err)) => {
                    self.error = Some(err);
                    self.status = QueryStatus::Failed;
                }
                Err(_) => {
                    self.error = Some(Error::Transport(
                        "result fetch task exited without reporting a status".into(),
                    ));
                    self.status = QueryStatus::Failed;
                }
            }
        }
        self.status
    }

    pub fn query_id(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.query_id.as_str())
    }

    pub fn row_types(&self) -> Option<&[RowType]> {
        self.result.as_ref().map(|r| r.row_types.as_slice())
    }

    pub fn downloader(&self) -> Option<&ChunkDownloader<C>> {
        self.result.as_ref().map(|r| &r.downloader)
    }

    /// The fetch failure, if the handle settled as [`QueryStatus::Failed`].
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Consumes the handle, yielding the fetched result if it completed.
    pub fn into_result(self) -> Option<FetchedResult<C>> {
        self.result
    }
}

impl<C: HttpClient> fmt::Debug for RowHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowHandle")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
