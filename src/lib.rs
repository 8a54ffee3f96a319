pub(crate) mod chunks;
pub(crate) mod connection;
pub(crate) mod context;
pub(crate) mod errors;
pub(crate) mod http;
pub(crate) mod protocol;
pub(crate) mod rows;
pub(crate) mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunks::{ChunkDownloader, ChunkMetadata};
pub use connection::{RestClient, RestClientOpts, RestClientOptsBuilder};
pub use context::QueryContext;
pub use errors::{Error, SQLSTATE_CONNECTION_FAILURE};
pub use http::client::{HttpClient, HttpRequest, HttpResponse, Method};
pub use rows::{FetchedResult, QueryStatus, RowHandle};
pub use token::TokenAccessor;

pub use protocol::response::{
    ExecResponse, ExecResponseData, GenericResponse, RenewSessionData, RowType,
};
pub use protocol::{
    ABORT_REQUEST_PATH, AUTHENTICATOR_REQUEST_PATH, HEARTBEAT_PATH, LOGIN_REQUEST_PATH,
    QUERY_IN_PROGRESS_ASYNC_CODE, QUERY_IN_PROGRESS_CODE, QUERY_REQUEST_PATH,
    SESSION_EXPIRED_CODE, SESSION_REQUEST_PATH, TOKEN_REQUEST_PATH, default_headers,
};

#[cfg(feature = "reqwest")]
pub type ReqwestRestClient = RestClient<reqwest::Client>;
