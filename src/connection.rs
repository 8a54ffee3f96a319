use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;
use uuid::Uuid;

use crate::http::client::HttpClient;
use crate::http::retry::RetryTransport;
use crate::http::url;
use crate::protocol::REQUEST_ID_KEY;
use crate::token::TokenAccessor;

/// Immutable per-session connection descriptor.
#[derive(Builder, Debug, Clone)]
pub struct RestClientOpts {
    #[builder(setter(into), default = String::from("https"))]
    pub(crate) scheme: String,

    #[builder(setter(into))]
    pub(crate) host: String,

    #[builder(default = 443)]
    pub(crate) port: u16,

    /// Budget for login-phase calls; consumed by the authentication
    /// collaborator, carried here so the descriptor is complete.
    #[builder(default = Duration::from_secs(60))]
    pub(crate) login_timeout: Duration,

    /// Default budget for query-phase calls when the caller does not pick one.
    #[builder(default = Duration::from_secs(300))]
    pub(crate) request_timeout: Duration,
}

impl RestClientOpts {
    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Handle to one Snowflake REST session: the endpoint descriptor, the shared
/// HTTP client behind the retrying transport, and the token accessor.
///
/// Cloning is cheap and every clone shares the same tokens and client, so a
/// renewal performed by one task is observed by all of them.
#[derive(Debug, Clone)]
pub struct RestClient<C: HttpClient> {
    opts: Arc<RestClientOpts>,
    transport: RetryTransport<C>,
    tokens: TokenAccessor,
}

impl<C: HttpClient> RestClient<C> {
    pub fn new(opts: RestClientOpts) -> Self {
        Self::with_client(opts, C::new())
    }

    pub fn with_client(opts: RestClientOpts, client: C) -> Self {
        Self {
            opts: Arc::new(opts),
            transport: RetryTransport::new(client),
            tokens: TokenAccessor::new(),
        }
    }

    pub fn opts(&self) -> &RestClientOpts {
        &self.opts
    }

    pub fn tokens(&self) -> &TokenAccessor {
        &self.tokens
    }

    /// The underlying HTTP client handle, shared with collaborators such as
    /// the chunk downloader.
    pub fn http_client(&self) -> &C {
        self.transport.client()
    }

    pub(crate) fn transport(&self) -> &RetryTransport<C> {
        &self.transport
    }

    /// Absolute URL for `path` with `params` appended. `path` may be a
    /// server-returned relative result URL, taken verbatim.
    pub(crate) fn full_url(&self, path: &str, params: &[(String, String)]) -> String {
        let base = format!(
            "{}://{}:{}{}",
            self.opts.scheme, self.opts.host, self.opts.port, path
        );
        url::construct_url(&base, params)
    }

    /// URL of the result endpoint for a previously submitted query.
    pub(crate) fn query_result_url(&self, query_id: &str, request_id: Uuid) -> String {
        self.full_url(
            &format!("/queries/{query_id}/result"),
            &[(REQUEST_ID_KEY.to_string(), request_id.to_string())],
        )
    }
}
