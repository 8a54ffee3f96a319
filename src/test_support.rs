//! Scripted [`HttpClient`] used across the test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use core::future::Future;

use parking_lot::Mutex;

use crate::errors::Error;
use crate::http::client::{HttpClient, HttpRequest, HttpResponse};

/// One scripted exchange.
#[derive(Debug, Clone)]
pub(crate) enum Respond {
    /// Answer with this status and body.
    Status(u16, String),
    /// Fail the attempt with a transport error.
    Error(String),
    /// Never resolve; the caller's deadline or cancellation has to fire.
    Hang,
}

pub(crate) fn json_response(status: u16, value: serde_json::Value) -> Respond {
    Respond::Status(status, value.to_string())
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Respond>,
    requests: Vec<HttpRequest>,
}

/// In-memory [`HttpClient`] answering from a fixed script while recording
/// every request it sees, in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockHttpClient {
    state: Arc<Mutex<MockState>>,
}

impl MockHttpClient {
    pub(crate) fn with_script(script: Vec<Respond>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                script: script.into(),
                requests: Vec::new(),
            })),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub(crate) fn remaining_script(&self) -> usize {
        self.state.lock().script.len()
    }
}

impl HttpClient for MockHttpClient {
    fn new() -> Self {
        Self::default()
    }

    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send {
        let state = self.state.clone();

        async move {
            let next = {
                let mut state = state.lock();
                state.requests.push(request);
                state.script.pop_front()
            };

            match next {
                Some(Respond::Status(status, body)) => Ok(HttpResponse {
                    status,
                    body: body.into_bytes(),
                }),
                Some(Respond::Error(message)) => Err(Error::Transport(message)),
                Some(Respond::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future resolved")
                }
                None => Err(Error::Transport("mock script exhausted".into())),
            }
        }
    }
}

/// A [`RestClient`](crate::connection::RestClient) over the mock transport.
pub(crate) fn rest_client(client: MockHttpClient) -> crate::connection::RestClient<MockHttpClient> {
    let opts = crate::connection::RestClientOptsBuilder::default()
        .scheme("https")
        .host("account.snowflakecomputing.com")
        .port(443)
        .build()
        .expect("failed to build opts");
    crate::connection::RestClient::with_client(opts, client)
}

/// Splits the query string of `url` into a key → value map.
pub(crate) fn query_params(url: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some((_, query)) = url.split_once('?') {
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((key, value)) => params.insert(key.to_string(), value.to_string()),
                None => params.insert(pair.to_string(), String::new()),
            };
        }
    }
    params
}

/// Path component of `url`, without scheme, authority or query.
pub(crate) fn url_path(url: &str) -> &str {
    let without_query = url.split_once('?').map(|(p, _)| p).unwrap_or(url);
    match without_query.find("://") {
        Some(idx) => {
            let after_scheme = &without_query[idx + 3..];
            match after_scheme.find('/') {
                Some(slash) => &after_scheme[slash..],
                None => "/",
            }
        }
        None => without_query,
    }
}
