use std::collections::HashMap;
use std::time::Duration;

use core::future::Future;

use crate::errors::Error;

#[cfg(feature = "reqwest")]
use reqwest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single HTTP attempt, fully assembled. The retrying transport owns
/// retries, deadlines and cancellation; implementations only have to perform
/// one exchange within `timeout`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// The injected HTTP client every component is generic over. Implement this
/// to substitute the transport in tests or to bring your own client.
pub trait HttpClient: Clone + Send + Sync + 'static {
    fn new() -> Self;

    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send;
}

#[cfg(feature = "reqwest")]
impl HttpClient for reqwest::Client {
    fn new() -> Self {
        reqwest::Client::builder()
            .gzip(true)
            .referer(false)
            .build()
            .unwrap()
    }

    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, Error>> + Send {
        let client = self.clone();

        async move {
            use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

            let mut headers = HeaderMap::with_capacity(request.headers.len());
            for (key, value) in &request.headers {
                let name = HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| Error::Transport(format!("invalid header name {key:?}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| Error::Transport(format!("invalid value for header {key}: {e}")))?;
                headers.insert(name, value);
            }

            let mut builder = match request.method {
                Method::Get => client.get(&request.url),
                Method::Post => client.post(&request.url),
            };
            builder = builder.headers(headers).timeout(request.timeout);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;

            Ok(HttpResponse {
                status,
                body: body.to_vec(),
            })
        }
    }
}
