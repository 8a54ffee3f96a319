use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::Error;
use crate::http::client::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::http::url;

/// First backoff delay.
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Backoff ceiling.
const BACKOFF_CAP: Duration = Duration::from_secs(16);

const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Executes one logical request as a bounded series of HTTP attempts.
///
/// Transport errors and 5XX responses are retried; 4XX responses are retried
/// unless `raise_on_4xx` is set. The whole series shares one absolute
/// deadline and fails with a timeout error once it expires, wherever in the
/// attempt/backoff cycle that happens. A fresh `requestGuid` is stamped into
/// the URL before every attempt. Bodies are never inspected and tokens never
/// touched here.
#[derive(Debug, Clone)]
pub(crate) struct RetryTransport<C> {
    client: C,
}

impl<C: HttpClient> RetryTransport<C> {
    pub(crate) fn new(client: C) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
        deadline: Instant,
        raise_on_4xx: bool,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, Error> {
        let mut backoff = BACKOFF_BASE;
        let mut attempt = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }

            attempt += 1;
            let guid = uuid::Uuid::new_v4().to_string();
            let request = HttpRequest {
                method,
                url: url::replace_request_guid(url, &guid),
                headers: headers.clone(),
                body: body.map(|b| b.to_vec()),
                timeout: deadline - now,
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = tokio::time::timeout_at(deadline, self.client.execute(request)) => outcome,
            };

            match outcome {
                Err(_elapsed) => return Err(Error::Timeout),
                Ok(Ok(resp)) if resp.status < 400 => return Ok(resp),
                Ok(Ok(resp)) if resp.status < 500 && raise_on_4xx => return Ok(resp),
                Ok(Ok(resp)) => {
                    tracing::debug!(status = resp.status, attempt, "retrying request");
                }
                Ok(Err(err @ (Error::Timeout | Error::Cancelled))) => return Err(err),
                Ok(Err(err)) => {
                    tracing::debug!(error = %err, attempt, "retrying request after transport error");
                }
            }

            let jitter = rand::thread_rng().gen_range(0.5..1.5);
            let delay = backoff.mul_f64(jitter);
            backoff = Duration::from_millis(
                ((backoff.as_millis() as f64) * BACKOFF_MULTIPLIER) as u64,
            )
            .min(BACKOFF_CAP);

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Err(Error::Timeout),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockHttpClient, Respond};

    fn transport(script: Vec<Respond>) -> (RetryTransport<MockHttpClient>, MockHttpClient) {
        let client = MockHttpClient::with_script(script);
        (RetryTransport::new(client.clone()), client)
    }

    fn deadline_in(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let (transport, client) = transport(vec![Respond::Status(200, "ok".into())]);

        let resp = transport
            .execute(
                Method::Get,
                "https://x.test/q?requestId=r1",
                &HashMap::new(),
                None,
                deadline_in(30),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect("request failed");

        assert_eq!(resp.status, 200);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_5xx_then_succeeds() {
        let (transport, client) = transport(vec![
            Respond::Status(503, "unavailable".into()),
            Respond::Status(503, "unavailable".into()),
            Respond::Status(200, "ok".into()),
        ]);

        let resp = transport
            .execute(
                Method::Post,
                "https://x.test/q?requestId=r1",
                &HashMap::new(),
                Some(b"{}".as_slice()),
                deadline_in(120),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect("request failed");

        assert_eq!(resp.status, 200);
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_errors() {
        let (transport, client) = transport(vec![
            Respond::Error("connection reset".into()),
            Respond::Status(200, "ok".into()),
        ]);

        let resp = transport
            .execute(
                Method::Get,
                "https://x.test/q",
                &HashMap::new(),
                None,
                deadline_in(120),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect("request failed");

        assert_eq!(resp.status, 200);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn raise_on_4xx_returns_response_without_retry() {
        let (transport, client) = transport(vec![Respond::Status(403, "forbidden".into())]);

        let resp = transport
            .execute(
                Method::Get,
                "https://x.test/q",
                &HashMap::new(),
                None,
                deadline_in(120),
                true,
                &CancellationToken::new(),
            )
            .await
            .expect("request failed");

        assert_eq!(resp.status, 403);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_4xx_when_not_raised() {
        let (transport, client) = transport(vec![
            Respond::Status(403, "forbidden".into()),
            Respond::Status(200, "ok".into()),
        ]);

        let resp = transport
            .execute(
                Method::Get,
                "https://x.test/q",
                &HashMap::new(),
                None,
                deadline_in(120),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect("request failed");

        assert_eq!(resp.status, 200);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_backoff_times_out() {
        // The deadline fits the first attempt but not the jittered backoff
        // that follows, so the series fails with a timeout.
        let (transport, client) = transport(vec![Respond::Status(503, "unavailable".into())]);

        let err = transport
            .execute(
                Method::Get,
                "https://x.test/q",
                &HashMap::new(),
                None,
                Instant::now() + Duration::from_millis(100),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect_err("expected a timeout");

        assert!(matches!(err, Error::Timeout));
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempt_times_out() {
        let (transport, _client) = transport(vec![Respond::Hang]);

        let err = transport
            .execute(
                Method::Get,
                "https://x.test/q",
                &HashMap::new(),
                None,
                Instant::now() + Duration::from_secs(5),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect_err("expected a timeout");

        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_pending_attempt() {
        let (transport, _client) = transport(vec![Respond::Hang]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport
            .execute(
                Method::Get,
                "https://x.test/q",
                &HashMap::new(),
                None,
                deadline_in(120),
                false,
                &cancel,
            )
            .await
            .expect_err("expected cancellation");

        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn request_guid_changes_per_attempt() {
        let (transport, client) = transport(vec![
            Respond::Status(503, "unavailable".into()),
            Respond::Status(200, "ok".into()),
        ]);

        transport
            .execute(
                Method::Get,
                "https://x.test/q?requestId=r1",
                &HashMap::new(),
                None,
                deadline_in(120),
                false,
                &CancellationToken::new(),
            )
            .await
            .expect("request failed");

        let guids: Vec<String> = client
            .requests()
            .iter()
            .map(|r| {
                crate::test_support::query_params(&r.url)
                    .remove("requestGuid")
                    .expect("missing requestGuid")
            })
            .collect();

        assert_eq!(guids.len(), 2);
        assert_ne!(guids[0], guids[1]);
        for guid in &guids {
            uuid::Uuid::parse_str(guid).expect("requestGuid is not a UUID");
        }
    }
}
