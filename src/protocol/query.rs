use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connection::RestClient;
use crate::context::QueryContext;
use crate::errors::Error;
use crate::http::client::{HttpClient, Method};
use crate::protocol::async_fetch;
use crate::protocol::response::{ExecResponse, ExecResponseData, GenericResponse};
use crate::protocol::{
    AUTHORIZATION_HEADER, CLIENT_START_TIME_KEY, QUERY_IN_PROGRESS_ASYNC_CODE,
    QUERY_IN_PROGRESS_CODE, QUERY_REQUEST_PATH, REQUEST_ID_KEY, SESSION_EXPIRED_CODE,
    token_auth_header,
};
use crate::rows::{FetchOutcome, RowHandle};

/// Ceiling on renew-and-retry cycles within one operation. The absolute
/// deadline is the real bound; this stops a server that answers every request
/// with the session-expired code from spinning inside the deadline window.
const MAX_SESSION_RENEWALS: u32 = 5;

enum QueryAttempt<C: HttpClient> {
    Complete(ExecResponse<C>),
    SessionExpired(ExecResponse<C>),
}

impl<C: HttpClient> RestClient<C> {
    /// Submits a query and drives it to an answer, aborting it server-side if
    /// the caller's deadline or cancellation terminates it first.
    pub async fn post_restful_query(
        &self,
        ctx: &QueryContext,
        params: &[(String, String)],
        headers: &HashMap<String, String>,
        body: &[u8],
        timeout: Duration,
    ) -> Result<ExecResponse<C>, Error> {
        let result = self.post_query(ctx, params, headers, body, timeout).await;

        match result {
            Err(err) if err.is_terminated_by_caller() => {
                tracing::info!(
                    request_id = %ctx.request_id(),
                    "query terminated by caller, issuing server-side abort"
                );
                // The abort runs under its own context so the signal that
                // killed the query cannot kill the abort as well.
                let abort_ctx = QueryContext::new();
                if let Err(abort_err) = self
                    .cancel_query(&abort_ctx, ctx.request_id(), timeout)
                    .await
                {
                    tracing::warn!(error = %abort_err, "failed to abort cancelled query");
                }
                Err(err)
            }
            other => other,
        }
    }

    /// Query execution without the cancellation wrap: submit (or resume),
    /// renew-and-re-drive on session expiry, long-poll while the server
    /// reports the query in progress, hand off asynchronous results.
    pub async fn post_query(
        &self,
        ctx: &QueryContext,
        params: &[(String, String)],
        headers: &HashMap<String, String>,
        body: &[u8],
        timeout: Duration,
    ) -> Result<ExecResponse<C>, Error> {
        let deadline = Instant::now() + timeout;
        let mut renewals = 0u32;

        loop {
            match self.query_attempt(ctx, params, headers, body, deadline).await? {
                QueryAttempt::Complete(resp) => return Ok(resp),
                QueryAttempt::SessionExpired(resp) => {
                    renewals += 1;
                    if renewals > MAX_SESSION_RENEWALS {
                        return Err(resp.server_error());
                    }
                    self.renew_session_until(ctx, deadline).await?;
                }
            }
        }
    }

    async fn query_attempt(
        &self,
        ctx: &QueryContext,
        params: &[(String, String)],
        headers: &HashMap<String, String>,
        body: &[u8],
        deadline: Instant,
    ) -> Result<QueryAttempt<C>, Error> {
        if let Some(query_id) = ctx.resume_query_id() {
            return Ok(QueryAttempt::Complete(
                self.resume_prior_query(ctx, headers, query_id, deadline),
            ));
        }

        let mut all_params: Vec<(String, String)> = params.to_vec();
        all_params.push((REQUEST_ID_KEY.to_string(), ctx.request_id().to_string()));
        all_params.push((CLIENT_START_TIME_KEY.to_string(), unix_seconds()));

        let mut headers = headers.clone();
        if let Some(token) = self.tokens().session_token() {
            headers.insert(AUTHORIZATION_HEADER.to_string(), token_auth_header(&token));
        }

        let url = self.full_url(QUERY_REQUEST_PATH, &all_params);
        let resp = self
            .transport()
            .execute(
                Method::Post,
                &url,
                &headers,
                Some(body),
                deadline,
                false,
                ctx.cancellation(),
            )
            .await?;

        if !resp.is_ok() {
            tracing::error!(status = resp.status, url = %url, "query submission failed");
            return Err(Error::FailedToPostQuery {
                status: resp.status,
                url,
            });
        }

        let mut decoded: ExecResponse<C> = serde_json::from_slice(&resp.body)?;

        if decoded.code_str() == SESSION_EXPIRED_CODE {
            return Ok(QueryAttempt::SessionExpired(decoded));
        }

        // The server has named the query; let the cancellation coordinator
        // (or any other observer) know before we settle the result.
        if let Some(tx) = ctx.take_query_id_sender() {
            let query_id = decoded
                .data
                .as_ref()
                .map(|d| d.query_id.clone())
                .unwrap_or_default();
            let _ = tx.send(query_id);
        }

        if decoded.code_str() == QUERY_IN_PROGRESS_ASYNC_CODE {
            let result_url = decoded
                .data
                .as_ref()
                .map(|d| d.get_result_url.clone())
                .unwrap_or_default();
            if result_url.is_empty() {
                return Err(Error::MalformedResponse(
                    "asynchronous query response is missing getResultUrl".into(),
                ));
            }

            let (handle, tx) = RowHandle::in_progress();
            self.spawn_result_fetch(
                headers,
                self.full_url(&result_url, &[]),
                deadline,
                ctx.cancellation().clone(),
                tx,
            );
            decoded
                .data
                .get_or_insert_with(ExecResponseData::default)
                .async_rows = Some(handle);
            return Ok(QueryAttempt::Complete(decoded));
        }

        if decoded.code_str() == QUERY_IN_PROGRESS_CODE {
            decoded = self.poll_for_result(ctx, headers, decoded, deadline).await?;
        }

        Ok(QueryAttempt::Complete(decoded))
    }

    /// Long-polls the result URL until the server reports something other
    /// than "in progress".
    ///
    /// A mid-poll session expiry renews and polls the *same* URL again; the
    /// continuation URL only advances on an in-progress answer, which is what
    /// distinguishes the renew transition from a normal poll step.
    async fn poll_for_result(
        &self,
        ctx: &QueryContext,
        mut headers: HashMap<String, String>,
        first: ExecResponse<C>,
        deadline: Instant,
    ) -> Result<ExecResponse<C>, Error> {
        let mut resp = first;
        let mut result_url = String::new();
        let mut renewals = 0u32;

        loop {
            match resp.code_str() {
                SESSION_EXPIRED_CODE => {
                    renewals += 1;
                    if renewals > MAX_SESSION_RENEWALS {
                        return Err(resp.server_error());
                    }
                    self.renew_session_until(ctx, deadline).await?;
                }
                QUERY_IN_PROGRESS_CODE | QUERY_IN_PROGRESS_ASYNC_CODE => {
                    result_url = resp
                        .data
                        .as_ref()
                        .map(|d| d.get_result_url.clone())
                        .unwrap_or_default();
                    if result_url.is_empty() {
                        return Err(Error::MalformedResponse(
                            "in-progress response is missing getResultUrl".into(),
                        ));
                    }
                }
                _ => return Ok(resp),
            }

            // re-attach the session token; a renewal may have replaced it
            if let Some(token) = self.tokens().session_token() {
                headers.insert(AUTHORIZATION_HEADER.to_string(), token_auth_header(&token));
            }

            let url = self.full_url(&result_url, &[]);
            tracing::debug!(result_url = %result_url, "polling for query result");

            let http_resp = self
                .transport()
                .execute(
                    Method::Get,
                    &url,
                    &headers,
                    None,
                    deadline,
                    false,
                    ctx.cancellation(),
                )
                .await?;

            if !http_resp.is_ok() {
                tracing::error!(status = http_resp.status, url = %url, "result poll failed");
                return Err(Error::FailedToPostQuery {
                    status: http_resp.status,
                    url,
                });
            }

            resp = serde_json::from_slice(&http_resp.body)?;
        }
    }

    /// Resume path: no submission, just a placeholder handle plus a
    /// background fetch of the prior query's result.
    fn resume_prior_query(
        &self,
        ctx: &QueryContext,
        headers: &HashMap<String, String>,
        query_id: &str,
        deadline: Instant,
    ) -> ExecResponse<C> {
        tracing::debug!(query_id, "resuming prior query");

        let (handle, tx) = RowHandle::in_progress();
        self.spawn_result_fetch(
            headers.clone(),
            self.query_result_url(query_id, ctx.request_id()),
            deadline,
            ctx.cancellation().clone(),
            tx,
        );

        GenericResponse {
            data: Some(ExecResponseData {
                async_rows: Some(handle),
                ..ExecResponseData::default()
            }),
            code: None,
            message: None,
            success: true,
        }
    }

    fn spawn_result_fetch(
        &self,
        headers: HashMap<String, String>,
        url: String,
        deadline: Instant,
        cancel: CancellationToken,
        tx: oneshot::Sender<FetchOutcome<C>>,
    ) {
        let client = self.clone();
        tokio::spawn(async move {
            async_fetch::fetch_result(client, headers, url, deadline, cancel, tx).await;
        });
    }
}

fn unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time somehow went backwards")
        .as_secs()
        .to_string()
}

#[cfg(test)]
#[path = "./query_test.rs"]
mod query_test;
