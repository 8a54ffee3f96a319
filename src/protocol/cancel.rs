use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use uuid::Uuid;

use crate::connection::RestClient;
use crate::context::QueryContext;
use crate::errors::Error;
use crate::http::client::{HttpClient, Method};
use crate::http::params;
use crate::protocol::response::CancelQueryResponse;
use crate::protocol::{
    ABORT_REQUEST_PATH, AUTHORIZATION_HEADER, REQUEST_ID_KEY, SESSION_EXPIRED_CODE,
    default_headers, token_auth_header,
};

impl<C: HttpClient> RestClient<C> {
    /// Asks the server to abort the operation named by `target_request_id`.
    ///
    /// `ctx` identifies this abort request itself and is normally a fresh
    /// context, so a cancelled caller cannot take the abort down with it.
    /// A session expiry during the abort is renewed and retried once.
    pub async fn cancel_query(
        &self,
        ctx: &QueryContext,
        target_request_id: Uuid,
        timeout: Duration,
    ) -> Result<(), Error> {
        tracing::info!(target_request_id = %target_request_id, "cancel query");

        let deadline = Instant::now() + timeout;
        let mut renewed = false;

        loop {
            let url = self.full_url(
                ABORT_REQUEST_PATH,
                &params!((REQUEST_ID_KEY, ctx.request_id().to_string())),
            );

            let mut headers = default_headers();
            if let Some(token) = self.tokens().session_token() {
                headers.insert(AUTHORIZATION_HEADER.to_string(), token_auth_header(&token));
            }

            let body = serde_json::to_vec(&json!({
                "requestId": target_request_id.to_string(),
            }))?;

            let resp = self
                .transport()
                .execute(
                    Method::Post,
                    &url,
                    &headers,
                    Some(body.as_slice()),
                    deadline,
                    false,
                    ctx.cancellation(),
                )
                .await?;

            if !resp.is_ok() {
                tracing::error!(status = resp.status, url = %url, "abort request failed");
                return Err(Error::FailedToCancelQuery {
                    status: resp.status,
                    url,
                });
            }

            let decoded: CancelQueryResponse = serde_json::from_slice(&resp.body)?;

            if !decoded.success && decoded.code_str() == SESSION_EXPIRED_CODE && !renewed {
                self.renew_session_until(ctx, deadline).await?;
                renewed = true;
                continue;
            }

            if decoded.success {
                tracing::debug!(target_request_id = %target_request_id, "query aborted");
                return Ok(());
            }

            return Err(decoded.server_error());
        }
    }
}

#[cfg(test)]
#[path = "./cancel_test.rs"]
mod cancel_test;
