use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use crate::connection::RestClient;
use crate::context::QueryContext;
use crate::errors::Error;
use crate::http::client::{HttpClient, Method};
use crate::http::params;
use crate::protocol::response::{CloseSessionResponse, RenewSessionResponse};
use crate::protocol::{
    AUTHORIZATION_HEADER, CLOSE_SESSION_TIMEOUT, REQUEST_ID_KEY, SESSION_EXPIRED_CODE,
    SESSION_REQUEST_PATH, TOKEN_REQUEST_PATH, default_headers, token_auth_header,
};

impl<C: HttpClient> RestClient<C> {
    /// Exchanges the master token for a fresh session token.
    ///
    /// On success both tokens in the accessor are replaced together. Called
    /// by the query executor whenever the server answers with the
    /// session-expired code; also usable directly by the heartbeat
    /// collaborator.
    pub async fn renew_session(&self, ctx: &QueryContext, timeout: Duration) -> Result<(), Error> {
        self.renew_session_until(ctx, Instant::now() + timeout).await
    }

    pub(crate) async fn renew_session_until(
        &self,
        ctx: &QueryContext,
        deadline: Instant,
    ) -> Result<(), Error> {
        tracing::info!("start renew session");

        let (session_token, master_token, _) = self.tokens().get_tokens();

        let url = self.full_url(
            TOKEN_REQUEST_PATH,
            &params!((REQUEST_ID_KEY, ctx.request_id().to_string())),
        );

        let mut headers = default_headers();
        headers.insert(
            AUTHORIZATION_HEADER.to_string(),
            token_auth_header(&master_token),
        );

        let body = serde_json::to_vec(&json!({
            "oldSessionToken": session_token,
            "requestType": "RENEW",
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
            tracing::error!(status = resp.status, url = %url, "renew session failed");
            return Err(Error::FailedToRenewSession {
                status: resp.status,
                url,
            });
        }

        let decoded: RenewSessionResponse = serde_json::from_slice(&resp.body)?;
        if !decoded.success {
            return Err(decoded.server_error());
        }

        let data = decoded.data.ok_or_else(|| {
            Error::MalformedResponse("renew response is missing its data".into())
        })?;

        self.tokens()
            .set_tokens(data.session_token, data.master_token, data.session_id);
        tracing::debug!(session_id = data.session_id, "session renewed");
        Ok(())
    }

    /// Invalidates the session server-side and clears the token accessor.
    ///
    /// Runs under a fixed short timeout regardless of the caller's budget. An
    /// already-expired session counts as success. Best-effort: do not retry
    /// on network failure.
    pub async fn close_session(&self, ctx: &QueryContext) -> Result<(), Error> {
        tracing::info!("close session");

        let url = self.full_url(
            SESSION_REQUEST_PATH,
            &params!(
                ("delete", "true"),
                (REQUEST_ID_KEY, ctx.request_id().to_string()),
            ),
        );

        let mut headers = default_headers();
        if let Some(token) = self.tokens().session_token() {
            headers.insert(AUTHORIZATION_HEADER.to_string(), token_auth_header(&token));
        }

        let resp = self
            .transport()
            .execute(
                Method::Post,
                &url,
                &headers,
                None,
                Instant::now() + CLOSE_SESSION_TIMEOUT,
                false,
                ctx.cancellation(),
            )
            .await?;

        if !resp.is_ok() {
            tracing::error!(status = resp.status, url = %url, "close session failed");
            return Err(Error::FailedToCloseSession {
                status: resp.status,
                url,
            });
        }

        let decoded: CloseSessionResponse = serde_json::from_slice(&resp.body)?;
        if !decoded.success && decoded.code_str() != SESSION_EXPIRED_CODE {
            return Err(decoded.server_error());
        }

        self.tokens().clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "./session_test.rs"]
mod session_test;
