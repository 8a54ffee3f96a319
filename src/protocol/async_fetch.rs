use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::chunks::ChunkDownloader;
use crate::connection::RestClient;
use crate::errors::Error;
use crate::http::client::{HttpClient, Method};
use crate::protocol::response::ExecResponse;
use crate::protocol::{AUTHORIZATION_HEADER, token_auth_header};
use crate::rows::{FetchOutcome, FetchedResult};

/// Single-shot background fetch of an asynchronously executing query's
/// result. Exactly one terminal status is sent on `tx`, whatever happens;
/// a handle left waiting forever would strand its owner.
pub(crate) async fn fetch_result<C: HttpClient>(
    client: RestClient<C>,
    mut headers: HashMap<String, String>,
    url: String,
    deadline: Instant,
    cancel: CancellationToken,
    tx: oneshot::Sender<FetchOutcome<C>>,
) {
    let outcome = match fetch(&client, &mut headers, &url, deadline, &cancel).await {
        Ok(result) => FetchOutcome::Complete(Box::new(result)),
        Err(err) => {
            tracing::error!(error = %err, url = %url, "asynchronous result fetch failed");
            FetchOutcome::Failed(err)
        }
    };

    if tx.send(outcome).is_err() {
        tracing::debug!("row handle dropped before the result arrived");
    }
}

async fn fetch<C: HttpClient>(
    client: &RestClient<C>,
    headers: &mut HashMap<String, String>,
    url: &str,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<FetchedResult<C>, Error> {
    if let Some(token) = client.tokens().session_token() {
        headers.insert(AUTHORIZATION_HEADER.to_string(), token_auth_header(&token));
    }

    let resp = client
        .transport()
        .execute(Method::Get, url, headers, None, deadline, false, cancel)
        .await?;

    if !resp.is_ok() {
        return Err(Error::FailedToPostQuery {
            status: resp.status,
            url: url.to_string(),
        });
    }

    let decoded: ExecResponse<C> = serde_json::from_slice(&resp.body)?;
    if !decoded.success {
        return Err(decoded.server_error());
    }

    let data = decoded.data.ok_or_else(|| {
        Error::MalformedResponse("result response is missing its data".into())
    })?;

    let cell_count = data.row_type.len();
    let mut downloader = ChunkDownloader::new(
        client.http_client().clone(),
        data.row_set,
        data.chunks,
        data.qrmk,
        data.chunk_headers,
        data.query_result_format,
        data.total,
        cell_count,
    );
    downloader.start()?;

    tracing::debug!(query_id = %data.query_id, "asynchronous result ready");

    Ok(FetchedResult {
        query_id: data.query_id,
        row_types: data.row_type,
        downloader,
    })
}
