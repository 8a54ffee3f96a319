use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::errors::Error;
use crate::http::client::HttpClient;

/// Location and size of one remote result chunk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkMetadata {
    pub url: String,
    pub row_count: i64,
    pub uncompressed_size: i64,
    pub compressed_size: i64,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            url: String::new(),
            row_count: 0,
            uncompressed_size: 0,
            compressed_size: 0,
        }
    }
}

/// Fully configured descriptor handed to the result-streaming collaborator.
///
/// The async result fetcher assembles one of these from a successful result
/// response and calls [`start`](Self::start); actually downloading and
/// decoding the remote chunks is the wider driver's job, through the shared
/// HTTP client carried here.
pub struct ChunkDownloader<C: HttpClient> {
    client: C,
    first_chunk: Vec<Vec<serde_json::Value>>,
    chunk_metas: Vec<ChunkMetadata>,
    qrmk: String,
    chunk_headers: HashMap<String, String>,
    query_result_format: String,
    total_rows: i64,
    cell_count: usize,
    started: bool,
}

impl<C: HttpClient> ChunkDownloader<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: C,
        first_chunk: Vec<Vec<serde_json::Value>>,
        chunk_metas: Vec<ChunkMetadata>,
        qrmk: String,
        chunk_headers: HashMap<String, String>,
        query_result_format: String,
        total_rows: i64,
        cell_count: usize,
    ) -> Self {
        Self {
            client,
            first_chunk,
            chunk_metas,
            qrmk,
            chunk_headers,
            query_result_format,
            total_rows,
            cell_count,
            started: false,
        }
    }

    /// Readies the descriptor for streaming. Remote chunks require either the
    /// query-result master key or per-chunk headers to be fetchable.
    pub fn start(&mut self) -> Result<(), Error> {
        if !self.chunk_metas.is_empty() && self.qrmk.is_empty() && self.chunk_headers.is_empty() {
            return Err(Error::MalformedResponse(
                "result has remote chunks but neither qrmk nor chunk headers".into(),
            ));
        }

        tracing::debug!(
            first_chunk_rows = self.first_chunk.len(),
            remote_chunks = self.chunk_metas.len(),
            total_rows = self.total_rows,
            format = %self.query_result_format,
            "chunk downloader ready"
        );
        self.started = true;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Rows delivered inline with the result response.
    pub fn first_chunk(&self) -> &[Vec<serde_json::Value>] {
        &self.first_chunk
    }

    pub fn chunk_metadata(&self) -> &[ChunkMetadata] {
        &self.chunk_metas
    }

    pub fn qrmk(&self) -> &str {
        &self.qrmk
    }

    pub fn chunk_headers(&self) -> &HashMap<String, String> {
        &self.chunk_headers
    }

    pub fn query_result_format(&self) -> &str {
        &self.query_result_format
    }

    pub fn total_rows(&self) -> i64 {
        self.total_rows
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: HttpClient> fmt::Debug for ChunkDownloader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkDownloader")
            .field("first_chunk_rows", &self.first_chunk.len())
            .field("remote_chunks", &self.chunk_metas.len())
            .field("total_rows", &self.total_rows)
            .field("cell_count", &self.cell_count)
            .field("query_result_format", &self.query_result_format)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
