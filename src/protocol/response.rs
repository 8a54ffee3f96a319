use std::collections::HashMap;

use serde::Deserialize;

use crate::chunks::ChunkMetadata;
use crate::errors::Error;
use crate::http::client::HttpClient;
use crate::rows::RowHandle;

/// Envelope shared by every protocol response: a payload plus the server's
/// success flag, code and message.
#[derive(Debug, Deserialize)]
pub struct GenericResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub success: bool,
}

impl<T> GenericResponse<T> {
    pub fn code_str(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    /// Converts a `success=false` response into a structured error carrying
    /// the server's numeric code.
    pub(crate) fn server_error(&self) -> Error {
        let message = self.message.clone().unwrap_or_default();
        match self.code_str().parse::<i32>() {
            Ok(code) => Error::Server { code, message },
            Err(_) => Error::MalformedResponse(format!(
                "non-numeric server error code {:?}",
                self.code
            )),
        }
    }
}

/// One column of the result schema.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub length: i64,
    pub byte_length: i64,
    pub precision: i64,
    pub scale: i64,
    pub nullable: bool,
}

/// Payload of a query submission or result-fetch response. Every field is
/// defaultable because in-progress stubs only populate a couple of them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default, bound(deserialize = ""))]
pub struct ExecResponseData<C: HttpClient> {
    pub query_id: String,
    pub get_result_url: String,
    pub row_type: Vec<RowType>,
    pub row_set: Vec<Vec<serde_json::Value>>,
    pub chunks: Vec<ChunkMetadata>,
    pub chunk_headers: HashMap<String, String>,
    pub qrmk: String,
    pub query_result_format: String,
    pub total: i64,
    pub returned: i64,

    /// Placeholder handle for an asynchronously executing query; attached by
    /// the executor, never part of the wire payload.
    #[serde(skip)]
    pub async_rows: Option<RowHandle<C>>,
}

impl<C: HttpClient> Default for ExecResponseData<C> {
    fn default() -> Self {
        Self {
            query_id: String::new(),
            get_result_url: String::new(),
            row_type: Vec::new(),
            row_set: Vec::new(),
            chunks: Vec::new(),
            chunk_headers: HashMap::new(),
            qrmk: String::new(),
            query_result_format: String::new(),
            total: 0,
            returned: 0,
            async_rows: None,
        }
    }
}

pub type ExecResponse<C> = GenericResponse<ExecResponseData<C>>;

/// Payload of a successful session renewal.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewSessionData {
    pub session_token: String,
    #[serde(rename = "validityInSecondsST", default)]
    pub session_token_validity: i64,

    pub master_token: String,
    #[serde(rename = "validityInSecondsMT", default)]
    pub master_token_validity: i64,

    #[serde(default = "unestablished_session_id")]
    pub session_id: i64,
}

fn unestablished_session_id() -> i64 {
    -1
}

pub(crate) type RenewSessionResponse = GenericResponse<RenewSessionData>;

pub(crate) type CancelQueryResponse = GenericResponse<serde_json::Value>;

pub(crate) type CloseSessionResponse = GenericResponse<serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHttpClient;

    #[test]
    fn exec_response_decodes_in_progress_stub() {
        let body = r#"{"data":{"getResultUrl":"/queries/Q1/result"},"code":"333333","message":null,"success":true}"#;
        let resp: ExecResponse<MockHttpClient> =
            serde_json::from_str(body).expect("decode failed");

        assert!(resp.success);
        assert_eq!(resp.code_str(), "333333");
        let data = resp.data.expect("missing data");
        assert_eq!(data.get_result_url, "/queries/Q1/result");
        assert_eq!(data.query_id, "");
        assert!(data.async_rows.is_none());
    }

    #[test]
    fn exec_response_decodes_full_result() {
        let body = r#"{
            "data": {
                "queryId": "Q1",
                "rowType": [{"name": "C1", "type": "text", "nullable": true}],
                "rowSet": [["a"], [null]],
                "chunks": [{"url": "https://stage.test/0", "rowCount": 5}],
                "chunkHeaders": {"x-amz-key": "k"},
                "qrmk": "master",
                "queryResultFormat": "json",
                "total": 7,
                "returned": 2
            },
            "code": "000000",
            "message": "ok",
            "success": true
        }"#;
        let resp: ExecResponse<MockHttpClient> =
            serde_json::from_str(body).expect("decode failed");

        let data = resp.data.expect("missing data");
        assert_eq!(data.query_id, "Q1");
        assert_eq!(data.row_type[0].name, "C1");
        assert_eq!(data.row_type[0].column_type, "text");
        assert_eq!(data.row_set.len(), 2);
        assert_eq!(data.chunks[0].row_count, 5);
        assert_eq!(data.total, 7);
    }

    #[test]
    fn failure_without_data_decodes() {
        let body = r#"{"data":null,"code":"390112","message":"expired","success":false}"#;
        let resp: ExecResponse<MockHttpClient> =
            serde_json::from_str(body).expect("decode failed");

        assert!(!resp.success);
        assert!(resp.data.is_none());
        let err = resp.server_error();
        assert!(matches!(err, Error::Server { code: 390112, .. }));
    }

    #[test]
    fn renew_response_carries_both_tokens() {
        let body = r#"{
            "data": {
                "sessionToken": "S2",
                "validityInSecondsST": 3600,
                "masterToken": "M2",
                "validityInSecondsMT": 14400,
                "sessionId": 77
            },
            "success": true
        }"#;
        let resp: RenewSessionResponse = serde_json::from_str(body).expect("decode failed");
        let data = resp.data.expect("missing data");
        assert_eq!(data.session_token, "S2");
        assert_eq!(data.master_token, "M2");
        assert_eq!(data.session_id, 77);
        assert_eq!(data.session_token_validity, 3600);
        assert_eq!(data.master_token_validity, 14400);
    }

    #[test]
    fn non_numeric_code_is_malformed() {
        let resp: CancelQueryResponse =
            serde_json::from_str(r#"{"code":"oops","success":false}"#).expect("decode failed");
        assert!(matches!(resp.server_error(), Error::MalformedResponse(_)));
    }
}
