use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RequestId;

/// Request status codes the client and server act on. Anything else is passed
/// through as-is.
pub mod status_code {
    pub const SUCCESS: u16 = 100;
    pub const MISSING_REQUEST_TYPE: u16 = 203;
    pub const UNKNOWN_REQUEST_TYPE: u16 = 204;
    pub const MISSING_REQUEST_FIELD: u16 = 300;
    pub const INVALID_REQUEST_FIELD: u16 = 400;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl RequestStatus {
    pub const fn success() -> Self {
        Self {
            result: true,
            code: status_code::SUCCESS,
            comment: None,
        }
    }

    pub fn failure(code: u16, comment: impl Into<String>) -> Self {
        Self {
            result: false,
            code,
            comment: Some(comment.into()),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: RequestId,
    pub request_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

/// Server answer to a [`Request`]. A failed status is still a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    #[serde(default)]
    pub request_type: String,
    pub request_id: RequestId,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

impl RequestResponse {
    pub const fn is_success(&self) -> bool {
        self.request_status.is_success()
    }
}

/// One entry of a [`RequestBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub request_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl BatchRequest {
    pub fn new(request_type: impl Into<String>, request_data: Option<Value>) -> Self {
        Self {
            request_type: request_type.into(),
            request_data,
            request_id: None,
        }
    }
}

/// How the server runs the requests of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum ExecutionType {
    None,
    #[default]
    SerialRealtime,
    SerialFrame,
    Parallel,
}

impl From<ExecutionType> for i8 {
    fn from(value: ExecutionType) -> Self {
        match value {
            ExecutionType::None => -1,
            ExecutionType::SerialRealtime => 0,
            ExecutionType::SerialFrame => 1,
            ExecutionType::Parallel => 2,
        }
    }
}

impl TryFrom<i8> for ExecutionType {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(ExecutionType::None),
            0 => Ok(ExecutionType::SerialRealtime),
            1 => Ok(ExecutionType::SerialFrame),
            2 => Ok(ExecutionType::Parallel),
            other => Err(format!("unknown execution type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBatch {
    pub request_id: RequestId,
    pub requests: Vec<BatchRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_on_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_type: Option<ExecutionType>,
}

/// Result of one batch entry; its id is only present if the entry carried one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    #[serde(default)]
    pub request_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBatchResponse {
    pub request_id: RequestId,
    pub results: Vec<BatchResult>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{BatchRequest, ExecutionType, RequestBatch, RequestId, RequestResponse};

    #[test]
    fn execution_type_uses_integer_codes() {
        assert_eq!(
            serde_json::to_value(ExecutionType::None).expect("serialize"),
            json!(-1)
        );
        assert_eq!(
            serde_json::from_value::<ExecutionType>(json!(2)).expect("deserialize"),
            ExecutionType::Parallel
        );
        assert!(serde_json::from_value::<ExecutionType>(json!(7)).is_err());
    }

    #[test]
    fn batch_omits_unset_options() {
        let batch = RequestBatch {
            request_id: RequestId::from("b-1"),
            requests: vec![BatchRequest::new("GetVersion", None)],
            halt_on_failure: None,
            execution_type: None,
        };
        assert_eq!(
            serde_json::to_value(&batch).expect("serialize"),
            json!({"requestId": "b-1", "requests": [{"requestType": "GetVersion"}]})
        );
    }

    #[test]
    fn failed_response_parses_as_data() {
        let response: RequestResponse = serde_json::from_value(json!({
            "requestType": "Nope",
            "requestId": "r-1",
            "requestStatus": {"result": false, "code": 204, "comment": "unknown"}
        }))
        .expect("deserialize");
        assert!(!response.is_success());
        assert_eq!(response.request_status.code, 204);
        assert_eq!(response.response_data, None);
    }

    #[test]
    fn response_without_request_type_still_decodes() {
        let response: RequestResponse = serde_json::from_value(json!({
            "requestId": "r-1",
            "requestStatus": { "result": true, "code": 100 },
            "responseData": { "ok": 1 }
        }))
        .expect("deserialize");
        assert_eq!(response.request_type, "");
        assert!(response.is_success());
        assert_eq!(response.response_data, Some(json!({ "ok": 1 })));
    }
}
