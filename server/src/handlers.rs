//! Request types the loopback server understands.

use std::time::Duration;

use futures_util::future::join_all;
use obsws_lib::protocol::{
    BatchRequest, BatchResult, Event, EventSubscription, ExecutionType, Request, RequestBatch,
    RequestBatchResponse, RequestResponse, RequestStatus, status_code,
};
use serde_json::{Value, json};
use tokio::time::sleep;

use crate::state::ServerState;

pub const AVAILABLE_REQUESTS: &[&str] = &["GetVersion", "Sleep", "BroadcastCustomEvent"];

/// Longest pause a `Sleep` request may ask for.
const MAX_SLEEP_MILLIS: u64 = 50_000;

pub(crate) async fn respond(state: &ServerState, request: Request) -> RequestResponse {
    let (request_status, response_data) =
        execute(state, &request.request_type, request.request_data.as_ref()).await;
    RequestResponse {
        request_type: request.request_type,
        request_id: request.request_id,
        request_status,
        response_data,
    }
}

pub(crate) async fn respond_batch(state: &ServerState, batch: RequestBatch) -> RequestBatchResponse {
    let halt_on_failure = batch.halt_on_failure.unwrap_or(false);
    let results = match batch.execution_type.unwrap_or_default() {
        ExecutionType::Parallel => {
            join_all(
                batch
                    .requests
                    .into_iter()
                    .map(|request| execute_entry(state, request)),
            )
            .await
        }
        _ => {
            let mut results = Vec::with_capacity(batch.requests.len());
            for request in batch.requests {
                let result = execute_entry(state, request).await;
                let failed = !result.request_status.result;
                results.push(result);
                if failed && halt_on_failure {
                    break;
                }
            }
            results
        }
    };

    RequestBatchResponse {
        request_id: batch.request_id,
        results,
    }
}

async fn execute_entry(state: &ServerState, request: BatchRequest) -> BatchResult {
    let (request_status, response_data) =
        execute(state, &request.request_type, request.request_data.as_ref()).await;
    BatchResult {
        request_type: request.request_type,
        request_id: request.request_id,
        request_status,
        response_data,
    }
}

async fn execute(
    state: &ServerState,
    request_type: &str,
    data: Option<&Value>,
) -> (RequestStatus, Option<Value>) {
    match request_type {
        "" => (
            RequestStatus::failure(status_code::MISSING_REQUEST_TYPE, "Missing request type."),
            None,
        ),
        "GetVersion" => (RequestStatus::success(), Some(version_info(state))),
        "Sleep" => {
            let Some(millis) = data.and_then(|data| data["sleepMillis"].as_u64()) else {
                return (
                    RequestStatus::failure(
                        status_code::MISSING_REQUEST_FIELD,
                        "Your request is missing the `sleepMillis` field.",
                    ),
                    None,
                );
            };
            if millis > MAX_SLEEP_MILLIS {
                return (
                    RequestStatus::failure(
                        status_code::INVALID_REQUEST_FIELD,
                        format!("`sleepMillis` must be at most {}.", MAX_SLEEP_MILLIS),
                    ),
                    None,
                );
            }
            sleep(Duration::from_millis(millis)).await;
            (RequestStatus::success(), None)
        }
        "BroadcastCustomEvent" => {
            let Some(event_data) = data.and_then(|data| data.get("eventData")).cloned() else {
                return (
                    RequestStatus::failure(
                        status_code::MISSING_REQUEST_FIELD,
                        "Your request is missing the `eventData` field.",
                    ),
                    None,
                );
            };
            state.emit(Event::new(
                "CustomEvent",
                EventSubscription::GENERAL,
                event_data,
            ));
            (RequestStatus::success(), None)
        }
        _ => (
            RequestStatus::failure(
                status_code::UNKNOWN_REQUEST_TYPE,
                "Your request type is not valid.",
            ),
            None,
        ),
    }
}

fn version_info(state: &ServerState) -> Value {
    let config = state.config();
    json!({
        "obsVersion": config.obs_studio_version,
        "obsWebSocketVersion": config.obs_web_socket_version,
        "rpcVersion": config.rpc_version,
        "availableRequests": AVAILABLE_REQUESTS,
    })
}

#[cfg(test)]
mod tests {
    use obsws_lib::protocol::{
        BatchRequest, ExecutionType, Request, RequestBatch, RequestId, status_code,
    };
    use serde_json::json;

    use super::{respond, respond_batch};
    use crate::state::ServerState;

    fn batch(execution_type: ExecutionType, halt_on_failure: bool) -> RequestBatch {
        RequestBatch {
            request_id: RequestId::from("batch-1"),
            requests: vec![
                BatchRequest::new("GetVersion", None),
                BatchRequest::new("NoSuchRequest", None),
                BatchRequest::new("Sleep", Some(json!({ "sleepMillis": 1 }))),
            ],
            halt_on_failure: Some(halt_on_failure),
            execution_type: Some(execution_type),
        }
    }

    #[tokio::test]
    async fn unknown_request_type_is_a_failed_status() {
        let state = ServerState::default();
        let response = respond(
            &state,
            Request {
                request_id: RequestId::from("r-1"),
                request_type: "NoSuchRequest".into(),
                request_data: None,
            },
        )
        .await;
        assert_eq!(response.request_id, RequestId::from("r-1"));
        assert!(!response.request_status.result);
        assert_eq!(response.request_status.code, status_code::UNKNOWN_REQUEST_TYPE);
    }

    #[tokio::test]
    async fn sleep_requires_duration() {
        let state = ServerState::default();
        let response = respond(
            &state,
            Request {
                request_id: RequestId::from("r-2"),
                request_type: "Sleep".into(),
                request_data: Some(json!({})),
            },
        )
        .await;
        assert_eq!(response.request_status.code, status_code::MISSING_REQUEST_FIELD);
    }

    #[tokio::test]
    async fn serial_batch_halts_after_first_failure() {
        let state = ServerState::default();
        let response = respond_batch(&state, batch(ExecutionType::SerialRealtime, true)).await;
        assert_eq!(response.request_id, RequestId::from("batch-1"));
        assert_eq!(response.results.len(), 2);
        assert!(response.results[0].request_status.result);
        assert!(!response.results[1].request_status.result);
    }

    #[tokio::test]
    async fn serial_batch_without_halt_runs_everything() {
        let state = ServerState::default();
        let response = respond_batch(&state, batch(ExecutionType::SerialFrame, false)).await;
        let types: Vec<_> = response
            .results
            .iter()
            .map(|result| result.request_type.as_str())
            .collect();
        assert_eq!(types, ["GetVersion", "NoSuchRequest", "Sleep"]);
    }

    #[tokio::test]
    async fn parallel_batch_keeps_request_order() {
        let state = ServerState::default();
        let response = respond_batch(&state, batch(ExecutionType::Parallel, true)).await;
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[2].request_type, "Sleep");
    }
}
