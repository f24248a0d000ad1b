use crate::backend::{
    AssistantConfig, BackendError, InferenceBackend, RunState, RunStatus, ToolCallRequest,
    ToolCallResult,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::error;

/// Assistants-style HTTP backend: sessions are threads, runs are runs.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: &str, assistant_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            assistant_id: assistant_id.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, BackendError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| BackendError::Transient(format!("request failed: {e}")))?;
        triage(resp).await
    }
}

/// Maps an HTTP response onto the backend error taxonomy: 404 means the
/// resource vanished remotely, 5xx is transient, everything else 4xx is a
/// definitive rejection.
async fn triage(resp: Response) -> Result<Value, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("invalid response body: {e}")));
    }
    let body = resp.text().await.unwrap_or_else(|_| "<no body>".into());
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound(body));
    }
    if status.is_server_error() {
        return Err(BackendError::Transient(format!("{status}: {body}")));
    }
    error!(%status, body, "Backend rejected request");
    Err(BackendError::Api(format!("{status}: {body}")))
}

fn string_at(value: &Value, pointer: &str) -> Result<String, BackendError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::Api(format!("response missing {pointer}")))
}

fn parse_status(raw: &str) -> RunStatus {
    match raw {
        "queued" => RunStatus::Queued,
        "in_progress" => RunStatus::InProgress,
        "requires_action" => RunStatus::RequiresAction,
        "completed" => RunStatus::Completed,
        "cancelled" | "cancelling" => RunStatus::Cancelled,
        "expired" => RunStatus::Expired,
        // Unknown statuses are treated as failed so the retry budget,
        // not an endless poll loop, decides the outcome.
        _ => RunStatus::Failed,
    }
}

fn parse_pending_calls(run: &Value) -> Vec<ToolCallRequest> {
    let Some(calls) = run
        .pointer("/required_action/submit_tool_outputs/tool_calls")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|call| {
            let call_id = call.get("id")?.as_str()?.to_string();
            let name = call.pointer("/function/name")?.as_str()?.to_string();
            let raw_args = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            let arguments = serde_json::from_str(raw_args).unwrap_or(Value::Null);
            Some(ToolCallRequest {
                call_id,
                name,
                arguments,
            })
        })
        .collect()
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    async fn create_session(&self) -> Result<String, BackendError> {
        let body = self
            .send(self.request(Method::POST, "/threads").json(&json!({})))
            .await?;
        string_at(&body, "/id")
    }

    async fn get_session(&self, session_id: &str) -> Result<(), BackendError> {
        self.send(self.request(Method::GET, &format!("/threads/{session_id}")))
            .await
            .map(|_| ())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError> {
        self.send(self.request(Method::DELETE, &format!("/threads/{session_id}")))
            .await
            .map(|_| ())
    }

    async fn append_message(&self, session_id: &str, text: &str) -> Result<(), BackendError> {
        self.send(
            self.request(Method::POST, &format!("/threads/{session_id}/messages"))
                .json(&json!({ "role": "user", "content": text })),
        )
        .await
        .map(|_| ())
    }

    async fn create_run(&self, session_id: &str) -> Result<String, BackendError> {
        let body = self
            .send(
                self.request(Method::POST, &format!("/threads/{session_id}/runs"))
                    .json(&json!({ "assistant_id": self.assistant_id })),
            )
            .await?;
        string_at(&body, "/id")
    }

    async fn get_run(&self, session_id: &str, run_id: &str) -> Result<RunState, BackendError> {
        let body = self
            .send(self.request(Method::GET, &format!("/threads/{session_id}/runs/{run_id}")))
            .await?;
        let status = parse_status(&string_at(&body, "/status")?);
        let pending_calls = if status == RunStatus::RequiresAction {
            parse_pending_calls(&body)
        } else {
            Vec::new()
        };
        Ok(RunState {
            status,
            pending_calls,
        })
    }

    async fn submit_tool_results(
        &self,
        session_id: &str,
        run_id: &str,
        results: Vec<ToolCallResult>,
    ) -> Result<(), BackendError> {
        let outputs: Vec<Value> = results
            .iter()
            .map(|r| json!({ "tool_call_id": r.call_id, "output": r.output }))
            .collect();
        self.send(
            self.request(
                Method::POST,
                &format!("/threads/{session_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&json!({ "tool_outputs": outputs })),
        )
        .await
        .map(|_| ())
    }

    async fn cancel_run(&self, session_id: &str, run_id: &str) -> Result<(), BackendError> {
        self.send(
            self.request(
                Method::POST,
                &format!("/threads/{session_id}/runs/{run_id}/cancel"),
            )
            .json(&json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn latest_response(&self, session_id: &str) -> Result<String, BackendError> {
        let body = self
            .send(self.request(
                Method::GET,
                &format!("/threads/{session_id}/messages?limit=1"),
            ))
            .await?;
        string_at(&body, "/data/0/content/0/text/value")
    }

    async fn assistant_config(&self) -> Result<AssistantConfig, BackendError> {
        let body = self
            .send(self.request(Method::GET, &format!("/assistants/{}", self.assistant_id)))
            .await?;
        Ok(AssistantConfig {
            instructions: string_at(&body, "/instructions").unwrap_or_default(),
            model: string_at(&body, "/model")?,
            tools: body.get("tools").cloned().unwrap_or(Value::Array(vec![])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_covers_wire_values() {
        assert_eq!(parse_status("queued"), RunStatus::Queued);
        assert_eq!(parse_status("in_progress"), RunStatus::InProgress);
        assert_eq!(parse_status("requires_action"), RunStatus::RequiresAction);
        assert_eq!(parse_status("completed"), RunStatus::Completed);
        assert_eq!(parse_status("cancelling"), RunStatus::Cancelled);
        assert_eq!(parse_status("expired"), RunStatus::Expired);
        assert_eq!(parse_status("something_new"), RunStatus::Failed);
    }

    #[test]
    fn pending_calls_extracted_with_parsed_arguments() {
        let run = json!({
            "status": "requires_action",
            "required_action": { "submit_tool_outputs": { "tool_calls": [
                {
                    "id": "call_1",
                    "function": { "name": "check_order_status", "arguments": "{\"order_number\":\"TRK1\"}" }
                },
                {
                    "id": "call_2",
                    "function": { "name": "handle_human_request", "arguments": "not json" }
                }
            ]}}
        });
        let calls = parse_pending_calls(&run);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_id, "call_1");
        assert_eq!(calls[0].arguments["order_number"], "TRK1");
        assert_eq!(calls[1].name, "handle_human_request");
        assert!(calls[1].arguments.is_null());
    }

    #[test]
    fn pending_calls_empty_without_required_action() {
        assert!(parse_pending_calls(&json!({ "status": "in_progress" })).is_empty());
    }
}
