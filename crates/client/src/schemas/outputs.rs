//! Response-side schema types
//!
//! Backend payloads are parsed strictly: a missing required field or a value
//! of the wrong JSON type fails with
//! [`ModelManagerError::Deserialization`]. Nothing is coerced or defaulted.

use model_manager_common::{ModelManagerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::detail;
use super::inputs::{BatchModelRequest, ModelRequest};

/// Error recorded for a batch item the backend did not answer
pub const MISSING_ITEM_ERROR: &str = "missing from backend response";

/// Fields of a [`ModelResponse`]; a failed batch entry may carry none of them
const RESPONSE_FIELDS: [&str; 7] = [
    "content",
    "usage",
    "latency_ms",
    "thinking",
    "finish_reason",
    "request_id",
    "raw_response",
];

/// Token usage statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

impl Usage {
    /// Usage with `total_tokens` derived from the two counts, saturating at `u64::MAX`
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            reasoning_tokens: None,
        }
    }
}

/// Canonical single-response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    content: String,
    usage: Usage,
    latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_response: Option<Value>,
}

impl ModelResponse {
    /// Response with only the required fields set
    pub fn new(content: impl Into<String>, usage: Usage, latency_ms: u64) -> Self {
        Self {
            content: content.into(),
            usage,
            latency_ms,
            thinking: None,
            finish_reason: None,
            request_id: None,
            raw_response: None,
        }
    }

    /// Attach a reasoning trace
    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = Some(thinking.into());
        self
    }

    /// Set the provider-reported finish reason
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    /// Set the backend request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Parse a backend payload, checking shape only
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| rejected("model response", e))
    }

    /// Parse an already-decoded backend payload, checking shape only
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| rejected("model response", e))
    }

    /// Parse a backend payload answering `request`.
    ///
    /// A thinking trace is only accepted when the request enabled thinking.
    pub fn from_json_for(payload: &str, request: &ModelRequest) -> Result<Self> {
        let response = Self::from_json(payload)?;
        response.check_thinking(request.thinking_enabled())?;
        Ok(response)
    }

    /// Generated text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Token accounting
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Backend-measured latency in milliseconds
    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Reasoning trace, present only for thinking-enabled requests
    pub fn thinking(&self) -> Option<&str> {
        self.thinking.as_deref()
    }

    /// Finish reason as reported by the provider
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Backend request id, if any
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Untouched provider payload, if the backend forwarded it
    pub fn raw_response(&self) -> Option<&Value> {
        self.raw_response.as_ref()
    }

    fn check_thinking(&self, thinking_enabled: bool) -> Result<()> {
        if self.thinking.is_some() && !thinking_enabled {
            return Err(ModelManagerError::deserialization(
                "response carries a thinking trace but thinking was not enabled on the request",
            ));
        }
        Ok(())
    }
}

fn rejected(what: &str, err: serde_json::Error) -> ModelManagerError {
    warn!(error = %err, "rejected {} payload", what);
    ModelManagerError::deserialization(format!("invalid {} payload: {}", what, err))
}

// ============================================================================
// Batch
// ============================================================================

/// Result of one batch item
#[derive(Debug, Clone, PartialEq)]
pub enum BatchItemOutcome {
    Success(ModelResponse),
    Failed { error: String },
}

/// Per-item result correlated to its request item by `custom_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "BatchEntryRepr")]
pub struct BatchItemResult {
    custom_id: String,
    outcome: BatchItemOutcome,
}

#[derive(Serialize)]
struct BatchEntryRepr {
    custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(flatten)]
    response: Option<ModelResponse>,
}

impl From<BatchItemResult> for BatchEntryRepr {
    fn from(result: BatchItemResult) -> Self {
        let (error, response) = match result.outcome {
            BatchItemOutcome::Success(response) => (None, Some(response)),
            BatchItemOutcome::Failed { error } => (Some(error), None),
        };
        BatchEntryRepr {
            custom_id: result.custom_id,
            error,
            response,
        }
    }
}

impl BatchItemResult {
    /// Successful result for `custom_id`
    pub fn success(custom_id: impl Into<String>, response: ModelResponse) -> Self {
        Self {
            custom_id: custom_id.into(),
            outcome: BatchItemOutcome::Success(response),
        }
    }

    /// Failed result for `custom_id` with the backend's error message
    pub fn failed(custom_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            custom_id: custom_id.into(),
            outcome: BatchItemOutcome::Failed {
                error: error.into(),
            },
        }
    }

    /// Id of the request item this result answers
    pub fn custom_id(&self) -> &str {
        &self.custom_id
    }

    /// Success or failure of the item
    pub fn outcome(&self) -> &BatchItemOutcome {
        &self.outcome
    }

    /// The response, when the item succeeded
    pub fn response(&self) -> Option<&ModelResponse> {
        match &self.outcome {
            BatchItemOutcome::Success(response) => Some(response),
            BatchItemOutcome::Failed { .. } => None,
        }
    }

    /// The error message, when the item failed
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            BatchItemOutcome::Success(_) => None,
            BatchItemOutcome::Failed { error } => Some(error.as_str()),
        }
    }

    /// True when the item succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchItemOutcome::Success(_))
    }

    /// Parse one entry of a batch payload.
    ///
    /// An entry with a non-empty string `error` and no response fields is a
    /// failure; anything else must be a complete model response.
    fn parse(index: usize, entry: Value) -> Result<Self> {
        let Value::Object(mut fields) = entry else {
            return Err(ModelManagerError::deserialization(format!(
                "responses[{}] must be an object",
                index
            )));
        };

        let custom_id = take_custom_id(index, &mut fields)?;

        match fields.remove("error") {
            Some(Value::String(error)) if error.trim().is_empty() => {
                Err(ModelManagerError::deserialization(format!(
                    "responses[{}] ('{}'): error must not be blank",
                    index, custom_id
                )))
            }
            Some(Value::String(error)) => {
                let present: Vec<&str> = RESPONSE_FIELDS
                    .into_iter()
                    .filter(|field| fields.get(*field).is_some_and(|v| !v.is_null()))
                    .collect();
                if !present.is_empty() {
                    return Err(ModelManagerError::deserialization(format!(
                        "responses[{}] ('{}'): entry carries both an error and response fields ({})",
                        index,
                        custom_id,
                        present.join(", ")
                    )));
                }
                Ok(Self::failed(custom_id, error))
            }
            Some(Value::Null) | None => {
                let response: ModelResponse =
                    serde_json::from_value(Value::Object(fields)).map_err(|e| {
                        ModelManagerError::deserialization(format!(
                            "responses[{}] ('{}'): {}",
                            index, custom_id, e
                        ))
                    })?;
                Ok(Self::success(custom_id, response))
            }
            Some(other) => Err(ModelManagerError::deserialization(format!(
                "responses[{}] ('{}'): error must be a string, got {}",
                index,
                custom_id,
                json_type(&other)
            ))),
        }
    }
}

fn take_custom_id(index: usize, fields: &mut Map<String, Value>) -> Result<String> {
    match fields.remove("custom_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id),
        Some(Value::String(_)) => Err(ModelManagerError::deserialization(format!(
            "responses[{}]: custom_id must not be blank",
            index
        ))),
        Some(other) => Err(ModelManagerError::deserialization(format!(
            "responses[{}]: custom_id must be a string, got {}",
            index,
            json_type(&other)
        ))),
        None => Err(ModelManagerError::deserialization(format!(
            "responses[{}]: missing field `custom_id`",
            index
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Deserialize)]
struct RawBatchModelResponse {
    #[serde(default)]
    request_id: Option<String>,
    responses: Vec<Value>,
}

/// Ordered per-item results of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchModelResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(rename = "responses")]
    results: Vec<BatchItemResult>,
}

impl BatchModelResponse {
    /// Batch response from already-built results, kept in the given order
    pub fn new(request_id: Option<String>, results: Vec<BatchItemResult>) -> Self {
        Self { request_id, results }
    }

    /// Parse a backend batch payload, checking shape and id uniqueness only
    pub fn from_json(payload: &str) -> Result<Self> {
        let raw: RawBatchModelResponse =
            serde_json::from_str(payload).map_err(|e| rejected("batch response", e))?;
        Self::from_raw(raw)
    }

    /// Parse an already-decoded batch payload, checking shape and id uniqueness only
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawBatchModelResponse =
            serde_json::from_value(value).map_err(|e| rejected("batch response", e))?;
        Self::from_raw(raw)
    }

    /// Parse a backend batch payload answering `request`.
    ///
    /// Results come back in request order. Items the backend did not answer
    /// are marked failed with [`MISSING_ITEM_ERROR`]; ids the request never
    /// contained are rejected.
    pub fn from_json_for(payload: &str, request: &BatchModelRequest) -> Result<Self> {
        Self::from_json(payload)?.correlate(request)
    }

    /// Same as [`BatchModelResponse::from_json_for`] for an already-decoded payload
    pub fn from_value_for(value: Value, request: &BatchModelRequest) -> Result<Self> {
        Self::from_value(value)?.correlate(request)
    }

    fn from_raw(raw: RawBatchModelResponse) -> Result<Self> {
        let results = raw
            .responses
            .into_iter()
            .enumerate()
            .map(|(index, entry)| BatchItemResult::parse(index, entry))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| warn!(error = %e, "rejected batch response payload"))?;

        let mut seen = HashSet::with_capacity(results.len());
        for result in &results {
            if !seen.insert(result.custom_id.as_str()) {
                return Err(ModelManagerError::deserialization(format!(
                    "duplicate custom_id '{}' in batch response",
                    result.custom_id
                )));
            }
        }

        Ok(Self {
            request_id: raw.request_id,
            results,
        })
    }

    fn correlate(self, request: &BatchModelRequest) -> Result<Self> {
        let mut by_id: HashMap<String, BatchItemResult> = self
            .results
            .into_iter()
            .map(|result| (result.custom_id.clone(), result))
            .collect();

        let mut results = Vec::with_capacity(request.items().len());
        for item in request.items() {
            match by_id.remove(item.custom_id()) {
                Some(result) => {
                    if let Some(response) = result.response() {
                        response
                            .check_thinking(item.thinking_enabled())
                            .map_err(|e| {
                                ModelManagerError::deserialization(format!(
                                    "item '{}': {}",
                                    item.custom_id(),
                                    detail(e)
                                ))
                            })?;
                    }
                    results.push(result);
                }
                None => {
                    warn!(
                        custom_id = item.custom_id(),
                        "batch item missing from backend response, marking as failed"
                    );
                    results.push(BatchItemResult::failed(item.custom_id(), MISSING_ITEM_ERROR));
                }
            }
        }

        if !by_id.is_empty() {
            let mut unknown: Vec<String> = by_id.into_keys().collect();
            unknown.sort();
            return Err(ModelManagerError::deserialization(format!(
                "batch response contains ids not present in the request: {}",
                unknown.join(", ")
            )));
        }

        debug!(
            items = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "batch response correlated"
        );

        Ok(Self {
            request_id: self.request_id,
            results,
        })
    }

    /// Backend request id, if any
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// All results; in request order once correlated
    pub fn results(&self) -> &[BatchItemResult] {
        &self.results
    }

    /// Result for `custom_id`, if present
    pub fn result(&self, custom_id: &str) -> Option<&BatchItemResult> {
        self.results.iter().find(|r| r.custom_id == custom_id)
    }

    /// Results that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Results that failed, including items missing from the reply
    pub fn failed(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
