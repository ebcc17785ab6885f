//! Schema definitions for the Model Manager API
//!
//! `inputs` holds the request side (validated on construction), `outputs`
//! holds the canonical responses parsed from backend payloads.

pub mod inputs;
pub mod outputs;

pub use inputs::{
    BatchModelRequest, BatchModelRequestBuilder, BatchModelRequestItem,
    BatchModelRequestItemBuilder, ContentItem, FileInput, FileSource, GenerationParams,
    ModelRequest, ModelRequestBuilder, TextInput, ThinkingBudget, ThinkingConfig, UserContext,
};
pub use outputs::{BatchItemOutcome, BatchItemResult, BatchModelResponse, ModelResponse, Usage};

use model_manager_common::ModelManagerError;

/// Bare message of a schema error, for places where serde or a caller
/// already adds its own context.
pub(crate) fn detail(err: ModelManagerError) -> String {
    match err {
        ModelManagerError::Validation(msg)
        | ModelManagerError::Deserialization(msg)
        | ModelManagerError::Config(msg) => msg,
        other => other.to_string(),
    }
}
