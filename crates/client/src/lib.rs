//! Model Manager Client
//!
//! Typed request/response schema layer for the Model Manager gRPC service.
//! Requests are validated once at construction and are immutable afterwards;
//! backend payloads are parsed into canonical responses without coercion.

pub mod enums;
pub mod schemas;

pub use enums::ProviderType;
pub use model_manager_common::{ModelManagerError, Result, SchemaConfig};
pub use schemas::{
    BatchItemOutcome, BatchItemResult, BatchModelRequest, BatchModelRequestItem,
    BatchModelResponse, ContentItem, FileInput, FileSource, GenerationParams, ModelRequest,
    ModelResponse, TextInput, ThinkingBudget, ThinkingConfig, Usage, UserContext,
};
