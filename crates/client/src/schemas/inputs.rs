//! Request-side schema types
//!
//! Every type here is validated when it is constructed, whether through a
//! constructor, a builder or JSON deserialization, and is immutable
//! afterwards. Violations surface as [`ModelManagerError::Validation`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use model_manager_common::{ModelManagerError, Result, SchemaConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use super::detail;
use crate::enums::ProviderType;

// ============================================================================
// Text
// ============================================================================

/// A unit of textual content sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTextInput")]
pub struct TextInput {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Deserialize)]
struct RawTextInput {
    content: String,
    #[serde(default)]
    role: Option<String>,
}

impl TextInput {
    /// Create a text input. Content is kept exactly as given.
    pub fn new(content: impl Into<String>) -> Result<Self> {
        let input = Self {
            content: content.into(),
            role: None,
        };
        input.validate()?;
        Ok(input)
    }

    /// Tag this segment with a role or label
    pub fn with_role(mut self, role: impl Into<String>) -> Result<Self> {
        self.role = Some(role.into());
        self.validate()?;
        Ok(self)
    }

    /// Text exactly as given
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Role or label, if set
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(ModelManagerError::validation("text content must not be empty"));
        }
        if let Some(role) = &self.role {
            if role.trim().is_empty() {
                return Err(ModelManagerError::validation("text role must not be blank"));
            }
        }
        Ok(())
    }
}

impl TryFrom<RawTextInput> for TextInput {
    type Error = String;

    fn try_from(raw: RawTextInput) -> std::result::Result<Self, Self::Error> {
        let input = TextInput {
            content: raw.content,
            role: raw.role,
        };
        input.validate().map_err(detail)?;
        Ok(input)
    }
}

// ============================================================================
// Files
// ============================================================================

/// Where the bytes of a file input come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// File previously uploaded to the backend, addressed by id
    Reference(String),
    /// File bytes carried in the request
    Inline(Vec<u8>),
}

/// File content sent alongside text.
///
/// On the JSON surface exactly one of `file_id` or `data` (base64) is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFileInput", into = "RawFileInput")]
pub struct FileInput {
    source: FileSource,
    mime_type: String,
}

#[derive(Serialize, Deserialize)]
struct RawFileInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    mime_type: String,
}

impl FileInput {
    /// Reference a file already known to the backend
    pub fn by_reference(file_id: impl Into<String>, mime_type: impl Into<String>) -> Result<Self> {
        Self::from_source(FileSource::Reference(file_id.into()), mime_type.into())
    }

    /// Carry the file bytes inline
    pub fn inline(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Result<Self> {
        Self::from_source(FileSource::Inline(data.into()), mime_type.into())
    }

    /// Build from loosely-typed parts; exactly one of `file_id` or `data`
    /// must be given.
    pub fn from_parts(
        file_id: Option<String>,
        data: Option<Vec<u8>>,
        mime_type: impl Into<String>,
    ) -> Result<Self> {
        let source = match (file_id, data) {
            (Some(id), None) => FileSource::Reference(id),
            (None, Some(bytes)) => FileSource::Inline(bytes),
            (Some(_), Some(_)) => {
                return Err(ModelManagerError::validation(
                    "file input must set exactly one of file_id or data, got both",
                ));
            }
            (None, None) => {
                return Err(ModelManagerError::validation(
                    "file input must set exactly one of file_id or data, got neither",
                ));
            }
        };
        Self::from_source(source, mime_type.into())
    }

    fn from_source(source: FileSource, mime_type: String) -> Result<Self> {
        let input = Self { source, mime_type };
        input.validate()?;
        Ok(input)
    }

    /// Where the bytes come from
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Declared MIME type
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Backend file id, for referenced files
    pub fn file_id(&self) -> Option<&str> {
        match &self.source {
            FileSource::Reference(id) => Some(id.as_str()),
            FileSource::Inline(_) => None,
        }
    }

    /// Raw bytes, for inline files
    pub fn data(&self) -> Option<&[u8]> {
        match &self.source {
            FileSource::Reference(_) => None,
            FileSource::Inline(bytes) => Some(bytes.as_slice()),
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.source {
            FileSource::Reference(id) if id.trim().is_empty() => {
                return Err(ModelManagerError::validation("file_id must not be blank"));
            }
            FileSource::Inline(bytes) if bytes.is_empty() => {
                return Err(ModelManagerError::validation("inline file data must not be empty"));
            }
            _ => {}
        }

        if !is_well_formed_mime(&self.mime_type) {
            return Err(ModelManagerError::validation(format!(
                "invalid mime_type '{}', expected type/subtype[; name=value]",
                self.mime_type
            )));
        }

        Ok(())
    }
}

/// `type/subtype` with exactly one slash, optionally followed by
/// `; name=value` parameters.
fn is_well_formed_mime(mime_type: &str) -> bool {
    let mut parts = mime_type.split(';');
    let essence = parts.next().unwrap_or_default();

    let essence_ok = match essence.split_once('/') {
        Some((kind, subtype)) => {
            is_mime_token(kind) && is_mime_token(subtype) && !subtype.contains('/')
        }
        None => false,
    };

    essence_ok
        && parts.all(|param| match param.trim_start().split_once('=') {
            Some((name, value)) => is_mime_token(name) && !value.trim().is_empty(),
            None => false,
        })
}

fn is_mime_token(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(|c| c.is_whitespace() || c.is_control())
}

impl TryFrom<RawFileInput> for FileInput {
    type Error = String;

    fn try_from(raw: RawFileInput) -> std::result::Result<Self, Self::Error> {
        let data = raw
            .data
            .map(|encoded| BASE64.decode(encoded.as_bytes()))
            .transpose()
            .map_err(|e| format!("file data is not valid base64: {}", e))?;

        FileInput::from_parts(raw.file_id, data, raw.mime_type).map_err(detail)
    }
}

impl From<FileInput> for RawFileInput {
    fn from(input: FileInput) -> Self {
        let (file_id, data) = match input.source {
            FileSource::Reference(id) => (Some(id), None),
            FileSource::Inline(bytes) => (None, Some(BASE64.encode(bytes))),
        };
        RawFileInput {
            file_id,
            data,
            mime_type: input.mime_type,
        }
    }
}

// ============================================================================
// Content sequence
// ============================================================================

/// One entry of a request's ordered content sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text(TextInput),
    File(FileInput),
}

impl ContentItem {
    fn validate(&self) -> Result<()> {
        match self {
            ContentItem::Text(text) => text.validate(),
            ContentItem::File(file) => file.validate(),
        }
    }
}

impl From<TextInput> for ContentItem {
    fn from(text: TextInput) -> Self {
        ContentItem::Text(text)
    }
}

impl From<FileInput> for ContentItem {
    fn from(file: FileInput) -> Self {
        ContentItem::File(file)
    }
}

fn validate_contents(contents: &[ContentItem]) -> Result<()> {
    if contents.is_empty() {
        return Err(ModelManagerError::validation("contents must not be empty"));
    }
    for (index, item) in contents.iter().enumerate() {
        item.validate().map_err(|e| {
            ModelManagerError::validation(format!("contents[{}]: {}", index, detail(e)))
        })?;
    }
    Ok(())
}

// ============================================================================
// User context
// ============================================================================

/// Caller identity attached to a request. An empty context is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUserContext")]
pub struct UserContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_type: Option<String>,
}

#[derive(Deserialize)]
struct RawUserContext {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    client_type: Option<String>,
}

impl UserContext {
    /// Context with no identity fields
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Set the user id; a blank id is rejected
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Result<Self> {
        self.user_id = Some(user_id.into());
        self.validate()?;
        Ok(self)
    }

    /// Set the session id; a blank id is rejected
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Result<Self> {
        self.session_id = Some(session_id.into());
        self.validate()?;
        Ok(self)
    }

    /// Set the organization id; a blank id is rejected
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Result<Self> {
        self.org_id = Some(org_id.into());
        self.validate()?;
        Ok(self)
    }

    /// Set the calling client type; a blank value is rejected
    pub fn with_client_type(mut self, client_type: impl Into<String>) -> Result<Self> {
        self.client_type = Some(client_type.into());
        self.validate()?;
        Ok(self)
    }

    /// User id, if set
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Session id, if set
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Organization id, if set
    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    /// Client type, if set
    pub fn client_type(&self) -> Option<&str> {
        self.client_type.as_deref()
    }

    /// True when no identity field is set
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
            && self.session_id.is_none()
            && self.org_id.is_none()
            && self.client_type.is_none()
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
            ("org_id", &self.org_id),
            ("client_type", &self.client_type),
        ];
        for (name, value) in fields {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(ModelManagerError::validation(format!(
                    "user context {} must not be blank when present",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<RawUserContext> for UserContext {
    type Error = String;

    fn try_from(raw: RawUserContext) -> std::result::Result<Self, Self::Error> {
        let context = UserContext {
            user_id: raw.user_id,
            session_id: raw.session_id,
            org_id: raw.org_id,
            client_type: raw.client_type,
        };
        context.validate().map_err(detail)?;
        Ok(context)
    }
}

// ============================================================================
// Thinking
// ============================================================================

/// How much intermediate reasoning a model should expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingBudget {
    Off,
    Low,
    Medium,
    High,
}

/// Reasoning trace configuration.
///
/// A budget that contradicts the flag is rejected: any budget while
/// disabled, or `off` while enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThinkingConfig")]
pub struct ThinkingConfig {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    budget: Option<ThinkingBudget>,
}

#[derive(Deserialize)]
struct RawThinkingConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    budget: Option<ThinkingBudget>,
}

impl ThinkingConfig {
    /// Create a thinking config, rejecting a budget that contradicts `enabled`
    pub fn new(enabled: bool, budget: Option<ThinkingBudget>) -> Result<Self> {
        let config = Self { enabled, budget };
        config.validate()?;
        Ok(config)
    }

    /// Thinking disabled, no budget
    pub fn off() -> Self {
        Self {
            enabled: false,
            budget: None,
        }
    }

    /// Thinking enabled; without a budget the backend default applies
    pub fn on(budget: Option<ThinkingBudget>) -> Result<Self> {
        Self::new(true, budget)
    }

    /// Whether a reasoning trace is requested
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Requested budget, if any
    pub fn budget(&self) -> Option<ThinkingBudget> {
        self.budget
    }

    fn validate(&self) -> Result<()> {
        match (self.enabled, self.budget) {
            (false, Some(budget)) => Err(ModelManagerError::validation(format!(
                "thinking budget '{}' set while thinking is disabled",
                budget_name(budget)
            ))),
            (true, Some(ThinkingBudget::Off)) => Err(ModelManagerError::validation(
                "thinking budget 'off' set while thinking is enabled",
            )),
            _ => Ok(()),
        }
    }
}

impl TryFrom<RawThinkingConfig> for ThinkingConfig {
    type Error = String;

    fn try_from(raw: RawThinkingConfig) -> std::result::Result<Self, Self::Error> {
        ThinkingConfig::new(raw.enabled, raw.budget).map_err(detail)
    }
}

fn budget_name(budget: ThinkingBudget) -> &'static str {
    match budget {
        ThinkingBudget::Off => "off",
        ThinkingBudget::Low => "low",
        ThinkingBudget::Medium => "medium",
        ThinkingBudget::High => "high",
    }
}

// ============================================================================
// Generation parameters
// ============================================================================

/// Generic model parameters shared by single and batch requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature (0.0 - 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling (0.0 exclusive - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Provider-specific parameters passed through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl GenerationParams {
    /// True when no parameter is set
    pub fn is_empty(&self) -> bool {
        *self == GenerationParams::default()
    }

    /// Check every set parameter is within range
    pub fn validate(&self) -> Result<()> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ModelManagerError::validation(format!(
                    "temperature must be within [0, 2], got {}",
                    temperature
                )));
            }
        }

        if let Some(top_p) = self.top_p {
            if !(top_p > 0.0 && top_p <= 1.0) {
                return Err(ModelManagerError::validation(format!(
                    "top_p must be within (0, 1], got {}",
                    top_p
                )));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(ModelManagerError::validation("max_tokens must be > 0"));
        }

        if self.stop.iter().any(String::is_empty) {
            return Err(ModelManagerError::validation("stop sequences must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Shared field checks
// ============================================================================

fn parse_provider(provider: Option<&str>) -> Result<ProviderType> {
    provider
        .ok_or_else(|| ModelManagerError::validation("provider is required"))?
        .parse()
}

fn validate_model(model: String) -> Result<String> {
    if model.trim().is_empty() {
        return Err(ModelManagerError::validation("model must not be empty"));
    }
    Ok(model)
}

fn invalid_request(err: serde_json::Error) -> ModelManagerError {
    ModelManagerError::validation(format!("invalid request payload: {}", err))
}

// ============================================================================
// Single request
// ============================================================================

/// Canonical single-request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModelRequest")]
pub struct ModelRequest {
    provider: ProviderType,
    model: String,
    contents: Vec<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_context: Option<UserContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "GenerationParams::is_empty")]
    params: GenerationParams,
    stream: bool,
}

#[derive(Deserialize)]
struct RawModelRequest {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    contents: Vec<ContentItem>,
    #[serde(default)]
    user_context: Option<UserContext>,
    #[serde(default)]
    thinking: Option<ThinkingConfig>,
    #[serde(default)]
    params: GenerationParams,
    #[serde(default)]
    stream: bool,
}

impl ModelRequest {
    /// Start building a request
    pub fn builder() -> ModelRequestBuilder {
        ModelRequestBuilder::new()
    }

    /// Parse a caller-supplied JSON request
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(invalid_request)
    }

    /// Parse an already-decoded caller request
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(invalid_request)
    }

    fn validated(raw: RawModelRequest) -> Result<Self> {
        let provider = parse_provider(raw.provider.as_deref())?;
        let model = validate_model(raw.model)?;
        validate_contents(&raw.contents)?;
        if let Some(context) = &raw.user_context {
            context.validate()?;
        }
        if let Some(thinking) = &raw.thinking {
            thinking.validate()?;
        }
        raw.params.validate()?;

        debug!(
            provider = %provider,
            model = %model,
            contents = raw.contents.len(),
            "model request validated"
        );

        Ok(Self {
            provider,
            model,
            contents: raw.contents,
            user_context: raw.user_context,
            thinking: raw.thinking,
            params: raw.params,
            stream: raw.stream,
        })
    }

    /// Target provider
    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    /// Target model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ordered content sequence
    pub fn contents(&self) -> &[ContentItem] {
        &self.contents
    }

    /// Caller identity, if attached
    pub fn user_context(&self) -> Option<&UserContext> {
        self.user_context.as_ref()
    }

    /// Thinking configuration, if set
    pub fn thinking(&self) -> Option<&ThinkingConfig> {
        self.thinking.as_ref()
    }

    /// Whether the backend may return a reasoning trace for this request
    pub fn thinking_enabled(&self) -> bool {
        self.thinking.is_some_and(|t| t.is_enabled())
    }

    /// Generation parameters
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Whether a streaming response is requested
    pub fn is_stream(&self) -> bool {
        self.stream
    }
}

impl TryFrom<RawModelRequest> for ModelRequest {
    type Error = String;

    fn try_from(raw: RawModelRequest) -> std::result::Result<Self, Self::Error> {
        ModelRequest::validated(raw).map_err(detail)
    }
}

/// Builder for ModelRequest
#[derive(Debug, Default)]
pub struct ModelRequestBuilder {
    provider: Option<String>,
    model: String,
    contents: Vec<ContentItem>,
    user_context: Option<UserContext>,
    thinking: Option<ThinkingConfig>,
    params: GenerationParams,
    stream: bool,
}

impl ModelRequestBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider
    pub fn provider(mut self, provider: ProviderType) -> Self {
        self.provider = Some(provider.as_str().to_string());
        self
    }

    /// Set the provider by wire name; unknown names fail at `build`
    pub fn provider_name(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Append a text segment
    pub fn text(self, content: impl Into<String>) -> Self {
        self.content(ContentItem::Text(TextInput {
            content: content.into(),
            role: None,
        }))
    }

    /// Append a text segment tagged with a role
    pub fn text_with_role(self, content: impl Into<String>, role: impl Into<String>) -> Self {
        self.content(ContentItem::Text(TextInput {
            content: content.into(),
            role: Some(role.into()),
        }))
    }

    /// Append a file
    pub fn file(self, file: FileInput) -> Self {
        self.content(ContentItem::File(file))
    }

    /// Append any content item
    pub fn content(mut self, item: impl Into<ContentItem>) -> Self {
        self.contents.push(item.into());
        self
    }

    /// Replace the whole content sequence
    pub fn contents(mut self, contents: Vec<ContentItem>) -> Self {
        self.contents = contents;
        self
    }

    /// Attach caller identity
    pub fn user_context(mut self, context: UserContext) -> Self {
        self.user_context = Some(context);
        self
    }

    /// Set the thinking configuration
    pub fn thinking(mut self, thinking: ThinkingConfig) -> Self {
        self.thinking = Some(thinking);
        self
    }

    /// Replace all generation parameters
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    /// Set the token limit
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.params.max_tokens = Some(tokens);
        self
    }

    /// Set nucleus sampling
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.params.top_p = Some(top_p);
        self
    }

    /// Set stop sequences
    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.params.stop = stop;
        self
    }

    /// Add a provider-specific parameter
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.extra.insert(key.into(), value);
        self
    }

    /// Request a streaming response
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Validate and build the request
    pub fn build(self) -> Result<ModelRequest> {
        ModelRequest::validated(RawModelRequest {
            provider: self.provider,
            model: self.model,
            contents: self.contents,
            user_context: self.user_context,
            thinking: self.thinking,
            params: self.params,
            stream: self.stream,
        })
    }
}

// ============================================================================
// Batch request
// ============================================================================

/// One entry of a batch, correlated with its response by `custom_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBatchModelRequestItem")]
pub struct BatchModelRequestItem {
    custom_id: String,
    contents: Vec<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "GenerationParams::is_empty")]
    params: GenerationParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<i32>,
}

#[derive(Deserialize)]
struct RawBatchModelRequestItem {
    custom_id: String,
    #[serde(default)]
    contents: Vec<ContentItem>,
    #[serde(default)]
    thinking: Option<ThinkingConfig>,
    #[serde(default)]
    params: GenerationParams,
    #[serde(default)]
    priority: Option<i32>,
}

impl BatchModelRequestItem {
    /// Start building a batch item
    pub fn builder() -> BatchModelRequestItemBuilder {
        BatchModelRequestItemBuilder::new()
    }

    fn validated(raw: RawBatchModelRequestItem) -> Result<Self> {
        if raw.custom_id.trim().is_empty() {
            return Err(ModelManagerError::validation("batch item custom_id must not be blank"));
        }

        let checks = || -> Result<()> {
            validate_contents(&raw.contents)?;
            if let Some(thinking) = &raw.thinking {
                thinking.validate()?;
            }
            raw.params.validate()
        };
        checks().map_err(|e| {
            ModelManagerError::validation(format!("item '{}': {}", raw.custom_id, detail(e)))
        })?;

        Ok(Self {
            custom_id: raw.custom_id,
            contents: raw.contents,
            thinking: raw.thinking,
            params: raw.params,
            priority: raw.priority,
        })
    }

    /// Id used to correlate the item with its result
    pub fn custom_id(&self) -> &str {
        &self.custom_id
    }

    /// Ordered content sequence
    pub fn contents(&self) -> &[ContentItem] {
        &self.contents
    }

    /// Thinking configuration, if set
    pub fn thinking(&self) -> Option<&ThinkingConfig> {
        self.thinking.as_ref()
    }

    /// Whether the backend may return a reasoning trace for this item
    pub fn thinking_enabled(&self) -> bool {
        self.thinking.is_some_and(|t| t.is_enabled())
    }

    /// Generation parameters
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Scheduling priority hint, if set
    pub fn priority(&self) -> Option<i32> {
        self.priority
    }
}

impl TryFrom<RawBatchModelRequestItem> for BatchModelRequestItem {
    type Error = String;

    fn try_from(raw: RawBatchModelRequestItem) -> std::result::Result<Self, Self::Error> {
        BatchModelRequestItem::validated(raw).map_err(detail)
    }
}

/// Builder for BatchModelRequestItem
///
/// Without an explicit `custom_id` a UUID v4 is generated.
#[derive(Debug, Default)]
pub struct BatchModelRequestItemBuilder {
    custom_id: Option<String>,
    contents: Vec<ContentItem>,
    thinking: Option<ThinkingConfig>,
    params: GenerationParams,
    priority: Option<i32>,
}

impl BatchModelRequestItemBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the correlation id
    pub fn custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }

    /// Append a text segment
    pub fn text(self, content: impl Into<String>) -> Self {
        self.content(ContentItem::Text(TextInput {
            content: content.into(),
            role: None,
        }))
    }

    /// Append a file
    pub fn file(self, file: FileInput) -> Self {
        self.content(ContentItem::File(file))
    }

    /// Append any content item
    pub fn content(mut self, item: impl Into<ContentItem>) -> Self {
        self.contents.push(item.into());
        self
    }

    /// Set the thinking configuration
    pub fn thinking(mut self, thinking: ThinkingConfig) -> Self {
        self.thinking = Some(thinking);
        self
    }

    /// Replace all generation parameters
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    /// Set the token limit
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.params.max_tokens = Some(tokens);
        self
    }

    /// Set the scheduling priority hint
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Validate and build the item, generating an id if none was set
    pub fn build(self) -> Result<BatchModelRequestItem> {
        BatchModelRequestItem::validated(RawBatchModelRequestItem {
            custom_id: self
                .custom_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            contents: self.contents,
            thinking: self.thinking,
            params: self.params,
            priority: self.priority,
        })
    }
}

/// Batch of items sharing one provider/model target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchModelRequest {
    provider: ProviderType,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_context: Option<UserContext>,
    items: Vec<BatchModelRequestItem>,
}

#[derive(Deserialize)]
struct RawBatchModelRequest {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    user_context: Option<UserContext>,
    #[serde(default)]
    items: Vec<BatchModelRequestItem>,
}

impl BatchModelRequest {
    /// Start building a batch
    pub fn builder() -> BatchModelRequestBuilder {
        BatchModelRequestBuilder::new()
    }

    /// Parse a caller-supplied JSON batch, enforcing the configured size limit
    pub fn from_json(payload: &str, config: &SchemaConfig) -> Result<Self> {
        let raw: RawBatchModelRequest = serde_json::from_str(payload).map_err(invalid_request)?;
        Self::validated(raw, config)
    }

    /// Parse an already-decoded caller batch, enforcing the configured size limit
    pub fn from_value(value: Value, config: &SchemaConfig) -> Result<Self> {
        let raw: RawBatchModelRequest = serde_json::from_value(value).map_err(invalid_request)?;
        Self::validated(raw, config)
    }

    fn validated(raw: RawBatchModelRequest, config: &SchemaConfig) -> Result<Self> {
        let provider = parse_provider(raw.provider.as_deref())?;
        let model = validate_model(raw.model)?;

        if raw.items.is_empty() {
            return Err(ModelManagerError::validation("batch must contain at least one item"));
        }
        if raw.items.len() > config.max_batch_size {
            return Err(ModelManagerError::validation(format!(
                "batch size {} exceeds the maximum of {}",
                raw.items.len(),
                config.max_batch_size
            )));
        }
        check_unique_ids(&raw.items)?;

        if let Some(context) = &raw.user_context {
            context.validate()?;
        }

        debug!(
            provider = %provider,
            model = %model,
            items = raw.items.len(),
            "batch model request validated"
        );

        Ok(Self {
            provider,
            model,
            user_context: raw.user_context,
            items: raw.items,
        })
    }

    /// Target provider shared by every item
    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    /// Target model shared by every item
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Caller identity, if attached
    pub fn user_context(&self) -> Option<&UserContext> {
        self.user_context.as_ref()
    }

    /// Items in submission order
    pub fn items(&self) -> &[BatchModelRequestItem] {
        &self.items
    }

    /// Item with the given `custom_id`
    pub fn item(&self, custom_id: &str) -> Option<&BatchModelRequestItem> {
        self.items.iter().find(|item| item.custom_id == custom_id)
    }
}

fn check_unique_ids(items: &[BatchModelRequestItem]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.custom_id.as_str()) {
            return Err(ModelManagerError::validation(format!(
                "duplicate custom_id '{}' in batch",
                item.custom_id
            )));
        }
    }
    Ok(())
}

/// Builder for BatchModelRequest
#[derive(Debug, Default)]
pub struct BatchModelRequestBuilder {
    provider: Option<String>,
    model: String,
    user_context: Option<UserContext>,
    items: Vec<BatchModelRequestItem>,
}

impl BatchModelRequestBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider
    pub fn provider(mut self, provider: ProviderType) -> Self {
        self.provider = Some(provider.as_str().to_string());
        self
    }

    /// Set the provider by wire name; unknown names fail at `build`
    pub fn provider_name(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Attach caller identity
    pub fn user_context(mut self, context: UserContext) -> Self {
        self.user_context = Some(context);
        self
    }

    /// Append an item
    pub fn item(mut self, item: BatchModelRequestItem) -> Self {
        self.items.push(item);
        self
    }

    /// Replace all items
    pub fn items(mut self, items: Vec<BatchModelRequestItem>) -> Self {
        self.items = items;
        self
    }

    /// Validate and build the batch against the configured size limit
    pub fn build(self, config: &SchemaConfig) -> Result<BatchModelRequest> {
        BatchModelRequest::validated(
            RawBatchModelRequest {
                provider: self.provider,
                model: self.model,
                user_context: self.user_context,
                items: self.items,
            },
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hello_request() -> Result<ModelRequest> {
        ModelRequest::builder()
            .provider_name("openai")
            .model("gpt-4o")
            .text("hello")
            .build()
    }

    fn item(id: &str) -> BatchModelRequestItem {
        BatchModelRequestItem::builder()
            .custom_id(id)
            .text(format!("prompt for {}", id))
            .build()
            .unwrap()
    }

    #[test]
    fn test_text_input_preserves_content() {
        for content in ["hello", "  padded  ", "多语言 ✓", "\n", "a\u{0}b"] {
            let input = TextInput::new(content).unwrap();
            assert_eq!(input.content(), content);
            assert_eq!(input.role(), None);
        }
    }

    #[test]
    fn test_text_input_rejects_empty() {
        assert!(TextInput::new("").unwrap_err().is_validation());
        let err = TextInput::new("hi").unwrap().with_role("  ").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_text_input_rejects_non_string_content() {
        let err = ModelRequest::from_value(json!({
            "provider": "openai",
            "model": "gpt-4o",
            "contents": [{"type": "text", "content": 42}]
        }))
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_file_input_requires_exactly_one_source() {
        let both = FileInput::from_parts(Some("file-1".into()), Some(b"pdf".to_vec()), "application/pdf");
        assert!(both.unwrap_err().is_validation());

        let neither = FileInput::from_parts(None, None, "application/pdf");
        assert!(neither.unwrap_err().is_validation());

        let reference = FileInput::from_parts(Some("file-1".into()), None, "application/pdf").unwrap();
        assert_eq!(reference.file_id(), Some("file-1"));
        assert_eq!(reference.data(), None);
    }

    #[test]
    fn test_file_input_json_sources() {
        let inline: FileInput =
            serde_json::from_value(json!({"data": "aGVsbG8=", "mime_type": "text/plain"})).unwrap();
        assert_eq!(inline.source(), &FileSource::Inline(b"hello".to_vec()));

        let both = serde_json::from_value::<FileInput>(json!({
            "file_id": "file-1",
            "data": "aGVsbG8=",
            "mime_type": "text/plain"
        }));
        assert!(both.is_err());

        let neither = serde_json::from_value::<FileInput>(json!({"mime_type": "text/plain"}));
        assert!(neither.is_err());

        let bad_base64 =
            serde_json::from_value::<FileInput>(json!({"data": "%%%", "mime_type": "text/plain"}));
        assert!(bad_base64.is_err());
    }

    #[test]
    fn test_file_input_serializes_inline_as_base64() {
        let file = FileInput::inline(b"hello".to_vec(), "text/plain").unwrap();
        let value = serde_json::to_value(ContentItem::File(file)).unwrap();
        assert_eq!(
            value,
            json!({"type": "file", "data": "aGVsbG8=", "mime_type": "text/plain"})
        );
    }

    #[test]
    fn test_file_input_rejects_bad_mime_and_empty_sources() {
        assert!(FileInput::by_reference("file-1", "pdf").is_err());
        assert!(FileInput::by_reference("file-1", "image/ png").is_err());
        assert!(FileInput::by_reference("  ", "image/png").is_err());
        assert!(FileInput::inline(Vec::new(), "image/png").is_err());
        assert!(FileInput::inline(vec![0x89, 0x50], "image/png").is_ok());
    }

    #[test]
    fn test_file_input_mime_parameters() {
        for mime in ["text/plain; charset=utf-8", "text/plain;charset=utf-8", "application/vnd.api+json"] {
            assert!(FileInput::by_reference("file-1", mime).is_ok(), "{} should be accepted", mime);
        }
        for mime in ["a/b/c", "/plain", "text/", "text/plain;", "text/plain; charset", "text/plain; =utf-8"] {
            let err = FileInput::by_reference("file-1", mime).unwrap_err();
            assert!(err.is_validation(), "{} should be rejected", mime);
        }
    }

    #[test]
    fn test_user_context() {
        let anonymous = UserContext::anonymous();
        assert!(anonymous.is_anonymous());

        let context = UserContext::anonymous()
            .with_user_id("u-1")
            .and_then(|c| c.with_org_id("org-9"))
            .unwrap();
        assert!(!context.is_anonymous());
        assert_eq!(context.user_id(), Some("u-1"));
        assert_eq!(context.org_id(), Some("org-9"));
        assert_eq!(context.session_id(), None);

        let context = UserContext::anonymous().with_client_type("cli").unwrap();
        assert_eq!(context.client_type(), Some("cli"));
        assert!(!context.is_anonymous());
        assert!(UserContext::anonymous().with_client_type(" ").unwrap_err().is_validation());

        assert!(UserContext::anonymous().with_session_id("").is_err());
        assert!(serde_json::from_value::<UserContext>(json!({"user_id": " "})).is_err());
    }

    #[test]
    fn test_thinking_budget_requires_enabled() {
        let err = ThinkingConfig::new(false, Some(ThinkingBudget::High)).unwrap_err();
        assert!(err.is_validation());

        let err = ThinkingConfig::on(Some(ThinkingBudget::Off)).unwrap_err();
        assert!(err.is_validation());

        let config = ThinkingConfig::on(Some(ThinkingBudget::Medium)).unwrap();
        assert!(config.is_enabled());
        assert_eq!(config.budget(), Some(ThinkingBudget::Medium));

        assert!(ThinkingConfig::on(None).is_ok());
        assert!(!ThinkingConfig::off().is_enabled());
    }

    #[test]
    fn test_thinking_budget_rejected_from_json() {
        let err = ModelRequest::from_value(json!({
            "provider": "anthropic",
            "model": "claude",
            "contents": [{"type": "text", "content": "hi"}],
            "thinking": {"enabled": false, "budget": "high"}
        }))
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_model_request_scenario() {
        let request = hello_request().unwrap();
        assert_eq!(request.provider(), ProviderType::OpenAi);
        assert_eq!(request.model(), "gpt-4o");
        assert_eq!(request.contents().len(), 1);
        assert!(!request.thinking_enabled());
        assert!(!request.is_stream());
    }

    #[test]
    fn test_model_request_is_deterministic() {
        assert_eq!(hello_request().unwrap(), hello_request().unwrap());
    }

    #[test]
    fn test_model_request_rejects_unknown_provider() {
        for provider in ["mistral", "OPENAI", ""] {
            let err = ModelRequest::builder()
                .provider_name(provider)
                .model("m")
                .text("hi")
                .build()
                .unwrap_err();
            assert!(err.is_validation());

            let err = ModelRequest::from_value(json!({
                "provider": provider,
                "model": "m",
                "contents": [{"type": "text", "content": "hi"}]
            }))
            .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_model_request_required_fields() {
        let missing_provider = ModelRequest::builder().model("gpt-4o").text("hi").build();
        assert!(missing_provider.unwrap_err().to_string().contains("provider is required"));

        let empty_contents = ModelRequest::builder()
            .provider(ProviderType::Google)
            .model("gemini")
            .build();
        assert!(empty_contents.unwrap_err().to_string().contains("contents"));

        let blank_model = ModelRequest::builder()
            .provider(ProviderType::Google)
            .model(" ")
            .text("hi")
            .build();
        assert!(blank_model.is_err());

        let empty_text = ModelRequest::builder()
            .provider(ProviderType::Google)
            .model("gemini")
            .text("hi")
            .text("")
            .build()
            .unwrap_err();
        assert!(empty_text.to_string().contains("contents[1]"));
    }

    #[test]
    fn test_model_request_params_ranges() {
        let base = || {
            ModelRequest::builder()
                .provider(ProviderType::DeepSeek)
                .model("deepseek-chat")
                .text("hi")
        };

        assert!(base().temperature(0.7).max_tokens(256).top_p(0.9).build().is_ok());
        assert!(base().temperature(2.5).build().is_err());
        assert!(base().temperature(f32::NAN).build().is_err());
        assert!(base().top_p(0.0).build().is_err());
        assert!(base().max_tokens(0).build().is_err());
        assert!(base().stop(vec![String::new()]).build().is_err());
    }

    #[test]
    fn test_model_request_json_round_trip() {
        let request = ModelRequest::builder()
            .provider(ProviderType::Anthropic)
            .model("claude-sonnet")
            .text_with_role("be brief", "system")
            .file(FileInput::by_reference("file-42", "application/pdf").unwrap())
            .user_context(UserContext::anonymous().with_user_id("u-1").unwrap())
            .thinking(ThinkingConfig::on(Some(ThinkingBudget::High)).unwrap())
            .temperature(0.5)
            .extra("anthropic_beta", json!(["pdfs"]))
            .stream(true)
            .build()
            .unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["provider"], "anthropic");
        assert_eq!(value["contents"][0]["type"], "text");
        assert_eq!(value["contents"][1]["file_id"], "file-42");
        assert_eq!(value["thinking"]["budget"], "high");

        let parsed = ModelRequest::from_value(value).unwrap();
        assert_eq!(parsed, request);
        assert!(parsed.thinking_enabled());
    }

    #[test]
    fn test_batch_rejects_duplicate_ids() {
        let err = BatchModelRequest::builder()
            .provider(ProviderType::OpenAi)
            .model("gpt-4o")
            .item(item("a"))
            .item(item("a"))
            .build(&SchemaConfig::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_batch_rejects_duplicate_ids_from_json() {
        let payload = r#"{
            "provider": "openai",
            "model": "gpt-4o",
            "items": [
                {"custom_id": "a", "contents": [{"type": "text", "content": "one"}]},
                {"custom_id": "a", "contents": [{"type": "text", "content": "two"}]}
            ]
        }"#;
        let err = BatchModelRequest::from_json(payload, &SchemaConfig::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_batch_size_limits() {
        let config = SchemaConfig { max_batch_size: 2 };
        let builder = || {
            BatchModelRequest::builder()
                .provider(ProviderType::Perplexity)
                .model("sonar")
        };

        assert!(builder().build(&config).unwrap_err().is_validation());
        assert!(builder().item(item("a")).item(item("b")).build(&config).is_ok());

        let err = builder()
            .items(vec![item("a"), item("b"), item("c")])
            .build(&config)
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_batch_item_generated_ids_are_unique() {
        let first = BatchModelRequestItem::builder().text("one").build().unwrap();
        let second = BatchModelRequestItem::builder().text("two").build().unwrap();
        assert_ne!(first.custom_id(), second.custom_id());

        let batch = BatchModelRequest::builder()
            .provider(ProviderType::OpenAi)
            .model("gpt-4o")
            .items(vec![first, second])
            .build(&SchemaConfig::default())
            .unwrap();
        assert_eq!(batch.items().len(), 2);
    }

    #[test]
    fn test_batch_item_validation() {
        let empty = BatchModelRequestItem::builder().custom_id("x").build();
        let err = empty.unwrap_err();
        assert!(err.to_string().contains("item 'x'"));

        assert!(BatchModelRequestItem::builder().custom_id(" ").text("hi").build().is_err());

        let item = BatchModelRequestItem::builder()
            .custom_id("p")
            .text("hi")
            .thinking(ThinkingConfig::on(None).unwrap())
            .priority(5)
            .build()
            .unwrap();
        assert!(item.thinking_enabled());
        assert_eq!(item.priority(), Some(5));
    }

    #[test]
    fn test_schema_types_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<ModelRequest>();
        assert_send_sync::<ModelRequestBuilder>();
        assert_send_sync::<BatchModelRequest>();
        assert_send_sync::<BatchModelRequestItem>();
        assert_send_sync::<ContentItem>();
        assert_send_sync::<UserContext>();
        assert_send_sync::<crate::schemas::ModelResponse>();
        assert_send_sync::<crate::schemas::BatchModelResponse>();
        assert_send_sync::<ModelManagerError>();
    }

    #[test]
    fn test_batch_json_round_trip() {
        let config = SchemaConfig::default();
        let batch = BatchModelRequest::builder()
            .provider(ProviderType::Google)
            .model("gemini-2.5-pro")
            .user_context(UserContext::anonymous().with_org_id("org-1").unwrap())
            .item(item("a"))
            .item(item("b"))
            .build(&config)
            .unwrap();

        let value = serde_json::to_value(&batch).unwrap();
        let parsed = BatchModelRequest::from_value(value, &config).unwrap();
        assert_eq!(parsed, batch);
        assert_eq!(parsed.item("b").map(|i| i.custom_id()), Some("b"));
    }
}
