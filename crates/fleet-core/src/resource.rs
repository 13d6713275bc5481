//! Typed JSON resources addressed by an [`Identifier`].
//!
//! The source system distinguishes resources by a duck-typed `type` string;
//! here each concrete resource is its own variant under [`Resource`], with
//! [`resource_from_json`] acting as the registry that maps a type tag back
//! to its variant constructor.

use crate::Identifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// A chat message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResource {
    /// This resource's identifier.
    pub id: Identifier,
    /// `"user"`, `"assistant"`, `"tool"`, etc.
    pub role: String,
    /// Message body.
    pub content: String,
}

/// An agent definition: its system message, tools, and declared cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResource {
    /// This resource's identifier.
    pub id: Identifier,
    /// System/assistant message content placed first in any window.
    pub system_message: String,
    /// Tool identifiers (`tool.ToolFunction.*`) this agent may call.
    pub tool_ids: Vec<Identifier>,
}

/// A conversation: a pointer to its agent and, implicitly, its memory log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationResource {
    /// This resource's identifier.
    pub id: Identifier,
    /// The agent driving this conversation.
    pub agent_id: Identifier,
}

/// A callable tool definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolFunctionResource {
    /// This resource's identifier.
    pub id: Identifier,
    /// Tool name as exposed to the model.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

/// An opaque document resource (e.g. ingested knowledge).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentResource {
    /// This resource's identifier.
    pub id: Identifier,
    /// Document body.
    pub content: String,
}

/// Tagged union over the concrete resource kinds in current use.
///
/// Storage round-trips go through [`Resource::to_json`] /
/// [`resource_from_json`] rather than `derive(Serialize)`, because the
/// on-disk shape is the flat payload (`{"id": ..., "role": ..., ...}`), not
/// an internally-tagged enum wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// `common.Message`
    Message(MessageResource),
    /// `common.Agent`
    Agent(AgentResource),
    /// `common.Conversation`
    Conversation(ConversationResource),
    /// `tool.ToolFunction`
    ToolFunction(ToolFunctionResource),
    /// `resource.Document`
    Document(DocumentResource),
}

/// An unrecognized `id.type` tag was presented to the resource registry.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown resource type {0:?}")]
pub struct UnknownTypeError(pub String);

impl Resource {
    /// The identifier shared by every variant.
    #[must_use]
    pub fn id(&self) -> &Identifier {
        match self {
            Self::Message(r) => &r.id,
            Self::Agent(r) => &r.id,
            Self::Conversation(r) => &r.id,
            Self::ToolFunction(r) => &r.id,
            Self::Document(r) => &r.id,
        }
    }

    /// Ensure the resource carries a generated identifier name.
    ///
    /// If `id.name` is empty, a stable content hash of the serialized
    /// payload is used when the resource is deterministic (messages,
    /// documents, tool functions); otherwise a fresh UUID is assigned.
    pub fn ensure_identifier(&mut self) {
        let needs_name = self.id().name.is_empty();
        if !needs_name {
            return;
        }
        let name = match self {
            Self::Message(r) => Identifier::content_hash(r.content.as_bytes()),
            Self::Document(r) => Identifier::content_hash(r.content.as_bytes()),
            Self::ToolFunction(r) => Identifier::content_hash(r.name.as_bytes()),
            Self::Agent(_) | Self::Conversation(_) => Uuid::new_v4().to_string(),
        };
        match self {
            Self::Message(r) => r.id.name = name,
            Self::Agent(r) => r.id.name = name,
            Self::Conversation(r) => r.id.name = name,
            Self::ToolFunction(r) => r.id.name = name,
            Self::Document(r) => r.id.name = name,
        }
    }

    /// Flatten into the on-disk JSON shape (no enum wrapper).
    pub fn to_json(&self) -> Value {
        match self {
            Self::Message(r) => serde_json::to_value(r),
            Self::Agent(r) => serde_json::to_value(r),
            Self::Conversation(r) => serde_json::to_value(r),
            Self::ToolFunction(r) => serde_json::to_value(r),
            Self::Document(r) => serde_json::to_value(r),
        }
        .expect("resource payloads are always serializable")
    }
}

/// Canonical type tag used in an [`Identifier`] for each resource kind.
pub const MESSAGE_TYPE: &str = "common.Message";
/// See [`MESSAGE_TYPE`].
pub const AGENT_TYPE: &str = "common.Agent";
/// See [`MESSAGE_TYPE`].
pub const CONVERSATION_TYPE: &str = "common.Conversation";
/// See [`MESSAGE_TYPE`].
pub const TOOL_FUNCTION_TYPE: &str = "tool.ToolFunction";
/// See [`MESSAGE_TYPE`].
pub const DOCUMENT_TYPE: &str = "resource.Document";

/// Reconstruct a [`Resource`] from its stored JSON representation, using
/// `id.type` to select which variant to deserialize into.
///
/// This is the registry referenced by the resource index's deserialization
/// helper: unknown tags fail with [`UnknownTypeError`] rather than silently
/// falling back to a generic shape.
pub fn resource_from_json(json: Value) -> Result<Resource, UnknownTypeError> {
    let type_tag = json
        .get("id")
        .and_then(|id| id.get("type"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    let build = |value: Value| -> Result<Resource, UnknownTypeError> {
        match type_tag.as_str() {
            MESSAGE_TYPE => serde_json::from_value(value)
                .map(Resource::Message)
                .map_err(|_| UnknownTypeError(type_tag.clone())),
            AGENT_TYPE => serde_json::from_value(value)
                .map(Resource::Agent)
                .map_err(|_| UnknownTypeError(type_tag.clone())),
            CONVERSATION_TYPE => serde_json::from_value(value)
                .map(Resource::Conversation)
                .map_err(|_| UnknownTypeError(type_tag.clone())),
            TOOL_FUNCTION_TYPE => serde_json::from_value(value)
                .map(Resource::ToolFunction)
                .map_err(|_| UnknownTypeError(type_tag.clone())),
            DOCUMENT_TYPE => serde_json::from_value(value)
                .map(Resource::Document)
                .map_err(|_| UnknownTypeError(type_tag.clone())),
            other => Err(UnknownTypeError(other.to_string())),
        }
    };
    build(json)
}
