//! Identifier, Resource, and Span contract types shared by every fleet
//! service.
//!
//! If you only take one dependency across the fleet crates, take this one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Wire shapes for the fleet's service surfaces.
pub mod api;
/// Resource identifiers and their canonical string encoding.
pub mod identifier;
/// Typed JSON resources and the resource-kind registry.
pub mod resource;
/// Distributed-trace span type.
pub mod span;

pub use identifier::{Identifier, ParseIdentifierError};
pub use resource::{
    AGENT_TYPE, AgentResource, CONVERSATION_TYPE, ConversationResource, DOCUMENT_TYPE,
    DocumentResource, MESSAGE_TYPE, MessageResource, Resource, TOOL_FUNCTION_TYPE,
    ToolFunctionResource, UnknownTypeError, resource_from_json,
};
pub use span::{Span, SpanEvent, SpanKind, SpanStatus, StatusCode};
