//! Window assembly: conversation + agent + memory log → bounded prompt
//! window.

use crate::model_budget::budget_for_model;
use fleet_core::{Identifier, MessageResource, Resource, ToolFunctionResource};
use fleet_error::FleetError;
use fleet_index::{MemoryIndex, ResourceIndex};
use std::collections::HashSet;
use std::sync::Arc;

/// A resolved `(messages, tools)` pair ready to hand to an LLM gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Ordered messages; element 0 is always the agent's message.
    pub messages: Vec<MessageResource>,
    /// Deduplicated tool definitions the agent may call.
    pub tools: Vec<ToolFunctionResource>,
    /// The token budget this window was assembled against.
    pub max_tokens: u32,
}

impl From<Window> for fleet_core::api::PromptWindow {
    fn from(window: Window) -> Self {
        Self {
            messages: window.messages,
            tools: window.tools,
            max_tokens: window.max_tokens,
        }
    }
}

/// Assembles [`Window`]s from a conversation's resource graph and memory
/// log, per the six-step algorithm: load conversation, load agent, place
/// the agent message first, walk memory in append order under budget,
/// resolve and dedup tools.
pub struct WindowBuilder {
    resources: Arc<ResourceIndex>,
}

impl WindowBuilder {
    /// Build a window assembler over `resources`.
    #[must_use]
    pub fn new(resources: Arc<ResourceIndex>) -> Self {
        Self { resources }
    }

    /// Assemble the window for `conversation_id` against `memory`, budgeted
    /// for `model`.
    ///
    /// Never fails on a memory/resource-index mismatch: identifiers that
    /// resolve to nothing, or to a non-`Message` resource, are silently
    /// skipped. Fails only if the conversation or agent resource itself is
    /// missing or malformed.
    pub async fn get_window(
        &self,
        conversation_id: &Identifier,
        memory: &MemoryIndex,
        model: &str,
    ) -> Result<Window, FleetError> {
        self.get_window_with_budget(conversation_id, memory, budget_for_model(model))
            .await
    }

    /// As [`Self::get_window`], but with an explicit token budget instead of
    /// one looked up from a model name. Exposed for callers (and tests) that
    /// already know their budget.
    pub async fn get_window_with_budget(
        &self,
        conversation_id: &Identifier,
        memory: &MemoryIndex,
        max_tokens: u32,
    ) -> Result<Window, FleetError> {
        let conversation = self.load_conversation(conversation_id).await?;
        let agent = self.load_agent(&conversation.agent_id).await?;

        let agent_message = MessageResource {
            id: agent.id.clone(),
            role: "assistant".to_string(),
            content: agent.system_message.clone(),
        };
        let mut cumulative = agent.id.tokens;
        let mut messages = vec![agent_message];
        let mut seen: HashSet<String> = HashSet::from([agent.id.to_canonical()]);

        for identifier in memory.list().await {
            let canonical = identifier.to_canonical();
            if seen.contains(&canonical) {
                continue;
            }
            let Some(resource) = self.resolve_one(&canonical).await else {
                tracing::debug!(identifier = %canonical, "memory entry not in resource index, skipping");
                continue;
            };
            let Resource::Message(message) = resource else {
                continue;
            };
            let candidate_total = cumulative + identifier.tokens;
            if candidate_total > max_tokens {
                break;
            }
            cumulative = candidate_total;
            seen.insert(canonical);
            messages.push(message);
        }

        let mut tools = Vec::new();
        let mut seen_tools: HashSet<String> = HashSet::new();
        for tool_id in &agent.tool_ids {
            let canonical = tool_id.to_canonical();
            if !seen_tools.insert(canonical.clone()) {
                continue;
            }
            if let Some(Resource::ToolFunction(tool)) = self.resolve_one(&canonical).await {
                tools.push(tool);
            }
        }

        Ok(Window {
            messages,
            tools,
            max_tokens,
        })
    }

    async fn resolve_one(&self, canonical: &str) -> Option<Resource> {
        self.resources
            .get(&[canonical.to_string()], None)
            .await
            .ok()
            .and_then(|mut found| if found.is_empty() { None } else { Some(found.remove(0)) })
    }

    async fn load_conversation(&self, id: &Identifier) -> Result<fleet_core::ConversationResource, FleetError> {
        match self.resolve_one(&id.to_canonical()).await {
            Some(Resource::Conversation(c)) => Ok(c),
            Some(_) => Err(FleetError::invalid_argument(format!("{id} is not a Conversation"))),
            None => Err(FleetError::not_found(format!("conversation {id} not found"))),
        }
    }

    async fn load_agent(&self, id: &Identifier) -> Result<fleet_core::AgentResource, FleetError> {
        match self.resolve_one(&id.to_canonical()).await {
            Some(Resource::Agent(a)) => Ok(a),
            Some(_) => Err(FleetError::invalid_argument(format!("{id} is not an Agent"))),
            None => Err(FleetError::not_found(format!("agent {id} not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{
        AGENT_TYPE, AgentResource, CONVERSATION_TYPE, ConversationResource, MESSAGE_TYPE, TOOL_FUNCTION_TYPE,
        ToolFunctionResource,
    };
    use fleet_storage::NullStore;

    fn id(ty: &str, name: &str, tokens: u32) -> Identifier {
        Identifier::new(ty, name).with_tokens(tokens)
    }

    async fn fixture() -> (Arc<ResourceIndex>, MemoryIndex, Identifier) {
        let store = Arc::new(NullStore::new());
        let resources = Arc::new(ResourceIndex::unrestricted(store.clone()));

        let tool_id = id(TOOL_FUNCTION_TYPE, "T", 0);
        resources
            .put(Resource::ToolFunction(ToolFunctionResource {
                id: tool_id.clone(),
                name: "search".into(),
                description: "search the web".into(),
                parameters: serde_json::json!({}),
            }))
            .await
            .unwrap();

        let agent_id = id(AGENT_TYPE, "A", 50);
        resources
            .put(Resource::Agent(AgentResource {
                id: agent_id.clone(),
                system_message: "You are a helpful agent.".into(),
                tool_ids: vec![tool_id],
            }))
            .await
            .unwrap();

        let conversation_id = id(CONVERSATION_TYPE, "c0", 0);
        resources
            .put(Resource::Conversation(ConversationResource {
                id: conversation_id.clone(),
                agent_id,
            }))
            .await
            .unwrap();

        let memory = MemoryIndex::new(store, format!("memories/{}", conversation_id.to_canonical()));

        for (name, tokens, content) in [("m1", 10, "hi"), ("m2", 20, "there"), ("m3", 30, "friend"), ("m4", 40, "!")] {
            let msg_id = id(MESSAGE_TYPE, name, tokens);
            resources
                .put(Resource::Message(fleet_core::MessageResource {
                    id: msg_id.clone(),
                    role: "user".into(),
                    content: content.into(),
                }))
                .await
                .unwrap();
            memory.add(msg_id).await.unwrap();
        }

        (resources, memory, conversation_id)
    }

    #[tokio::test]
    async fn memory_append_then_window_stops_before_budget_exceeded() {
        let (resources, memory, conversation_id) = fixture().await;
        let builder = WindowBuilder::new(resources);
        let window = builder
            .get_window_with_budget(&conversation_id, &memory, 100)
            .await
            .unwrap();

        let names: Vec<&str> = window.messages.iter().map(|m| m.id.name.as_str()).collect();
        assert_eq!(names, vec!["A", "m1", "m2"]);
        assert_eq!(window.tools.len(), 1);
        assert_eq!(window.tools[0].name, "search");
    }

    #[tokio::test]
    async fn agent_message_is_always_first() {
        let (resources, memory, conversation_id) = fixture().await;
        let builder = WindowBuilder::new(resources);
        let window = builder.get_window(&conversation_id, &memory, "gpt-4o").await.unwrap();
        assert_eq!(window.messages[0].role, "assistant");
        assert_eq!(window.messages[0].id.name, "A");
    }

    #[tokio::test]
    async fn duplicate_memory_entries_are_deduped() {
        let (resources, memory, conversation_id) = fixture().await;
        // Re-append an identifier that's already in the log.
        memory.add(id(MESSAGE_TYPE, "m1", 10)).await.unwrap();
        let builder = WindowBuilder::new(resources);
        let window = builder
            .get_window_with_budget(&conversation_id, &memory, 100)
            .await
            .unwrap();
        let m1_count = window.messages.iter().filter(|m| m.id.name == "m1").count();
        assert_eq!(m1_count, 1);
    }

    #[tokio::test]
    async fn non_message_and_unresolved_entries_are_skipped_silently() {
        let (resources, memory, conversation_id) = fixture().await;
        // A document in the memory log is not a message; an identifier with
        // no resource behind it resolves to nothing. Neither may fail the
        // build or consume budget.
        let doc_id = id("resource.Document", "d1", 500);
        resources
            .put(Resource::Document(fleet_core::DocumentResource {
                id: doc_id.clone(),
                content: "big".into(),
            }))
            .await
            .unwrap();
        memory.add(doc_id).await.unwrap();
        memory.add(id(MESSAGE_TYPE, "ghost", 500)).await.unwrap();

        let builder = WindowBuilder::new(resources);
        let window = builder
            .get_window_with_budget(&conversation_id, &memory, 100)
            .await
            .unwrap();
        let names: Vec<&str> = window.messages.iter().map(|m| m.id.name.as_str()).collect();
        assert_eq!(names, vec!["A", "m1", "m2"]);
    }

    #[tokio::test]
    async fn tools_are_deduped_by_identifier() {
        let store = Arc::new(NullStore::new());
        let resources = Arc::new(ResourceIndex::unrestricted(store.clone()));

        let tool_id = id(TOOL_FUNCTION_TYPE, "T", 0);
        resources
            .put(Resource::ToolFunction(ToolFunctionResource {
                id: tool_id.clone(),
                name: "search".into(),
                description: "search the web".into(),
                parameters: serde_json::json!({}),
            }))
            .await
            .unwrap();

        let agent_id = id(AGENT_TYPE, "A", 10);
        resources
            .put(Resource::Agent(AgentResource {
                id: agent_id.clone(),
                system_message: "hi".into(),
                tool_ids: vec![tool_id.clone(), tool_id],
            }))
            .await
            .unwrap();

        let conversation_id = id(CONVERSATION_TYPE, "c1", 0);
        resources
            .put(Resource::Conversation(ConversationResource {
                id: conversation_id.clone(),
                agent_id,
            }))
            .await
            .unwrap();

        let memory = MemoryIndex::new(store, "memories/c1");
        let builder = WindowBuilder::new(resources);
        let window = builder
            .get_window_with_budget(&conversation_id, &memory, 100)
            .await
            .unwrap();
        assert_eq!(window.tools.len(), 1);
    }

    #[tokio::test]
    async fn missing_conversation_is_an_error() {
        let store = Arc::new(NullStore::new());
        let resources = Arc::new(ResourceIndex::unrestricted(store.clone()));
        let memory = MemoryIndex::new(store, "memories/missing");
        let builder = WindowBuilder::new(resources);
        let missing = Identifier::new(CONVERSATION_TYPE, "nope");
        let err = builder.get_window(&missing, &memory, "gpt-4o").await.unwrap_err();
        assert_eq!(err.code, fleet_error::ErrorCode::NotFound);
    }
}
