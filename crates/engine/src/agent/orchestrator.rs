//! Tool-call loop & turn orchestrator (spec §4.3/§4.1, component C5):
//! drives the LLM to completion, dispatching any tool calls it makes against
//! the player's inventory and feeding the results back, until it produces a
//! final narration+JSON turn. Enforces the spec §4.3 postcondition that no
//! non-final assistant message is ever empty of both content and tool calls.
//!
//! Grounded on the teacher's `use_cases::agent::run_turn` iterate-until-done
//! loop, adapted from the teacher's single non-streaming call to this spec's
//! dual streaming/non-streaming surface (spec §9 design note: a channel-based
//! sink in place of an async callback).

use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use storyforge_domain::{AgentMessage, Inventory, StructuredResponse, ToolCall};

use crate::agent::tools::ToolRegistry;
use crate::error::EngineError;
use crate::ports::{LlmClient, LlmCompletion, StreamEvent, ToolDefinition};
use crate::stream_parser::{TextSplitParser, MARKER};

/// Safety bound on tool round-trips per turn; a well-behaved LLM finishes in
/// one or two. Hitting this is treated as a provider/prompt bug, not a user
/// error.
pub const MAX_TOOL_ITERATIONS: usize = 8;

/// Drive one full turn without streaming narration back to the caller.
#[instrument(skip_all, fields(turns = tracing::field::Empty))]
pub async fn run(
    llm: &dyn LlmClient,
    conversation: &mut Vec<AgentMessage>,
    inventory: &mut Inventory,
) -> Result<StructuredResponse, EngineError> {
    let tools = ToolRegistry::definitions();

    for iteration in 0..MAX_TOOL_ITERATIONS {
        let completion = llm.complete(conversation, &tools).await?;

        if !completion.tool_calls.is_empty() {
            run_tool_round(conversation, inventory, &completion);
            continue;
        }

        tracing::Span::current().record("turns", iteration + 1);
        return finalize(conversation, completion.content);
    }

    Err(EngineError::InvalidRequest(
        "tool-call loop exceeded the maximum number of iterations".to_string(),
    ))
}

/// Drive one full turn, forwarding narration text chunks to `narration_sink`
/// as they arrive. Only the final (content-bearing) round streams; rounds
/// that only make tool calls typically carry no narration content at all.
#[instrument(skip_all, fields(turns = tracing::field::Empty))]
pub async fn run_streaming(
    llm: &dyn LlmClient,
    conversation: &mut Vec<AgentMessage>,
    inventory: &mut Inventory,
    narration_sink: mpsc::UnboundedSender<String>,
) -> Result<StructuredResponse, EngineError> {
    let tools = ToolRegistry::definitions();
    let mut parser = TextSplitParser::new();

    for iteration in 0..MAX_TOOL_ITERATIONS {
        let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
        let drain = async {
            while let Some(event) = rx.recv().await {
                if let StreamEvent::Content(text) = event {
                    let chunk = parser.process_chunk(&text);
                    if !chunk.is_empty() && narration_sink.send(chunk).is_err() {
                        debug!("narration receiver dropped before stream completed");
                    }
                }
            }
        };

        let (completion, _) = tokio::join!(llm.stream_complete(conversation, &tools, tx), drain);
        let completion = completion?;

        if !completion.tool_calls.is_empty() {
            run_tool_round(conversation, inventory, &completion);
            continue;
        }

        tracing::Span::current().record("turns", iteration + 1);
        return finalize_from_parser(conversation, &parser);
    }

    Err(EngineError::InvalidRequest(
        "tool-call loop exceeded the maximum number of iterations".to_string(),
    ))
}

/// Builds the final structured response directly from the parser's
/// accumulated state, avoiding a second pass over already-streamed text.
fn finalize_from_parser(
    conversation: &mut Vec<AgentMessage>,
    parser: &TextSplitParser,
) -> Result<StructuredResponse, EngineError> {
    let response = storyforge_domain::response::parse_and_validate(&parser.json(), parser.narration())?;

    conversation.push(AgentMessage::Assistant {
        content: Some(format!("{}\n{}\n{}", parser.narration(), MARKER, parser.json())),
        tool_calls: Vec::new(),
    });

    Ok(response)
}

fn run_tool_round(conversation: &mut Vec<AgentMessage>, inventory: &mut Inventory, completion: &LlmCompletion) {
    let assistant = AgentMessage::Assistant {
        content: completion.content.clone(),
        tool_calls: completion.tool_calls.clone(),
    };
    debug_assert!(
        !assistant.is_empty_assistant(),
        "assistant message with tool calls can never be the empty-content/empty-tool_calls case"
    );
    conversation.push(assistant);

    for call in &completion.tool_calls {
        let result = dispatch_tool_call(call, inventory);
        conversation.push(AgentMessage::Tool {
            tool_call_id: call.id.clone(),
            content: result.to_string(),
        });
    }
}

fn dispatch_tool_call(call: &ToolCall, inventory: &mut Inventory) -> serde_json::Value {
    match ToolRegistry::dispatch(&call.name, &call.arguments, inventory) {
        Ok(value) => value,
        Err(err) => {
            warn!(tool = %call.name, error = %err, "tool call failed");
            serde_json::json!({ "error": err.to_string() })
        }
    }
}

fn finalize(
    conversation: &mut Vec<AgentMessage>,
    content: Option<String>,
) -> Result<StructuredResponse, EngineError> {
    let full_text = content.ok_or_else(|| {
        EngineError::InvalidRequest("final assistant turn had no content".to_string())
    })?;

    let mut parser = TextSplitParser::new();
    parser.process_chunk(&full_text);

    let response = storyforge_domain::response::parse_and_validate(&parser.json(), parser.narration())?;

    conversation.push(AgentMessage::Assistant {
        content: Some(full_text),
        tool_calls: Vec::new(),
    });

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::ports::error::LlmError;

    struct ScriptedLlm {
        responses: Mutex<Vec<LlmCompletion>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _conversation: &[AgentMessage],
            _tools: &[ToolDefinition],
        ) -> Result<LlmCompletion, LlmError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::InvalidResponse("script exhausted".to_string()));
            }
            Ok(responses.remove(0))
        }

        async fn stream_complete(
            &self,
            conversation: &[AgentMessage],
            tools: &[ToolDefinition],
            sink: mpsc::UnboundedSender<StreamEvent>,
        ) -> Result<LlmCompletion, LlmError> {
            let completion = self.complete(conversation, tools).await?;
            if let Some(content) = &completion.content {
                let _ = sink.send(StreamEvent::Content(content.clone()));
            }
            Ok(completion)
        }
    }

    fn simple_scene_completion() -> LlmCompletion {
        LlmCompletion {
            content: Some(
                "You step into the hall.\n<<<JSON>>>\n{\"responseType\":\"simple\",\"locationId\":\"hall\",\"actionTaken\":\"other\"}"
                    .to_string(),
            ),
            tool_calls: vec![],
        }
    }

    #[tokio::test]
    async fn run_without_tool_calls_returns_final_response() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![simple_scene_completion()]),
        };
        let mut conversation = vec![AgentMessage::User { content: "look".into() }];
        let mut inventory: Inventory = vec![];

        let response = run(&llm, &mut conversation, &mut inventory).await.unwrap();
        assert_eq!(response.location_id(), "hall");
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn run_executes_tool_call_before_finishing() {
        let tool_call = ToolCall {
            id: "call_1".into(),
            name: "add_inventory_item".into(),
            arguments: serde_json::json!({"item": "torch"}),
        };
        let tool_round = LlmCompletion {
            content: None,
            tool_calls: vec![tool_call],
        };
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![tool_round, simple_scene_completion()]),
        };
        let mut conversation = vec![AgentMessage::User { content: "take torch".into() }];
        let mut inventory: Inventory = vec![];

        let response = run(&llm, &mut conversation, &mut inventory).await.unwrap();
        assert_eq!(response.location_id(), "hall");
        assert_eq!(inventory, vec!["torch".to_string()]);
        // user, assistant(tool_calls), tool, assistant(final)
        assert_eq!(conversation.len(), 4);
        assert!(!conversation[1].is_empty_assistant());
    }

    #[tokio::test]
    async fn run_streaming_forwards_narration_before_marker() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![simple_scene_completion()]),
        };
        let mut conversation = vec![AgentMessage::User { content: "look".into() }];
        let mut inventory: Inventory = vec![];
        let (tx, mut rx) = mpsc::unbounded_channel();

        let response = run_streaming(&llm, &mut conversation, &mut inventory, tx)
            .await
            .unwrap();
        assert_eq!(response.location_id(), "hall");

        let mut forwarded = String::new();
        while let Ok(chunk) = rx.try_recv() {
            forwarded.push_str(&chunk);
        }
        assert!(forwarded.contains("You step into the hall."));
    }
}
