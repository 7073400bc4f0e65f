//! Prompt templates for answering, question condensing, summarizing and the
//! search agent.

use crate::llm::ChatMessage;
use crate::rag::ScoredRecord;

use super::window::{render_transcript, ContextMessage, ConversationState};

pub const QA_SYSTEM_PROMPT: &str = "Use the following pieces of information to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
Context:\n{context}";

pub const CONDENSE_QUESTION_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n{chat_history}\n\
Follow Up Input: {question}\n\
Standalone question:";

pub const SUMMARY_PROMPT: &str = "Progressively summarize the lines of conversation provided, \
adding onto the previous summary returning a new summary.\n\n\
Current summary:\n{summary}\n\n\
New lines of conversation:\n{new_lines}\n\n\
New summary:";

pub const AGENT_PROMPT: &str = "Answer the following questions as best you can. You have access to the following tools:\n\n\
{tools}\n\n\
Use the following format:\n\n\
Question: the input question you must answer\n\
Thought: you should always think about what to do\n\
Action: the action to take, should be one of [{tool_names}]\n\
Action Input: the input to the action\n\
Observation: the result of the action\n\
... (this Thought/Action/Action Input/Observation can repeat N times)\n\
Thought: I now know the final answer\n\
Final Answer: the final answer to the original input question\n\n\
Begin!\n\n\
Question: {input}\n\
Thought:{agent_scratchpad}";

/// Retrieved chunk texts joined the way they are placed into the prompt.
pub fn render_context(records: &[ScoredRecord]) -> String {
    records
        .iter()
        .map(|hit| hit.record.metadata.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System prompt with context, optional summary, recent turns, then the question.
pub fn build_answer_messages(
    question: &str,
    records: &[ScoredRecord],
    state: &ConversationState,
) -> Vec<ChatMessage> {
    let mut system = QA_SYSTEM_PROMPT.replace("{context}", &render_context(records));
    if let Some(summary) = state.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        system.push_str("\n\nSummary of the earlier conversation:\n");
        system.push_str(summary);
    }

    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(state.chat_messages());
    messages.push(ChatMessage::user(question));
    messages
}

pub fn build_condense_prompt(question: &str, state: &ConversationState) -> String {
    let mut history = String::new();
    if let Some(summary) = state.summary.as_deref() {
        history.push_str("System: ");
        history.push_str(summary);
        if !state.messages.is_empty() {
            history.push('\n');
        }
    }
    history.push_str(&state.transcript());

    CONDENSE_QUESTION_PROMPT
        .replace("{chat_history}", &history)
        .replace("{question}", question)
}

pub fn build_summary_prompt(summary: Option<&str>, pruned: &[ContextMessage]) -> String {
    SUMMARY_PROMPT
        .replace("{summary}", summary.unwrap_or(""))
        .replace("{new_lines}", &render_transcript(pruned))
}

pub fn build_agent_prompt(tools: &[(&str, &str)], input: &str, scratchpad: &str) -> String {
    let descriptions = tools
        .iter()
        .map(|(name, description)| format!("{}: {}", name, description))
        .collect::<Vec<_>>()
        .join("\n");
    let names = tools
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");

    AGENT_PROMPT
        .replace("{tools}", &descriptions)
        .replace("{tool_names}", &names)
        .replace("{input}", input)
        .replace("{agent_scratchpad}", scratchpad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{IndexRecord, RecordMetadata};

    fn hit(text: &str) -> ScoredRecord {
        ScoredRecord {
            record: IndexRecord {
                id: "1".to_string(),
                values: Vec::new(),
                metadata: RecordMetadata {
                    source: "a.pdf".to_string(),
                    page_number: 0,
                    text: text.to_string(),
                },
            },
            score: 0.9,
        }
    }

    #[test]
    fn answer_messages_carry_context_summary_and_history() {
        let mut state = ConversationState::new();
        state.record_exchange("What is a pump?", "It moves fluid.");
        state.summary = Some("Talked about machines.".to_string());

        let messages = build_answer_messages("How is it primed?", &[hit("Prime the pump first.")], &state);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Prime the pump first."));
        assert!(messages[0].content.contains("Talked about machines."));
        assert_eq!(messages[1], ChatMessage::user("What is a pump?"));
        assert_eq!(messages[3], ChatMessage::user("How is it primed?"));
    }

    #[test]
    fn condense_prompt_includes_transcript() {
        let mut state = ConversationState::new();
        state.record_exchange("Tell me about valves", "They control flow.");

        let prompt = build_condense_prompt("How often are they serviced?", &state);

        assert!(prompt.contains("Human: Tell me about valves\nAI: They control flow."));
        assert!(prompt.contains("Follow Up Input: How often are they serviced?"));
    }

    #[test]
    fn agent_prompt_lists_tools() {
        let prompt = build_agent_prompt(&[("Search", "looks things up")], "Who won?", "");
        assert!(prompt.contains("Search: looks things up"));
        assert!(prompt.contains("one of [Search]"));
        assert!(prompt.ends_with("Question: Who won?\nThought:"));
    }
}
