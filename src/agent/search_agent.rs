//! Zero-shot ReAct agent with a single web `Search` tool.
//!
//! Loop: prompt the model with the scratchpad, stop at "\nObservation:",
//! run the requested action and append its observation, until the model
//! produces a `Final Answer:` or the iteration budget runs out.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use thiserror::Error;

use crate::context::prompt::build_agent_prompt;
use crate::core::config::LlmConfig;
use crate::llm::{ChatMessage, ChatRequest, CompletionProvider, LlmError};
use crate::tools::search::{render_observation, SearchError, WebSearch};

pub const SEARCH_TOOL: &str = "Search";
pub const SEARCH_TOOL_DESCRIPTION: &str = "A search engine. Useful for when you need to answer \
questions about current events. Input should be a search query.";
pub const ITERATION_LIMIT_OUTPUT: &str = "Agent stopped due to iteration limit.";

const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION_STOP: &str = "\nObservation:";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent completion failed: {0}")]
    Completion(#[from] LlmError),

    #[error("agent search failed: {0}")]
    Search(#[from] SearchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    pub output: String,
    pub iterations: usize,
    /// True when the iteration budget ran out before a final answer.
    pub stopped: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Finish(String),
    Action { tool: String, input: String },
    Invalid(&'static str),
}

pub struct SearchAgent {
    llm: Arc<dyn CompletionProvider>,
    search: Arc<dyn WebSearch>,
    llm_config: LlmConfig,
    max_iterations: usize,
}

impl SearchAgent {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        search: Arc<dyn WebSearch>,
        llm_config: LlmConfig,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            search,
            llm_config,
            max_iterations: max_iterations.max(1),
        }
    }

    pub async fn run(&self, input: &str) -> Result<AgentOutcome, AgentError> {
        let mut scratchpad = String::new();

        for iteration in 1..=self.max_iterations {
            let prompt = build_agent_prompt(&[(SEARCH_TOOL, SEARCH_TOOL_DESCRIPTION)], input, &scratchpad);
            let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
                .with_stop(OBSERVATION_STOP)
                .with_config(&self.llm_config);
            let output = self.llm.chat(request).await?;

            let observation = match parse_step(&output) {
                Step::Finish(answer) => {
                    tracing::info!(iterations = iteration, "search agent finished");
                    return Ok(AgentOutcome {
                        output: answer,
                        iterations: iteration,
                        stopped: false,
                    });
                }
                Step::Action { tool, input: query } if tool == SEARCH_TOOL => {
                    tracing::debug!(iteration, query = %query, "search agent action");
                    let results = self.search.search(&query).await?;
                    render_observation(&results)
                }
                Step::Action { tool, .. } => {
                    format!("{} is not a valid tool, try one of [{}].", tool, SEARCH_TOOL)
                }
                Step::Invalid(message) => message.to_string(),
            };

            scratchpad.push_str(output.trim_end());
            scratchpad.push_str("\nObservation: ");
            scratchpad.push_str(&observation);
            scratchpad.push_str("\nThought:");
        }

        tracing::warn!(max_iterations = self.max_iterations, "search agent hit iteration limit");
        Ok(AgentOutcome {
            output: ITERATION_LIMIT_OUTPUT.to_string(),
            iterations: self.max_iterations,
            stopped: true,
        })
    }
}

fn action_regex() -> &'static Regex {
    static ACTION: OnceLock<Regex> = OnceLock::new();
    ACTION.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("action pattern is valid")
    })
}

fn parse_step(output: &str) -> Step {
    if let Some(pos) = output.find(FINAL_ANSWER) {
        return Step::Finish(output[pos + FINAL_ANSWER.len()..].trim().to_string());
    }

    match action_regex().captures(output) {
        Some(caps) => {
            let tool = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let input = caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('"');
            Step::Action {
                tool: tool.to_string(),
                input: input.to_string(),
            }
        }
        None if !output.contains("Action:") => {
            Step::Invalid("Invalid Format: Missing 'Action:' after 'Thought:'")
        }
        None => Step::Invalid("Invalid Format: Missing 'Action Input:' after 'Action:'"),
    }
}
