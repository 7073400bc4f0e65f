//! Reroutes answers the document index could not support to web search.

use crate::agent::SearchAgent;
use crate::core::config::FallbackConfig;

/// Decides whether an answer should be replaced by a web-search answer.
pub trait AnswerClassifier: Send + Sync {
    fn needs_fallback(&self, answer: &str) -> bool;
}

/// Fires when the answer contains one of the refusal markers.
pub struct RefusalMarkerClassifier {
    markers: Vec<String>,
}

impl RefusalMarkerClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| normalize_apostrophes(m.as_ref()))
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl AnswerClassifier for RefusalMarkerClassifier {
    fn needs_fallback(&self, answer: &str) -> bool {
        let answer = normalize_apostrophes(answer);
        self.markers.iter().any(|marker| answer.contains(marker.as_str()))
    }
}

fn normalize_apostrophes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The retrieved answer was returned unchanged.
    Direct,
    /// The answer came from the search agent.
    WebSearch,
    /// The classifier fired but the agent failed; the original answer was kept.
    FallbackFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub text: String,
    pub route: Route,
}

pub struct FallbackDispatcher {
    classifier: Box<dyn AnswerClassifier>,
    agent: Option<SearchAgent>,
    prefix: String,
}

impl FallbackDispatcher {
    /// `agent: None` disables rerouting.
    pub fn new(
        classifier: Box<dyn AnswerClassifier>,
        agent: Option<SearchAgent>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            agent,
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &FallbackConfig, agent: Option<SearchAgent>) -> Self {
        let agent = if config.enabled { agent } else { None };
        Self::new(
            Box::new(RefusalMarkerClassifier::new(&config.markers)),
            agent,
            config.prefix.clone(),
        )
    }

    pub async fn dispatch(&self, query: &str, answer: String) -> DispatchOutcome {
        let Some(agent) = &self.agent else {
            return DispatchOutcome {
                text: answer,
                route: Route::Direct,
            };
        };
        if !self.classifier.needs_fallback(&answer) {
            return DispatchOutcome {
                text: answer,
                route: Route::Direct,
            };
        }

        tracing::info!("answer looks like a refusal, falling back to web search");
        match agent.run(query).await {
            Ok(outcome) => DispatchOutcome {
                text: format!("{}{}", self.prefix, outcome.output),
                route: Route::WebSearch,
            },
            Err(err) => {
                tracing::error!("web search fallback failed: {}", err);
                DispatchOutcome {
                    text: answer,
                    route: Route::FallbackFailed,
                }
            }
        }
    }
}
