//! Ingest a PDF folder into the in-memory store, then chat against it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docchat::agent::SearchAgent;
use docchat::chat::{ChatService, FallbackDispatcher, RetrievalAnswerPipeline, Route};
use docchat::core::config::{
    AppConfig, AppPaths, FallbackConfig, IngestConfig, LlmConfig, RetrievalConfig,
};
use docchat::llm::{ChatRequest, CompletionProvider, LlmError};
use docchat::rag::{
    load_directory, Chunker, ChunkerConfig, EmbeddingClient, IngestionPipeline,
    MemoryVectorStore, TextChunk, VectorStore,
};
use docchat::server::router::router;
use docchat::state::AppState;
use docchat::test_support::{serve, write_pdf, HashEmbedder, ScriptedCompletion};
use docchat::tools::{SearchError, SearchResult, WebSearch};

/// Each page is longer than one 500-character chunk.
const MANUAL_PAGES: [&str; 3] = [
    concat!(
        "Section one covers installation. ",
        "Mount the housing on a level concrete pad and anchor it with four bolts. ",
        "Check that the inlet duct is free of debris before the first start. ",
        "Connect the control cable to the panel marked A and route the drain hose away from walkways. ",
        "The installer signs the commissioning sheet once the alignment marks match. ",
        "Keep the shipping brackets until the site survey is complete, because they are needed if the unit must be moved again. ",
        "Record the serial number in the site log and photograph the nameplate. ",
        "Lighting around the pad should allow reading the gauges at night, and the access path must stay clear of snow and standing water throughout the year.",
    ),
    concat!(
        "Section two covers routine maintenance. ",
        "Crews inspect the blades every spring and replace worn seals during the same visit. ",
        "Lubricate the bearings with the grease listed in appendix C and wipe away any excess. ",
        "The filter cartridge is swapped every three months or sooner in dusty locations. ",
        "Log each visit with the date, the technician name, and the parts used so the service history stays complete. ",
        "Spare seals are stored in the cabinet beside the panel, and the cabinet key stays with the site supervisor. ",
        "During normal service the turbine operating pressure is 42 bar at full load, and the relief valve opens above 48 bar. ",
        "Never bypass the relief valve, and shut the unit down if the gauge reads outside the green band for more than ten minutes. ",
        "After any shutdown, wait for the rotor to stop fully before opening the inspection hatch. ",
        "Wear gloves and eye protection while handling the cartridge, since the housing edges are sharp. ",
        "Dispose of used grease and oily rags in the sealed bin, and note the disposal in the site log. ",
        "Report cracked welds or loose anchor bolts to the supervisor on the same day.",
    ),
    concat!(
        "Section three covers the warranty. ",
        "Parts and labour are covered for five years from the commissioning date, provided the service log shows every scheduled visit. ",
        "Damage from floods, lightning, or unauthorised repairs is excluded. ",
        "Claims must include the serial number, a copy of the service log, and photographs of the fault. ",
        "The manufacturer answers each claim within thirty days and may send an engineer to inspect the site. ",
        "Replacement parts shipped under warranty carry the remainder of the original coverage, not a fresh term. ",
        "Extended cover can be purchased before the first year ends, and it adds three more years for parts only.",
    ),
];

const ANSWER_SENTENCE: &str = "the turbine operating pressure is 42 bar at full load";

/// Quotes the pressure sentence when it is in the retrieved context, refuses otherwise.
struct ContextReader;

#[async_trait]
impl CompletionProvider for ContextReader {
    fn name(&self) -> &str {
        "context-reader"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        let system = request
            .messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let question = request
            .messages
            .last()
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();
        if question.contains("pressure") && system.contains(ANSWER_SENTENCE) {
            Ok(format!("According to the manual, {}.", ANSWER_SENTENCE))
        } else {
            Ok("I don't know.".to_string())
        }
    }
}

#[derive(Default)]
struct FakeSearch {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl WebSearch for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![SearchResult {
            title: "1998 FIFA World Cup".to_string(),
            url: "https://example.org/1998".to_string(),
            snippet: "France beat Brazil 3-0 in the final.".to_string(),
        }])
    }
}

struct IngestedManual {
    chunks: Vec<TextChunk>,
    _dir: tempfile::TempDir,
}

async fn ingest_manual(store: Arc<MemoryVectorStore>) -> IngestedManual {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("manual.pdf"), &MANUAL_PAGES);

    let config = IngestConfig {
        data_dir: dir.path().to_path_buf(),
        ..IngestConfig::default()
    };
    let chunker = Chunker::new(ChunkerConfig::from(&config));
    let embedder = EmbeddingClient::new(Arc::new(HashEmbedder::default()));
    let pipeline = IngestionPipeline::new(config, embedder, store);

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.documents, 3);
    assert!(report.upsert.is_complete());

    let documents = load_directory(dir.path(), false).await.unwrap();
    let chunks = chunker.chunk_documents(&documents);
    assert_eq!(report.chunks, chunks.len());

    IngestedManual { chunks, _dir: dir }
}

fn chat_service(store: Arc<MemoryVectorStore>, agent: Option<SearchAgent>) -> ChatService {
    let retrieval = RetrievalAnswerPipeline::new(
        Arc::new(ContextReader),
        EmbeddingClient::new(Arc::new(HashEmbedder::default())),
        store,
        LlmConfig::default(),
        RetrievalConfig::default(),
    );
    ChatService::new(retrieval, FallbackDispatcher::from_config(&FallbackConfig::default(), agent))
}

#[tokio::test]
async fn ingested_manual_answers_from_a_later_chunk_of_a_middle_page() {
    let store = Arc::new(MemoryVectorStore::new());
    let manual = ingest_manual(store.clone()).await;

    assert_eq!(manual.chunks.len(), 7);
    assert_eq!(store.count().await.unwrap(), 7);
    for page in 0..3 {
        assert!(manual.chunks.iter().filter(|c| c.page_number == page).count() >= 2);
    }
    for pair in manual.chunks.windows(2) {
        if pair[0].page_number == pair[1].page_number {
            let chars: Vec<char> = pair[0].text.chars().collect();
            let tail: String = chars[chars.len() - 20..].iter().collect();
            assert!(pair[1].text.starts_with(&tail));
        }
    }

    let answer_chunk = manual
        .chunks
        .iter()
        .find(|c| c.text.contains(ANSWER_SENTENCE))
        .unwrap();
    assert_eq!(answer_chunk.page_number, 1);
    assert!(answer_chunk.sequence_index > 0);

    let service = chat_service(store, None);
    let reply = service
        .ask("session-1", "What is the turbine operating pressure at full load?")
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Direct);
    assert!(reply.text.contains(ANSWER_SENTENCE));
    assert!(reply.sources.len() <= 3);
    let hit = reply
        .sources
        .iter()
        .find(|s| s.record.metadata.text == answer_chunk.text)
        .unwrap();
    assert_eq!(hit.record.metadata.page_number, 1);
    assert!(hit.record.metadata.source.ends_with("manual.pdf"));
}

#[tokio::test]
async fn unanswerable_question_is_rerouted_to_web_search_over_http() {
    let store = Arc::new(MemoryVectorStore::new());
    let _manual = ingest_manual(store.clone()).await;

    let search = Arc::new(FakeSearch::default());
    let agent = SearchAgent::new(
        Arc::new(ScriptedCompletion::new(vec![
            "Thought: I should look this up.\nAction: Search\nAction Input: 1998 world cup winner",
            "Thought: I now know the final answer.\nFinal Answer: France won the 1998 World Cup.",
        ])),
        search.clone(),
        LlmConfig::default(),
        5,
    );
    let state = AppState::from_parts(
        Arc::new(AppPaths::with_root(std::env::temp_dir())),
        Arc::new(AppConfig::default()),
        store.clone(),
        chat_service(store, Some(agent)),
    );
    let base = serve(router(state)).await;

    let body = reqwest::Client::new()
        .post(format!("{}/get", base))
        .form(&[("msg", "Who won the 1998 world cup?")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "Websearch : France won the 1998 World Cup.");
    assert_eq!(
        *search.queries.lock().unwrap(),
        vec!["1998 world cup winner".to_string()]
    );
}
