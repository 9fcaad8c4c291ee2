//! End-to-end retrieval over the in-memory index and trigram embeddings.

use super::support::{ScriptedCompletion, WordCounter, MODEL};
use crate::embeddings::{EmbeddingClient, TrigramProvider};
use crate::rag::{
    IdentityClaims, OrchestratorConfig, RagOrchestrator, RetrievalMode, RetrievalOverrides,
    SecurityFilterBuilder,
};
use crate::search::{create_search_client, CorpusEntry, InMemoryIndex, RetrievedDocument};
use grounded_core::config::SearchSettings;
use grounded_llm::ChatMessage;
use std::sync::Arc;
use tempfile::TempDir;

fn entry(id: &str, category: &str, content: &str, oids: &[&str]) -> CorpusEntry {
    CorpusEntry {
        document: RetrievedDocument {
            id: id.to_string(),
            sourcepage: format!("{}.md", id),
            sourcefile: format!("{}.md", id),
            content: content.to_string(),
            category: Some(category.to_string()),
            oids: oids.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        },
        embedding: None,
    }
}

fn corpus() -> Vec<CorpusEntry> {
    vec![
        entry(
            "vacation",
            "hr",
            "Employees receive 25 vacation days per year. Unused vacation days expire in March.",
            &[],
        ),
        entry(
            "laptops",
            "it",
            "Laptops are replaced every three years by the IT service desk.",
            &[],
        ),
        entry(
            "salaries",
            "hr",
            "Salary bands are reviewed every spring by the compensation team.",
            &["manager-1"],
        ),
    ]
}

async fn orchestrator(
    embedder: Arc<TrigramProvider>,
    completion: Arc<ScriptedCompletion>,
    filters: SecurityFilterBuilder,
) -> RagOrchestrator {
    let mut index = InMemoryIndex::new(corpus());
    index.embed_missing(embedder.as_ref()).await.unwrap();

    RagOrchestrator::new(
        OrchestratorConfig::new(MODEL),
        embedder,
        Arc::new(index),
        Arc::new(filters),
        completion,
        Arc::new(WordCounter),
    )
    .unwrap()
}

#[tokio::test]
async fn test_text_retrieval_grounds_answer() {
    let completion = Arc::new(ScriptedCompletion::answering("25 days [vacation.md]."));
    let orchestrator = orchestrator(
        Arc::new(TrigramProvider::new(128)),
        completion.clone(),
        SecurityFilterBuilder::default(),
    )
    .await;
    let overrides = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Text),
        ..Default::default()
    };

    let answer = orchestrator
        .run(
            &[ChatMessage::user("How many vacation days do I get?")],
            &overrides,
            &IdentityClaims::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(answer.message.content, "25 days [vacation.md].");
    let sources = answer.context.text_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].starts_with("vacation.md: Employees receive 25 vacation days"));

    let sent = completion.requests.lock().unwrap();
    let user_turn = sent[0].messages.last().unwrap().content.to_plain_text();
    assert!(user_turn.contains("vacation.md: "));
    assert!(!user_turn.contains("laptops.md"));
}

#[tokio::test]
async fn test_hybrid_ranks_lexical_match_first() {
    let orchestrator = orchestrator(
        Arc::new(TrigramProvider::new(128)),
        Arc::new(ScriptedCompletion::answering("ok")),
        SecurityFilterBuilder::default(),
    )
    .await;

    let (_, info) = orchestrator
        .retrieve(
            "When are laptops replaced?",
            &RetrievalOverrides::default(),
            &IdentityClaims::default(),
        )
        .await
        .unwrap();

    assert!(info.text_sources()[0].starts_with("laptops.md: "));
}

#[tokio::test]
async fn test_semantic_captions_cite_best_sentence() {
    let orchestrator = orchestrator(
        Arc::new(TrigramProvider::new(128)),
        Arc::new(ScriptedCompletion::answering("ok")),
        SecurityFilterBuilder::default(),
    )
    .await;
    let overrides = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Text),
        semantic_ranker: true,
        semantic_captions: true,
        ..Default::default()
    };

    let (_, info) = orchestrator
        .retrieve("When do unused vacation days expire?", &overrides, &IdentityClaims::default())
        .await
        .unwrap();

    let sources = info.text_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].contains("expire in March"));
    assert!(!sources[0].contains("25 vacation days per year"));
}

#[tokio::test]
async fn test_category_and_security_filters() {
    let orchestrator = orchestrator(
        Arc::new(TrigramProvider::new(128)),
        Arc::new(ScriptedCompletion::answering("ok")),
        SecurityFilterBuilder::new(true, false),
    )
    .await;

    let exclude_hr = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Text),
        exclude_category: Some("hr".to_string()),
        ..Default::default()
    };
    let (content, _) = orchestrator
        .retrieve("vacation days", &exclude_hr, &IdentityClaims::default())
        .await
        .unwrap();
    assert!(content.is_empty());

    let secured = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Text),
        use_oid_security_filter: true,
        ..Default::default()
    };
    let anonymous = IdentityClaims::default();
    let manager = IdentityClaims {
        oid: Some("manager-1".to_string()),
        groups: Vec::new(),
    };

    let (hidden, _) = orchestrator
        .retrieve("salary bands", &secured, &anonymous)
        .await
        .unwrap();
    assert!(!hidden.contains("salaries.md"));

    let (visible, _) = orchestrator
        .retrieve("salary bands", &secured, &manager)
        .await
        .unwrap();
    assert!(visible.contains("salaries.md"));
}

#[tokio::test]
async fn test_corpus_loaded_from_workspace() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("data")).unwrap();
    let lines: Vec<String> = corpus()
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect();
    std::fs::write(temp.path().join("data/corpus.jsonl"), lines.join("\n")).unwrap();

    let embedder = TrigramProvider::new(64);
    let settings = SearchSettings {
        corpus_path: Some("data".into()),
        ..Default::default()
    };
    let search = create_search_client(&settings, temp.path(), &embedder, None)
        .await
        .unwrap();
    assert_eq!(embedder.dimensions(), 64);

    let orchestrator = RagOrchestrator::new(
        OrchestratorConfig::new(MODEL),
        Arc::new(embedder),
        search,
        Arc::new(SecurityFilterBuilder::default()),
        Arc::new(ScriptedCompletion::answering("ok")),
        Arc::new(WordCounter),
    )
    .unwrap();

    let (content, _) = orchestrator
        .retrieve(
            "vacation days",
            &RetrievalOverrides::default(),
            &IdentityClaims::default(),
        )
        .await
        .unwrap();
    assert!(content.starts_with("vacation.md: "));
}
