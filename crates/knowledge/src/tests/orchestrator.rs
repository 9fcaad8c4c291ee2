//! Orchestrator behaviour with stubbed services.

use super::support::{
    document, Harness, RecordingSearch, ScriptedCompletion, StubEmbedder, WordCounter, MODEL,
};
use crate::rag::{
    AnswerEvent, Completion, IdentityClaims, OrchestratorConfig, RagOrchestrator, RetrievalMode,
    RetrievalOverrides, SecurityFilterBuilder, NO_RETRIEVAL_CATEGORY, SOURCES_MARKER,
};
use futures::StreamExt;
use grounded_core::AppError;
use grounded_llm::{ChatMessage, ChatRole, ContentPart, MessageContent};
use grounded_prompt::SystemPromptBuilder;
use std::sync::Arc;

fn three_documents() -> RecordingSearch {
    RecordingSearch::with_documents(vec![
        document("benefits", 0.9, None),
        document("handbook", 0.7, None),
        document("roles", 0.5, None),
    ])
}

fn no_retrieval() -> RetrievalOverrides {
    RetrievalOverrides {
        include_category: Some(NO_RETRIEVAL_CATEGORY.to_string()),
        ..Default::default()
    }
}

fn last_content(messages: &[ChatMessage]) -> String {
    messages.last().unwrap().content.to_plain_text()
}

#[tokio::test]
async fn test_rejects_invalid_last_message() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let overrides = RetrievalOverrides::default();
    let claims = IdentityClaims::default();

    let parts = ChatMessage::user(MessageContent::Parts(vec![ContentPart::Text {
        text: "What is covered?".to_string(),
    }]));
    let cases = vec![
        vec![],
        vec![ChatMessage::user("   ")],
        vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello")],
        vec![parts],
    ];

    for messages in cases {
        let result = harness
            .orchestrator
            .answer(&messages, &overrides, &claims, false)
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    assert_eq!(harness.embed_count(), 0);
    assert_eq!(harness.search.request_count(), 0);
}

#[tokio::test]
async fn test_disabled_retrieval_skips_search() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));

    let (info, deferred) = harness
        .orchestrator
        .answer(
            &[ChatMessage::user("Tell me a joke")],
            &no_retrieval(),
            &IdentityClaims::default(),
            false,
        )
        .await
        .unwrap();

    assert_eq!(last_content(&deferred.request().messages), "Tell me a joke");
    assert!(info.thoughts.iter().all(|t| t.title != "Search results"));
    assert!(info.text_sources().is_empty());
    assert_eq!(harness.embed_count(), 0);
    assert_eq!(harness.search.request_count(), 0);
}

#[tokio::test]
async fn test_default_overrides_ground_the_user_turn() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));

    let (info, deferred) = harness
        .orchestrator
        .answer(
            &[ChatMessage::user("Hallo")],
            &RetrievalOverrides::default(),
            &IdentityClaims::default(),
            false,
        )
        .await
        .unwrap();

    let user_turn = last_content(&deferred.request().messages);
    assert!(user_turn.starts_with("Hallo"));
    assert!(user_turn.contains(SOURCES_MARKER));
    assert!(user_turn.contains("benefits.pdf#page=1: Content of benefits"));

    assert_eq!(info.text_sources().len(), 3);
    let titles: Vec<&str> = info.thoughts.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Search results", "Prompt to generate answer"]);

    let request = harness.search.last_request().unwrap();
    assert!(request.use_text && request.use_vector);
    assert_eq!(request.query_text.as_deref(), Some("Hallo"));
    assert_eq!(request.vectors.len(), 1);
}

#[tokio::test]
async fn test_vector_mode_sends_no_query_text() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let overrides = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Vectors),
        ..Default::default()
    };

    harness
        .orchestrator
        .retrieve("parental leave", &overrides, &IdentityClaims::default())
        .await
        .unwrap();

    let request = harness.search.last_request().unwrap();
    assert!(request.query_text.is_none());
    assert!(!request.vectors.is_empty());
    assert_eq!(harness.embed_count(), 1);
}

#[tokio::test]
async fn test_text_mode_skips_embedding() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let overrides = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Text),
        ..Default::default()
    };

    harness
        .orchestrator
        .retrieve("parental leave", &overrides, &IdentityClaims::default())
        .await
        .unwrap();

    let request = harness.search.last_request().unwrap();
    assert_eq!(request.query_text.as_deref(), Some("parental leave"));
    assert!(request.vectors.is_empty());
    assert_eq!(harness.embed_count(), 0);
}

#[tokio::test]
async fn test_retrieve_is_repeatable() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let overrides = RetrievalOverrides::default();
    let claims = IdentityClaims::default();

    let first = harness
        .orchestrator
        .retrieve("benefits", &overrides, &claims)
        .await
        .unwrap();
    let second = harness
        .orchestrator
        .retrieve("benefits", &overrides, &claims)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_top_and_reranker_threshold_bound_results() {
    let documents = (0..8)
        .map(|i| document(&format!("doc{}", i), 0.9, Some(i as f64 * 0.1)))
        .collect();
    let harness = Harness::new(
        RecordingSearch::with_documents(documents),
        ScriptedCompletion::answering("ok"),
    );
    let overrides = RetrievalOverrides {
        retrieval_mode: Some(RetrievalMode::Hybrid),
        semantic_ranker: true,
        top: Some(5),
        minimum_reranker_score: Some(0.3),
        ..Default::default()
    };

    let (_, info) = harness
        .orchestrator
        .retrieve("anything", &overrides, &IdentityClaims::default())
        .await
        .unwrap();

    let results = &info.thoughts[0].description;
    let results = results.as_array().unwrap();
    assert!(results.len() <= 5);
    assert!(!results.is_empty());
    for result in results {
        assert!(result["reranker_score"].as_f64().unwrap() >= 0.3);
    }
    // highest reranker score first
    assert_eq!(results[0]["id"], "doc7");
}

#[tokio::test]
async fn test_buffered_and_streamed_handles() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("Answer"));
    let messages = [ChatMessage::user("What is covered?")];
    let overrides = RetrievalOverrides::default();
    let claims = IdentityClaims::default();

    let (_, buffered) = harness
        .orchestrator
        .answer(&messages, &overrides, &claims, false)
        .await
        .unwrap();
    let (_, streamed) = harness
        .orchestrator
        .answer(&messages, &overrides, &claims, true)
        .await
        .unwrap();

    // nothing is sent before the handles are awaited
    assert_eq!(harness.completion.request_count(), 0);
    assert!(!buffered.is_streaming());
    assert!(streamed.is_streaming());
    assert_eq!(buffered.request().max_tokens, Some(1024));
    assert_eq!(buffered.request().n, 1);

    assert!(matches!(buffered.await.unwrap(), Completion::Buffered(c) if c.content == "Answer"));
    assert!(matches!(streamed.await.unwrap(), Completion::Streamed(_)));
    assert_eq!(harness.completion.request_count(), 2);
}

#[tokio::test]
async fn test_request_parameters_follow_overrides() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let overrides = RetrievalOverrides {
        temperature: Some(0.7),
        seed: Some(42),
        ..Default::default()
    };

    let (_, deferred) = harness
        .orchestrator
        .answer(
            &[ChatMessage::user("Hi")],
            &overrides,
            &IdentityClaims::default(),
            false,
        )
        .await
        .unwrap();

    let request = deferred.request();
    assert_eq!(request.temperature, Some(0.7));
    assert_eq!(request.seed, Some(42));
    assert_eq!(request.model, MODEL);
    assert_eq!(request.messages[0].role, ChatRole::System);
}

#[tokio::test]
async fn test_deployment_is_sent_and_traced() {
    let config = OrchestratorConfig {
        chat_deployment: Some("chat-prod".to_string()),
        ..OrchestratorConfig::new(MODEL)
    };
    let harness = Harness::with_config(
        config,
        three_documents(),
        ScriptedCompletion::answering("ok"),
    );

    let (info, deferred) = harness
        .orchestrator
        .answer(
            &[ChatMessage::user("Hi")],
            &no_retrieval(),
            &IdentityClaims::default(),
            false,
        )
        .await
        .unwrap();

    assert_eq!(deferred.request().model, "chat-prod");
    let props = info.thoughts.last().unwrap().props.as_ref().unwrap();
    assert_eq!(props["model"], MODEL);
    assert_eq!(props["deployment"], "chat-prod");
}

#[test]
fn test_unknown_model_rejected_without_fallback() {
    let config = OrchestratorConfig {
        allow_non_gpt_models: false,
        ..OrchestratorConfig::new("mystery-model")
    };
    let result = RagOrchestrator::new(
        config,
        Arc::new(StubEmbedder::default()),
        Arc::new(RecordingSearch::default()),
        Arc::new(SecurityFilterBuilder::default()),
        Arc::new(ScriptedCompletion::default()),
        Arc::new(WordCounter),
    );
    assert!(matches!(result, Err(AppError::UnsupportedModel(_))));
}

#[tokio::test]
async fn test_retrieval_failure_propagates() {
    let harness = Harness::new(RecordingSearch::failing(), ScriptedCompletion::answering("ok"));

    let result = harness
        .orchestrator
        .answer(
            &[ChatMessage::user("Hi")],
            &RetrievalOverrides::default(),
            &IdentityClaims::default(),
            false,
        )
        .await;

    assert!(matches!(result, Err(AppError::Retrieval(_))));
    assert_eq!(harness.search.request_count(), 1);
    assert_eq!(harness.completion.request_count(), 0);
}

#[tokio::test]
async fn test_invalid_overrides_rejected() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let overrides = RetrievalOverrides {
        top: Some(0),
        ..Default::default()
    };

    let result = harness
        .orchestrator
        .retrieve("Hi", &overrides, &IdentityClaims::default())
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn test_history_is_kept_in_order() {
    let harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let messages = [
        ChatMessage::user("What is the deductible?"),
        ChatMessage::assistant("It is $2000 [benefits.pdf#page=1]."),
        ChatMessage::user("And for families?"),
    ];

    let (_, deferred) = harness
        .orchestrator
        .answer(&messages, &no_retrieval(), &IdentityClaims::default(), false)
        .await
        .unwrap();

    let sent = &deferred.request().messages;
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[1], messages[0]);
    assert_eq!(sent[2], messages[1]);
    assert_eq!(last_content(sent), "And for families?");
}

#[tokio::test]
async fn test_few_shots_sent_between_system_and_history() {
    let mut harness = Harness::new(three_documents(), ScriptedCompletion::answering("ok"));
    let shots = vec![
        ChatMessage::user("How many vacation days do I get?"),
        ChatMessage::assistant("25 days per year [handbook.pdf#page=1]."),
    ];
    harness.orchestrator = harness
        .orchestrator
        .with_system_prompt(SystemPromptBuilder::new().with_few_shots(shots.clone()));

    let messages = [
        ChatMessage::user("What is the deductible?"),
        ChatMessage::assistant("It is $2000 [benefits.pdf#page=1]."),
        ChatMessage::user("And for families?"),
    ];
    let (_, deferred) = harness
        .orchestrator
        .answer(&messages, &no_retrieval(), &IdentityClaims::default(), false)
        .await
        .unwrap();

    let sent = &deferred.request().messages;
    assert_eq!(sent.len(), 6);
    assert_eq!(sent[0].role, ChatRole::System);
    assert_eq!(&sent[1..3], shots.as_slice());
    assert_eq!(sent[3], messages[0]);
    assert_eq!(sent[4], messages[1]);
    assert_eq!(last_content(sent), "And for families?");
}

#[tokio::test]
async fn test_run_splits_followup_questions() {
    let harness = Harness::new(
        three_documents(),
        ScriptedCompletion::answering("Covered [benefits.pdf#page=1].<<What about dental?>>"),
    );
    let overrides = RetrievalOverrides {
        suggest_followup_questions: true,
        ..Default::default()
    };
    let state = serde_json::json!({"conversation": 7});

    let answer = harness
        .orchestrator
        .run(
            &[ChatMessage::user("Is vision covered?")],
            &overrides,
            &IdentityClaims::default(),
            Some(state.clone()),
        )
        .await
        .unwrap();

    assert_eq!(answer.message.role, ChatRole::Assistant);
    assert_eq!(answer.message.content, "Covered [benefits.pdf#page=1].");
    assert_eq!(
        answer.context.followup_questions,
        Some(vec!["What about dental?".to_string()])
    );
    assert_eq!(answer.session_state, Some(state));
}

#[tokio::test]
async fn test_run_stream_events() {
    let harness = Harness::new(
        three_documents(),
        ScriptedCompletion::streaming(&["Covered", " in full.", "<<Dental", "?>>"]),
    );
    let overrides = RetrievalOverrides {
        suggest_followup_questions: true,
        ..Default::default()
    };

    let stream = harness
        .orchestrator
        .run_stream(
            &[ChatMessage::user("Is vision covered?")],
            &overrides,
            &IdentityClaims::default(),
            None,
        )
        .await
        .unwrap();
    let events: Vec<AnswerEvent> = stream.map(|e| e.unwrap()).collect().await;

    match &events[0] {
        AnswerEvent::Context { role, context, .. } => {
            assert_eq!(*role, ChatRole::Assistant);
            assert_eq!(context.text_sources().len(), 3);
        }
        other => panic!("expected context first, got {:?}", other),
    }

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            AnswerEvent::Delta { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Covered in full.");
    assert!(events.contains(&AnswerEvent::FollowupQuestions {
        questions: vec!["Dental?".to_string()]
    }));
    assert_eq!(
        events.last(),
        Some(&AnswerEvent::Done {
            finish_reason: Some("stop".to_string())
        })
    );
}
