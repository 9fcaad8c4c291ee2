//! Answer runners: drive the deferred completion to a buffered answer or an
//! event stream, splitting off suggested follow-up questions.

use super::deferred::Completion;
use super::orchestrator::RagOrchestrator;
use super::overrides::RetrievalOverrides;
use super::types::{AnswerEvent, AnswerMessage, ChatAnswer, IdentityClaims};
use futures::{Stream, StreamExt};
use grounded_core::{AppError, AppResult};
use grounded_llm::{ChatMessage, ChatRole, ChatStream};
use std::collections::VecDeque;
use std::pin::Pin;

/// Stream of answer events: context first, then deltas, then optional
/// follow-up questions and `Done`. An `Err` item ends the stream.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<AnswerEvent>> + Send>>;

const FOLLOWUP_OPEN: &str = "<<";
const FOLLOWUP_CLOSE: &str = ">>";

/// Split `content` into the answer before the first `<<` and the
/// `<<question>>` suggestions.
pub fn extract_followup_questions(content: &str) -> (String, Vec<String>) {
    let Some(start) = content.find(FOLLOWUP_OPEN) else {
        return (content.to_string(), Vec::new());
    };

    let mut questions = Vec::new();
    let mut rest = &content[start..];
    while let Some(open) = rest.find(FOLLOWUP_OPEN) {
        let after = &rest[open + FOLLOWUP_OPEN.len()..];
        match after.find('>') {
            Some(end) if end > 0 && after[end..].starts_with(FOLLOWUP_CLOSE) => {
                questions.push(after[..end].to_string());
                rest = &after[end + FOLLOWUP_CLOSE.len()..];
            }
            Some(end) => rest = &after[end..],
            None => break,
        }
    }

    (content[..start].to_string(), questions)
}

impl RagOrchestrator {
    /// Produce a buffered answer.
    pub async fn run(
        &self,
        messages: &[ChatMessage],
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
        session_state: Option<serde_json::Value>,
    ) -> AppResult<ChatAnswer> {
        let (mut extra_info, deferred) = self.answer(messages, overrides, claims, false).await?;

        let completion = match deferred.await? {
            Completion::Buffered(completion) => completion,
            Completion::Streamed(_) => {
                return Err(AppError::Completion(
                    "Expected a buffered completion".to_string(),
                ))
            }
        };

        let mut content = completion.content;
        if overrides.suggest_followup_questions {
            let (answer, questions) = extract_followup_questions(&content);
            content = answer;
            extra_info.followup_questions = Some(questions);
        }

        tracing::info!(
            finish_reason = completion.finish_reason.as_deref().unwrap_or("unknown"),
            total_tokens = completion.usage.total_tokens,
            "Answer complete"
        );

        Ok(ChatAnswer {
            message: AnswerMessage {
                role: completion.role,
                content,
            },
            context: extra_info,
            session_state,
        })
    }

    /// Produce a streamed answer.
    ///
    /// Retrieval and prompt assembly finish before this returns; the
    /// completion request is sent here and its chunks are read lazily.
    pub async fn run_stream(
        &self,
        messages: &[ChatMessage],
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
        session_state: Option<serde_json::Value>,
    ) -> AppResult<AnswerStream> {
        let (extra_info, deferred) = self.answer(messages, overrides, claims, true).await?;

        let chunks = match deferred.await? {
            Completion::Streamed(stream) => stream,
            Completion::Buffered(_) => {
                return Err(AppError::Completion(
                    "Expected a streamed completion".to_string(),
                ))
            }
        };

        let first = AnswerEvent::Context {
            role: ChatRole::Assistant,
            context: extra_info,
            session_state,
        };

        Ok(answer_events(
            first,
            chunks,
            overrides.suggest_followup_questions,
        ))
    }
}

struct EventState {
    chunks: ChatStream,
    split_followups: bool,
    in_followups: bool,
    held: String,
    followup_text: String,
    queue: VecDeque<AppResult<AnswerEvent>>,
    finished: bool,
}

impl EventState {
    fn push_delta(&mut self, content: &str) {
        if !content.is_empty() {
            self.queue.push_back(Ok(AnswerEvent::Delta {
                content: content.to_string(),
            }));
        }
    }

    fn accept(&mut self, content: &str) {
        let text = std::mem::take(&mut self.held) + content;

        if self.in_followups {
            self.followup_text.push_str(&text);
        } else if !self.split_followups {
            self.push_delta(&text);
        } else if let Some(pos) = text.find(FOLLOWUP_OPEN) {
            self.push_delta(&text[..pos]);
            self.followup_text.push_str(&text[pos..]);
            self.in_followups = true;
        } else if let Some(stripped) = text.strip_suffix('<') {
            // may be the first half of "<<"
            self.push_delta(stripped);
            self.held.push('<');
        } else {
            self.push_delta(&text);
        }
    }

    fn finish(&mut self, finish_reason: Option<String>) {
        let held = std::mem::take(&mut self.held);
        self.push_delta(&held);

        if !self.followup_text.is_empty() {
            let (_, questions) = extract_followup_questions(&self.followup_text);
            self.queue
                .push_back(Ok(AnswerEvent::FollowupQuestions { questions }));
        }

        self.queue
            .push_back(Ok(AnswerEvent::Done { finish_reason }));
        self.finished = true;
    }
}

/// Turn completion chunks into answer events, holding back everything from
/// the first `<<` when follow-up questions are split off.
fn answer_events(first: AnswerEvent, chunks: ChatStream, split_followups: bool) -> AnswerStream {
    let state = EventState {
        chunks,
        split_followups,
        in_followups: false,
        held: String::new(),
        followup_text: String::new(),
        queue: VecDeque::from([Ok(first)]),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    state.accept(&chunk.content);
                    if chunk.done {
                        state.finish(chunk.finish_reason);
                    }
                }
                Some(Err(e)) => {
                    state.queue.push_back(Err(e));
                    state.finished = true;
                }
                None => state.finish(None),
            }
        }
    });

    Box::pin(stream)
}
