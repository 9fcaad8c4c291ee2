//! Token-budgeted message assembly.

use grounded_core::AppResult;
use grounded_llm::{ChatMessage, TokenCounter};

/// Inputs for one message assembly.
#[derive(Debug, Clone)]
pub struct MessageRequest<'a> {
    /// Model whose token accounting applies
    pub model: &'a str,

    /// Rendered system prompt
    pub system_prompt: &'a str,

    /// Example exchanges placed after the system prompt
    pub few_shots: &'a [ChatMessage],

    /// Earlier conversation, oldest first
    pub past_messages: &'a [ChatMessage],

    /// Content of the new user turn
    pub new_user_content: &'a str,

    /// Token budget for the whole prompt
    pub max_tokens: usize,

    /// Use the default accounting for unrecognized models
    pub allow_fallback: bool,
}

/// Assemble `system + few shots + history + new user turn` within budget.
///
/// The system prompt, few shots and the new turn are always kept. History is
/// walked newest first and stops at the first message that does not fit;
/// that message and everything older are dropped.
pub fn build_messages(
    counter: &dyn TokenCounter,
    request: &MessageRequest<'_>,
) -> AppResult<Vec<ChatMessage>> {
    let system = ChatMessage::system(request.system_prompt);
    let new_user = ChatMessage::user(request.new_user_content);

    let mut total = counter.count_message_tokens(request.model, &system, request.allow_fallback)?
        + counter.count_message_tokens(request.model, &new_user, request.allow_fallback)?
        + counter.count_messages(request.model, request.few_shots, request.allow_fallback)?;

    if total > request.max_tokens {
        tracing::warn!(
            "Required messages use {} tokens, above the budget of {}",
            total,
            request.max_tokens
        );
    }

    let mut history = Vec::new();
    for message in request.past_messages.iter().rev() {
        let cost = counter.count_message_tokens(request.model, message, request.allow_fallback)?;
        if total + cost > request.max_tokens {
            break;
        }
        total += cost;
        history.push(message.clone());
    }
    history.reverse();

    let dropped = request.past_messages.len() - history.len();
    if dropped > 0 {
        tracing::warn!(
            "Dropped {} of {} history messages to fit {} tokens",
            dropped,
            request.past_messages.len(),
            request.max_tokens
        );
    }
    tracing::debug!(tokens = total, messages = history.len() + 2, "Built prompt messages");

    let mut messages = Vec::with_capacity(2 + request.few_shots.len() + history.len());
    messages.push(system);
    messages.extend(request.few_shots.iter().cloned());
    messages.extend(history);
    messages.push(new_user);

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounded_core::AppError;

    /// One token per whitespace-separated word plus a 3 token overhead.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn token_limit(&self, _model: &str, _allow_fallback: bool) -> AppResult<usize> {
            Ok(100)
        }

        fn count_message_tokens(
            &self,
            model: &str,
            message: &ChatMessage,
            allow_fallback: bool,
        ) -> AppResult<usize> {
            if model == "unknown" && !allow_fallback {
                return Err(AppError::UnsupportedModel(model.to_string()));
            }
            Ok(3 + message.content.to_plain_text().split_whitespace().count())
        }
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("one two three four five"),
            ChatMessage::assistant("six seven"),
            ChatMessage::user("eight nine ten"),
            ChatMessage::assistant("eleven"),
        ]
    }

    fn request<'a>(past: &'a [ChatMessage], max_tokens: usize) -> MessageRequest<'a> {
        MessageRequest {
            model: "gpt-4o",
            system_prompt: "be brief",
            few_shots: &[],
            past_messages: past,
            new_user_content: "what now",
            max_tokens,
            allow_fallback: false,
        }
    }

    #[test]
    fn test_everything_fits() {
        let past = history();
        let messages = build_messages(&WordCounter, &request(&past, 1000)).unwrap();

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0], ChatMessage::system("be brief"));
        assert_eq!(messages[1..5], past[..]);
        assert_eq!(messages[5], ChatMessage::user("what now"));
    }

    #[test]
    fn test_oldest_dropped_first() {
        let past = history();
        // system 5 + user 5 = 10; newest history costs 4, 6, 5, 8
        let messages = build_messages(&WordCounter, &request(&past, 26)).unwrap();

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1], past[1]);
        assert_eq!(messages[3], past[3]);
    }

    #[test]
    fn test_budget_is_tight() {
        let past = history();
        for budget in 0..40 {
            let req = request(&past, budget);
            let messages = build_messages(&WordCounter, &req).unwrap();
            let total = WordCounter.count_messages("gpt-4o", &messages, false).unwrap();
            let included = messages.len() - 2;

            if included > 0 {
                assert!(total <= budget, "budget {} exceeded: {}", budget, total);
            }
            if included < past.len() {
                let next = &past[past.len() - included - 1];
                let cost = WordCounter.count_message_tokens("gpt-4o", next, false).unwrap();
                assert!(total + cost > budget, "message fitting {} was dropped", budget);
            }
        }
    }

    #[test]
    fn test_walk_stops_at_first_misfit() {
        // A large recent message blocks smaller older ones.
        let past = vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b c d e f g h i j k l m n o p"),
        ];
        let messages = build_messages(&WordCounter, &request(&past, 20)).unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_required_messages_never_trimmed() {
        let past = history();
        let messages = build_messages(&WordCounter, &request(&past, 1)).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.as_text(), Some("be brief"));
        assert_eq!(messages[1].content.as_text(), Some("what now"));
    }

    #[test]
    fn test_few_shots_follow_system_prompt() {
        let shots = vec![
            ChatMessage::user("example question"),
            ChatMessage::assistant("example answer"),
        ];
        let past = history();
        let mut req = request(&past, 1000);
        req.few_shots = &shots;

        let messages = build_messages(&WordCounter, &req).unwrap();
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[1], shots[0]);
        assert_eq!(messages[2], shots[1]);
        assert_eq!(messages[3], past[0]);
    }

    #[test]
    fn test_unknown_model_propagates() {
        let past = history();
        let mut req = request(&past, 1000);
        req.model = "unknown";

        assert!(matches!(
            build_messages(&WordCounter, &req),
            Err(AppError::UnsupportedModel(_))
        ));

        req.allow_fallback = true;
        assert!(build_messages(&WordCounter, &req).is_ok());
    }
}
