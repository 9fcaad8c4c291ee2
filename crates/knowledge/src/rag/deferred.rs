//! Completion calls handed to the caller unstarted.

use futures::future::BoxFuture;
use grounded_core::AppResult;
use grounded_llm::{ChatCompletion, ChatStream, CompletionClient, CompletionRequest};
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;

/// Result of a completion call.
pub enum Completion {
    /// The whole response at once
    Buffered(ChatCompletion),

    /// Incremental chunks; consume once, drop to cancel
    Streamed(ChatStream),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(completion) => f.debug_tuple("Buffered").field(completion).finish(),
            Self::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// A fully prepared completion request that has not been sent.
///
/// Nothing touches the network until the handle is awaited (or `run` is
/// called). The request's `stream` flag decides whether the result is
/// `Completion::Buffered` or `Completion::Streamed`.
pub struct DeferredCompletion {
    client: Arc<dyn CompletionClient>,
    request: CompletionRequest,
}

impl DeferredCompletion {
    pub fn new(client: Arc<dyn CompletionClient>, request: CompletionRequest) -> Self {
        Self { client, request }
    }

    /// The request that will be sent.
    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    pub fn is_streaming(&self) -> bool {
        self.request.stream
    }

    /// Send the request.
    pub async fn run(self) -> AppResult<Completion> {
        tracing::debug!(
            provider = self.client.provider_name(),
            model = %self.request.model,
            stream = self.request.stream,
            "Starting completion"
        );

        if self.request.stream {
            Ok(Completion::Streamed(self.client.stream(&self.request).await?))
        } else {
            Ok(Completion::Buffered(self.client.complete(&self.request).await?))
        }
    }
}

impl fmt::Debug for DeferredCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCompletion")
            .field("provider", &self.client.provider_name())
            .field("request", &self.request)
            .finish()
    }
}

impl IntoFuture for DeferredCompletion {
    type Output = AppResult<Completion>;
    type IntoFuture = BoxFuture<'static, AppResult<Completion>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}
