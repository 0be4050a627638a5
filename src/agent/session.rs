//! One reply of the reasoning agent, streamed chunk by chunk.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::AgentDefaults;
use crate::error::{AptoError, Result};
use crate::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
use crate::session::{Message, Session, SessionManager, ToolCall};
use crate::tools::{ToolContext, ToolRegistry};
use crate::utils::KeyedLocks;

use super::ContextBuilder;

/// Chunks buffered between the reasoning task and the consumer.
const CHUNK_BUFFER: usize = 16;

const INTERRUPTED_TOOL_RESULT: &str =
    r#"{"error":"interrupted","message":"the reply was interrupted before this call finished"}"#;

/// One incremental unit of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseChunk {
    /// Natural-language text for the user.
    Agent { content: String },
    /// The agent decided to call these tools.
    ToolCalls { names: Vec<String> },
    /// A tool finished.
    ToolResult { name: String, is_error: bool },
}

impl ResponseChunk {
    /// Only agent text is shown to the user; tool bookkeeping is not.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, ResponseChunk::Agent { content } if !content.trim().is_empty())
    }

    /// The user-facing text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            ResponseChunk::Agent { content } if !content.trim().is_empty() => Some(content),
            _ => None,
        }
    }
}

/// Finite, non-restartable stream of [`ResponseChunk`]s.
///
/// A failure arrives as the last item. Dropping the stream cancels the
/// reasoning task.
pub struct ResponseStream {
    rx: mpsc::Receiver<Result<ResponseChunk>>,
    task: JoinHandle<()>,
}

impl Stream for ResponseStream {
    type Item = Result<ResponseChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type ChunkSender = mpsc::Sender<Result<ResponseChunk>>;

/// A reasoning agent bound to one user's signer and conversation thread.
///
/// Built per message by [`SessionFactory`](super::SessionFactory); the
/// conversation itself lives in the [`SessionManager`].
pub struct AgentSession {
    pub(super) thread_id: String,
    pub(super) ctx: ToolContext,
    pub(super) provider: Arc<dyn LLMProvider>,
    pub(super) tools: Arc<ToolRegistry>,
    pub(super) sessions: SessionManager,
    pub(super) context: ContextBuilder,
    pub(super) settings: AgentDefaults,
    pub(super) thread_locks: KeyedLocks,
}

impl AgentSession {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Answer `text`, streaming chunks as the reasoning loop produces them.
    ///
    /// Consumes the session: every message needs a fresh one. The reply
    /// runs on its own task and holds the thread's lock until it finishes,
    /// fails, times out or the stream is dropped.
    pub fn stream_respond(self, text: &str) -> ResponseStream {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let text = text.to_string();
        let task = tokio::spawn(
            async move { self.respond(text, tx).await }.instrument(tracing::Span::current()),
        );
        ResponseStream { rx, task }
    }

    async fn respond(self, text: String, tx: ChunkSender) {
        let _thread_guard = self.thread_locks.acquire(&self.thread_id).await;
        let start = Instant::now();

        let mut session = match self.sessions.get_or_create(&self.thread_id).await {
            Ok(session) => session,
            Err(e) => {
                error!(thread_id = %self.thread_id, error = %e, "Failed to load conversation");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        session.add_message(Message::user(&text));

        let limit = Duration::from_secs(self.settings.agent_timeout_secs);
        let outcome = match tokio::time::timeout(limit, self.reason(&mut session, &tx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    thread_id = %self.thread_id,
                    timeout_secs = self.settings.agent_timeout_secs,
                    "Agent reply timed out"
                );
                Err(AptoError::AgentTimeout(self.settings.agent_timeout_secs))
            }
        };

        if outcome.is_err() {
            session.close_pending_tool_calls(INTERRUPTED_TOOL_RESULT);
        }
        session.trim_to(self.settings.max_history_messages);
        let saved = self.sessions.save(&session).await;

        match (outcome, saved) {
            (Ok(()), Ok(())) => {
                info!(
                    thread_id = %self.thread_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Agent reply finished"
                );
            }
            (Ok(()), Err(e)) => {
                error!(thread_id = %self.thread_id, error = %e, "Failed to save conversation");
                let _ = tx.send(Err(e)).await;
            }
            (Err(e), saved) => {
                if let Err(save_err) = saved {
                    error!(thread_id = %self.thread_id, error = %save_err, "Failed to save conversation");
                }
                let _ = tx.send(Err(e)).await;
            }
        }
    }

    /// The tool loop. Appends every step to `session`.
    async fn reason(&self, session: &mut Session, tx: &ChunkSender) -> Result<()> {
        let tool_definitions = self.tools.definitions();
        let options = ChatOptions::new()
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);
        let max_iterations = self.settings.max_tool_iterations;
        let mut iteration = 0;

        loop {
            let messages = self.context.build_messages(&session.messages);
            let response = self
                .call_provider(messages, tool_definitions.clone(), options.clone())
                .await?;

            if !response.content.trim().is_empty() {
                emit(
                    tx,
                    ResponseChunk::Agent {
                        content: response.content.clone(),
                    },
                )
                .await;
            }

            if !response.has_tool_calls() {
                session.add_message(Message::assistant(&response.content));
                return Ok(());
            }

            if iteration >= max_iterations {
                info!(
                    iterations = iteration,
                    "Tool loop reached maximum iterations, returning partial response"
                );
                session.add_message(Message::assistant(&response.content));
                if response.content.trim().is_empty() {
                    emit(
                        tx,
                        ResponseChunk::Agent {
                            content: format!(
                                "I stopped after {} tool steps without finishing. \
                                 Please try a simpler request.",
                                iteration
                            ),
                        },
                    )
                    .await;
                }
                return Ok(());
            }
            iteration += 1;
            debug!("Tool iteration {} of {}", iteration, max_iterations);

            let calls: Vec<ToolCall> = response.tool_calls.iter().map(ToolCall::from).collect();
            session.add_message(Message::assistant_with_tools(&response.content, calls));
            emit(
                tx,
                ResponseChunk::ToolCalls {
                    names: response.tool_calls.iter().map(|c| c.name.clone()).collect(),
                },
            )
            .await;

            for call in &response.tool_calls {
                info!(tool = %call.name, id = %call.id, "Executing tool");
                let output = self
                    .tools
                    .execute_with_context(&call.name, call.arguments_json(), &self.ctx)
                    .await;
                session.add_message(Message::tool_result(&call.id, &output.for_llm));
                emit(
                    tx,
                    ResponseChunk::ToolResult {
                        name: call.name.clone(),
                        is_error: output.is_error,
                    },
                )
                .await;
            }
        }
    }

    async fn call_provider(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let secs = self.settings.request_timeout_secs;
        let call = self
            .provider
            .chat(messages, tools, Some(self.settings.model.as_str()), options);
        match tokio::time::timeout(Duration::from_secs(secs), call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                error!(provider = self.provider.name(), error = %e, "Reasoning backend failed");
                Err(AptoError::AgentUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(provider = self.provider.name(), timeout_secs = secs, "Reasoning call timed out");
                Err(AptoError::AgentTimeout(secs))
            }
        }
    }
}

async fn emit(tx: &ChunkSender, chunk: ResponseChunk) {
    // A closed channel means the consumer is gone and this task is being aborted.
    let _ = tx.send(Ok(chunk)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_chunks() {
        let text = ResponseChunk::Agent {
            content: "Your balance is 1 APT".into(),
        };
        assert!(text.is_user_facing());
        assert_eq!(text.text(), Some("Your balance is 1 APT"));

        let blank = ResponseChunk::Agent {
            content: "  \n".into(),
        };
        assert!(!blank.is_user_facing());
        assert_eq!(blank.text(), None);

        let calls = ResponseChunk::ToolCalls {
            names: vec!["aptos_get_balance".into()],
        };
        assert!(!calls.is_user_facing());
        let result = ResponseChunk::ToolResult {
            name: "aptos_get_balance".into(),
            is_error: false,
        };
        assert!(!result.is_user_facing());
    }
}
