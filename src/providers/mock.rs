//! Scripted provider used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AptoError, ProviderError, Result};
use crate::session::Message;

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

enum Step {
    Reply(LLMResponse),
    Fail(fn() -> AptoError),
    Stall(Duration),
}

/// Answers each `chat` call with the next scripted step; plain text once the
/// script runs out.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, response: LLMResponse) -> Self {
        self.steps.lock().unwrap().push_back(Step::Reply(response));
        self
    }

    pub(crate) fn text(self, content: &str) -> Self {
        self.reply(LLMResponse::text(content))
    }

    pub(crate) fn unreachable(self) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Fail(|| ProviderError::ServerError("connection refused".into()).into()));
        self
    }

    pub(crate) fn stall(self, delay: Duration) -> Self {
        self.steps.lock().unwrap().push_back(Step::Stall(delay));
        self
    }

    /// Messages sent with each call so far.
    pub(crate) fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        self.requests.lock().unwrap().push(messages);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(make)) => Err(make()),
            Some(Step::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(LLMResponse::text("too late"))
            }
            None => Ok(LLMResponse::text("Done.")),
        }
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
