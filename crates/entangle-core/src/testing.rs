//! Test doubles for the provider and store ports.
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! downstream crates' tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use entangle_types::chat::{Chat, ChatId, ChatMessage, NewMessage};
use entangle_types::error::RepositoryError;
use entangle_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, StopReason, Usage,
};

use crate::chat::repository::ChatRepository;
use crate::llm::provider::LlmProvider;

enum Script {
    Reply(String),
    Echo,
    Fail(Box<dyn Fn() -> LlmError + Send + Sync>),
}

/// Provider returning a canned outcome, optionally after a delay.
pub struct ScriptedProvider {
    script: Script,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(text.into()))
    }

    /// Reply with `"echo: {last user message}"`.
    pub fn echo() -> Self {
        Self::with_script(Script::Echo)
    }

    /// Always fail with the error built by `make_error`.
    pub fn failing(make_error: impl Fn() -> LlmError + Send + Sync + 'static) -> Self {
        Self::with_script(Script::Fail(Box::new(make_error)))
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle on every request received so far.
    pub fn calls(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.calls.clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match &self.script {
            Script::Reply(text) => text.clone(),
            Script::Echo => {
                let last = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                format!("echo: {last}")
            }
            Script::Fail(make_error) => return Err(make_error()),
        };

        Ok(CompletionResponse {
            id: "scripted-1".to_string(),
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}

/// Store wrapper that fails selected operations with `Connection` errors.
pub struct FaultyChatRepository<C: ChatRepository> {
    inner: C,
    fail_create: AtomicBool,
    fail_user_append: AtomicBool,
    fail_ai_append: AtomicBool,
}

impl<C: ChatRepository> FaultyChatRepository<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_user_append: AtomicBool::new(false),
            fail_ai_append: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn fail_create(&self, on: bool) {
        self.fail_create.store(on, Ordering::SeqCst);
    }

    pub fn fail_user_append(&self, on: bool) {
        self.fail_user_append.store(on, Ordering::SeqCst);
    }

    pub fn fail_ai_append(&self, on: bool) {
        self.fail_ai_append.store(on, Ordering::SeqCst);
    }
}

impl<C: ChatRepository> ChatRepository for FaultyChatRepository<C> {
    async fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        self.inner.get_chat(chat_id).await
    }

    async fn create_if_absent(&self, chat_id: &ChatId) -> Result<Chat, RepositoryError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.inner.create_if_absent(chat_id).await
    }

    async fn append_message(
        &self,
        chat_id: &ChatId,
        message: NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let flag = if message.sender_id.is_ai() {
            &self.fail_ai_append
        } else {
            &self.fail_user_append
        };
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.inner.append_message(chat_id, message).await
    }

    async fn discard_if_empty(&self, chat_id: &ChatId) -> Result<bool, RepositoryError> {
        self.inner.discard_if_empty(chat_id).await
    }
}
