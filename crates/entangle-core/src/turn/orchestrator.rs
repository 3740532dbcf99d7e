//! Turn orchestrator.
//!
//! Drives one turn through `Received -> UserPersisted -> Completing ->
//! AiPersisted -> Done` (or `Failed`). The user message is committed before
//! the completion engine is contacted, and the assistant message is only
//! written after a successful reply, so the store never holds a reply
//! without its prompt.
//!
//! The completion call and the assistant append run on a spawned task. If the
//! caller goes away mid-turn, the task still runs to reply or timeout and
//! persists what it got.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};

use entangle_types::chat::{ChatId, ChatMessage, NewMessage, Transcript};
use entangle_types::error::TurnError;
use entangle_types::llm::LlmError;
use entangle_types::turn::{TurnInput, TurnState, ValidTurn};

use crate::chat::repository::ChatRepository;
use crate::chat::transcript::TranscriptProjection;
use crate::llm::client::CompletionClient;

/// Runs turns against a chat store and a completion client.
pub struct TurnOrchestrator<C: ChatRepository + 'static> {
    chat_repo: Arc<C>,
    client: Arc<CompletionClient>,
    projection: TranscriptProjection<C>,
}

impl<C: ChatRepository + 'static> Clone for TurnOrchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            chat_repo: self.chat_repo.clone(),
            client: self.client.clone(),
            projection: self.projection.clone(),
        }
    }
}

impl<C: ChatRepository + 'static> TurnOrchestrator<C> {
    pub fn new(chat_repo: Arc<C>, client: Arc<CompletionClient>) -> Self {
        let projection = TranscriptProjection::new(chat_repo.clone());
        Self {
            chat_repo,
            client,
            projection,
        }
    }

    pub fn projection(&self) -> &TranscriptProjection<C> {
        &self.projection
    }

    /// Read-only transcript of `chat_id`.
    pub async fn transcript(&self, chat_id: &ChatId) -> Result<Transcript, TurnError> {
        self.projection.project(chat_id).await
    }

    /// Submit one turn and return the chat's full transcript.
    ///
    /// On an upstream failure the user message stays persisted and the
    /// returned error names the chat, so the caller can re-read and resubmit.
    pub async fn submit_turn(&self, input: TurnInput) -> Result<Transcript, TurnError> {
        let turn = input.validate()?;

        let span = info_span!(
            "turn.submit",
            chat_id = %turn.chat_id,
            sender_id = %turn.sender_id,
        );
        self.run(turn).instrument(span).await
    }

    async fn run(&self, turn: ValidTurn) -> Result<Transcript, TurnError> {
        let ValidTurn {
            chat_id,
            sender_id,
            content,
        } = turn;
        debug!(state = %TurnState::Received, "Turn received");

        self.chat_repo
            .create_if_absent(&chat_id)
            .await
            .map_err(|e| TurnError::from_repository(&chat_id, e))?;

        let user_message = match self
            .chat_repo
            .append_message(&chat_id, NewMessage::user(sender_id, content.clone()))
            .await
        {
            Ok(message) => message,
            Err(e) => {
                self.discard_empty_chat(&chat_id).await;
                return Err(TurnError::from_repository(&chat_id, e));
            }
        };
        debug!(state = %TurnState::UserPersisted, seq = user_message.seq, "User message stored");

        let context = self.context_before(&user_message).await?;

        let task = tokio::spawn(
            complete_and_persist(
                self.chat_repo.clone(),
                self.client.clone(),
                chat_id.clone(),
                context,
                content,
            )
            .in_current_span(),
        );

        match task.await {
            Ok(result) => result?,
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => {
                return Err(TurnError::Upstream {
                    chat_id,
                    source: LlmError::Unavailable(format!("completion task cancelled: {join_err}")),
                });
            }
        }

        self.projection.project(&chat_id).await
    }

    /// Undo the implicit create when the first append failed, so a turn that
    /// stored nothing leaves no chat behind. A chat that already has messages
    /// is kept.
    async fn discard_empty_chat(&self, chat_id: &ChatId) {
        match self.chat_repo.discard_if_empty(chat_id).await {
            Ok(true) => debug!("Discarded empty chat after failed user append"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not discard empty chat"),
        }
    }

    /// Every message strictly before `user_message`.
    async fn context_before(&self, user_message: &ChatMessage) -> Result<Vec<ChatMessage>, TurnError> {
        let chat_id = &user_message.chat_id;
        let chat = self
            .chat_repo
            .get_chat(chat_id)
            .await
            .map_err(|e| TurnError::from_repository(chat_id, e))?
            .ok_or_else(|| TurnError::NotFound {
                chat_id: chat_id.clone(),
            })?;

        Ok(chat
            .messages
            .into_iter()
            .take_while(|m| m.seq < user_message.seq)
            .collect())
    }
}

/// Steps `Completing` through `AiPersisted`. Owns its inputs so it can
/// outlive the submitting request.
async fn complete_and_persist<C: ChatRepository>(
    chat_repo: Arc<C>,
    client: Arc<CompletionClient>,
    chat_id: ChatId,
    context: Vec<ChatMessage>,
    content: String,
) -> Result<(), TurnError> {
    debug!(
        state = %TurnState::Completing,
        provider = client.provider_name(),
        context_messages = context.len(),
        "Requesting completion"
    );

    let reply = match client.complete(&context, &content).await {
        Ok(reply) => reply,
        Err(source) => {
            warn!(state = %TurnState::Failed, error = %source, "Completion failed");
            return Err(TurnError::Upstream { chat_id, source });
        }
    };

    match chat_repo
        .append_message(&chat_id, NewMessage::assistant(reply.clone()))
        .await
    {
        Ok(stored) => {
            debug!(state = %TurnState::AiPersisted, seq = stored.seq, "Assistant message stored");
            info!(state = %TurnState::Done, "Turn complete");
            Ok(())
        }
        Err(source) => {
            error!(
                state = %TurnState::Failed,
                chat_id = %chat_id,
                error = %source,
                reply = %reply,
                "Assistant reply generated but not stored"
            );
            Err(TurnError::ReplyLost { chat_id, source })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use entangle_types::error::ErrorKind;
    use entangle_types::llm::{MessageRole, UpstreamFailure};

    use crate::chat::memory::InMemoryChatRepository;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::client::CompletionSettings;
    use crate::testing::{FaultyChatRepository, ScriptedProvider};

    fn settings(timeout: Duration) -> CompletionSettings {
        CompletionSettings {
            model: "test-model".to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: 128,
            timeout,
        }
    }

    fn orchestrator<C: ChatRepository + 'static>(
        repo: Arc<C>,
        provider: ScriptedProvider,
        timeout: Duration,
    ) -> TurnOrchestrator<C> {
        let client = CompletionClient::new(BoxLlmProvider::new(provider), settings(timeout));
        TurnOrchestrator::new(repo, Arc::new(client))
    }

    fn pairs(transcript: &Transcript) -> Vec<(&str, &str)> {
        transcript
            .messages
            .iter()
            .map(|m| (m.sender_id.as_str(), m.content.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_successful_turn_appends_user_then_assistant() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(
            repo.clone(),
            ScriptedProvider::replying("hi there"),
            Duration::from_secs(5),
        );

        let transcript = orch
            .submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap();

        assert_eq!(transcript.chat_id.as_str(), "c1");
        assert_eq!(pairs(&transcript), vec![("u1", "hello"), ("ai", "hi there")]);
        assert!(transcript.messages[0].created_at <= transcript.messages[1].created_at);
    }

    #[tokio::test]
    async fn test_each_successful_turn_adds_two_messages() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(repo, ScriptedProvider::echo(), Duration::from_secs(5));

        for (i, text) in ["one", "two", "three"].into_iter().enumerate() {
            let transcript = orch
                .submit_turn(TurnInput::new("c1", "u1", text))
                .await
                .unwrap();
            assert_eq!(transcript.messages.len(), 2 * (i + 1));
            let last_two = &transcript.messages[transcript.messages.len() - 2..];
            assert_eq!(last_two[0].content, text);
            assert_eq!(last_two[1].content, format!("echo: {text}"));
            assert!(last_two[1].sender_id.is_ai());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_timeout_keeps_user_message_only() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(
            repo,
            ScriptedProvider::replying("too late").with_delay(Duration::from_secs(30)),
            Duration::from_secs(5),
        );

        let err = orch
            .submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);
        assert_eq!(err.chat_id().map(ChatId::as_str), Some("c1"));

        let transcript = orch.transcript(&ChatId::parse("c1").unwrap()).await.unwrap();
        assert_eq!(pairs(&transcript), vec![("u1", "hello")]);
    }

    #[tokio::test]
    async fn test_upstream_failure_adds_exactly_one_message() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let good = orchestrator(
            repo.clone(),
            ScriptedProvider::replying("hi there"),
            Duration::from_secs(5),
        );
        good.submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap();

        let bad = orchestrator(
            repo.clone(),
            ScriptedProvider::failing(|| LlmError::InvalidRequest("prompt rejected".into())),
            Duration::from_secs(5),
        );
        let err = bad
            .submit_turn(TurnInput::new("c1", "u1", "second"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamRejected);

        let transcript = bad.transcript(&ChatId::parse("c1").unwrap()).await.unwrap();
        assert_eq!(transcript.messages.len(), 3);
        assert_eq!(transcript.messages[2].content, "second");
        assert!(!transcript.messages[2].sender_id.is_ai());
    }

    #[tokio::test]
    async fn test_empty_content_persists_nothing() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let provider = ScriptedProvider::replying("unused");
        let calls = provider.calls();
        let orch = orchestrator(repo.clone(), provider, Duration::from_secs(5));

        for (input, named_chat) in [
            (TurnInput::new("c1", "u1", ""), Some("c1")),
            (TurnInput::new("c1", "u1", "   "), Some("c1")),
            (TurnInput::new("", "u1", "hello"), None),
            (TurnInput::new("c1", "", "hello"), Some("c1")),
        ] {
            let err = orch.submit_turn(input).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            assert_eq!(err.chat_id().map(ChatId::as_str), named_chat);
        }

        assert_eq!(repo.chat_count(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_cannot_impersonate_assistant() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(repo.clone(), ScriptedProvider::replying("x"), Duration::from_secs(5));

        let err = orch
            .submit_turn(TurnInput::new("c1", "ai", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(repo.chat_count(), 0);
    }

    #[tokio::test]
    async fn test_context_excludes_new_input() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let provider = ScriptedProvider::replying("ok");
        let calls = provider.calls();
        let orch = orchestrator(repo, provider, Duration::from_secs(5));

        orch.submit_turn(TurnInput::new("c1", "u1", "first"))
            .await
            .unwrap();
        orch.submit_turn(TurnInput::new("c1", "u1", "second"))
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].messages.len(), 1);

        let roles: Vec<MessageRole> = calls[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
        );
        let contents: Vec<&str> = calls[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "ok", "second"]);
    }

    #[tokio::test]
    async fn test_store_failure_before_user_append_persists_nothing() {
        let repo = Arc::new(FaultyChatRepository::new(InMemoryChatRepository::new()));
        repo.fail_create(true);
        let provider = ScriptedProvider::replying("unused");
        let calls = provider.calls();
        let orch = orchestrator(repo.clone(), provider, Duration::from_secs(5));

        let err = orch
            .submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert_eq!(err.chat_id().map(ChatId::as_str), Some("c1"));
        assert_eq!(repo.inner().chat_count(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_append_failure_skips_completion() {
        let repo = Arc::new(FaultyChatRepository::new(InMemoryChatRepository::new()));
        repo.fail_user_append(true);
        let provider = ScriptedProvider::replying("unused");
        let calls = provider.calls();
        let orch = orchestrator(repo.clone(), provider, Duration::from_secs(5));

        let err = orch
            .submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(calls.lock().unwrap().is_empty());

        assert_eq!(repo.inner().chat_count(), 0);
        let err = orch
            .transcript(&ChatId::parse("c1").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_user_append_failure_keeps_existing_history() {
        let repo = Arc::new(FaultyChatRepository::new(InMemoryChatRepository::new()));
        let orch = orchestrator(repo.clone(), ScriptedProvider::replying("ok"), Duration::from_secs(5));
        orch.submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap();

        repo.fail_user_append(true);
        let err = orch
            .submit_turn(TurnInput::new("c1", "u1", "again"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        let transcript = orch.transcript(&ChatId::parse("c1").unwrap()).await.unwrap();
        assert_eq!(pairs(&transcript), vec![("u1", "hello"), ("ai", "ok")]);
    }

    #[tokio::test]
    async fn test_assistant_append_failure_is_reply_lost() {
        let repo = Arc::new(FaultyChatRepository::new(InMemoryChatRepository::new()));
        repo.fail_ai_append(true);
        let orch = orchestrator(
            repo.clone(),
            ScriptedProvider::replying("hi there"),
            Duration::from_secs(5),
        );

        let err = orch
            .submit_turn(TurnInput::new("c1", "u1", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplyLost);
        assert_ne!(err.kind(), ErrorKind::StoreUnavailable);

        let transcript = orch.transcript(&ChatId::parse("c1").unwrap()).await.unwrap();
        assert_eq!(pairs(&transcript), vec![("u1", "hello")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_turn_still_completes() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(
            repo.clone(),
            ScriptedProvider::replying("hi there").with_delay(Duration::from_secs(10)),
            Duration::from_secs(60),
        );

        let submitting = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.submit_turn(TurnInput::new("c1", "u1", "hello")).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let id = ChatId::parse("c1").unwrap();
        assert_eq!(orch.transcript(&id).await.unwrap().messages.len(), 1);

        submitting.abort();
        tokio::time::sleep(Duration::from_secs(20)).await;

        let transcript = orch.transcript(&id).await.unwrap();
        assert_eq!(pairs(&transcript), vec![("u1", "hello"), ("ai", "hi there")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_turns_on_one_chat_lose_nothing() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(repo.clone(), ScriptedProvider::echo(), Duration::from_secs(5));

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let orch = orch.clone();
                tokio::spawn(async move {
                    orch.submit_turn(TurnInput::new("shared", "u1", format!("m{i}")))
                        .await
                        .unwrap()
                })
            })
            .collect();
        futures_util::future::join_all(tasks).await;

        let chat = repo
            .get_chat(&ChatId::parse("shared").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chat.messages.len(), 20);
        let seqs: Vec<u64> = chat.messages.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<u64>>());

        for i in 0..10 {
            let prompt = format!("m{i}");
            let user_pos = chat.messages.iter().position(|m| m.content == prompt).unwrap();
            let reply_pos = chat
                .messages
                .iter()
                .position(|m| m.content == format!("echo: {prompt}"))
                .unwrap();
            assert!(user_pos < reply_pos, "reply for {prompt} precedes its prompt");
        }
    }

    #[tokio::test]
    async fn test_turns_on_different_chats_are_independent() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let orch = orchestrator(repo.clone(), ScriptedProvider::echo(), Duration::from_secs(5));

        let (a, b) = tokio::join!(
            orch.submit_turn(TurnInput::new("a", "u1", "to a")),
            orch.submit_turn(TurnInput::new("b", "u2", "to b")),
        );
        assert_eq!(pairs(&a.unwrap()), vec![("u1", "to a"), ("ai", "echo: to a")]);
        assert_eq!(pairs(&b.unwrap()), vec![("u2", "to b"), ("ai", "echo: to b")]);
        assert_eq!(repo.chat_count(), 2);
    }

    #[test]
    fn test_upstream_failure_kinds_are_retryable_except_rejected() {
        assert!(ErrorKind::from(UpstreamFailure::Timeout).is_retryable());
        assert!(ErrorKind::from(UpstreamFailure::Unavailable).is_retryable());
        assert!(!ErrorKind::from(UpstreamFailure::Rejected).is_retryable());
    }
}
