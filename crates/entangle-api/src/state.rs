//! Application state wiring the store, the completion client, and the
//! orchestrator together.
//!
//! The orchestrator is generic over its store; `AppState` pins it to the
//! SQLite implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use entangle_core::chat::transcript::TranscriptProjection;
use entangle_core::llm::box_provider::BoxLlmProvider;
use entangle_core::llm::client::{CompletionClient, CompletionSettings};
use entangle_core::turn::TurnOrchestrator;
use entangle_infra::config::{database_url, load_global_config, resolve_data_dir};
use entangle_infra::llm::{api_key_from_env, create_provider};
use entangle_infra::sqlite::chat::SqliteChatRepository;
use entangle_infra::sqlite::pool::DatabasePool;
use entangle_types::config::{AuthConfig, GlobalConfig};

pub type ConcreteOrchestrator = TurnOrchestrator<SqliteChatRepository>;

/// Data directory, parsed config, and open database.
pub struct Storage {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
    pub db_pool: DatabasePool,
}

impl Storage {
    /// Resolve the data directory, load `config.toml`, and open the database.
    pub async fn open() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        let db_url = database_url(&config, &data_dir);
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("opening database {db_url}"))?;

        Ok(Self {
            data_dir,
            config,
            db_pool,
        })
    }

    /// Read-only access to transcripts, without a completion provider.
    pub fn projection(&self) -> TranscriptProjection<SqliteChatRepository> {
        TranscriptProjection::new(Arc::new(SqliteChatRepository::new(self.db_pool.clone())))
    }
}

/// Shared application state for CLI commands and REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ConcreteOrchestrator,
    pub auth: Arc<AuthConfig>,
    pub config: Arc<GlobalConfig>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Open storage and build the completion provider named in config.
    pub async fn init() -> anyhow::Result<Self> {
        let storage = Storage::open().await?;

        let completion = &storage.config.completion;
        let api_key = api_key_from_env(completion).with_context(|| {
            format!(
                "set {} to the API key for provider '{}'",
                completion.api_key_env, completion.provider
            )
        })?;
        let provider = create_provider(completion, api_key)?;

        Ok(Self::new(storage.db_pool, provider, storage.config))
    }

    /// Wire state from already-built parts.
    pub fn new(db_pool: DatabasePool, provider: BoxLlmProvider, config: GlobalConfig) -> Self {
        let chat_repo = Arc::new(SqliteChatRepository::new(db_pool.clone()));
        let settings = CompletionSettings::from_config(&config.completion);
        let client = Arc::new(CompletionClient::new(provider, settings));

        Self {
            orchestrator: TurnOrchestrator::new(chat_repo, client),
            auth: Arc::new(config.auth.clone()),
            config: Arc::new(config),
            db_pool,
        }
    }
}
