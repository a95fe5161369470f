//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! clock, ids, store, provider, scheduler はすべてここで生成して注入します。
//! プロセスグローバルな状態は持ちません。
//!
//! # 起動時検証（Fail-fast）
//! 設定はファイルを開く前、スケジューラを起動する前に検証します。

use std::sync::Arc;

use tracing::info;

use super::dispatcher::NotificationDispatcher;
use super::scheduler::ReminderScheduler;
use super::service::ReminderService;
use crate::config::{ConfigError, ReminderConfig};
use crate::domain::StoreError;
use crate::impls::{JsonFileTaskStore, LogProvider};
use crate::ports::{Clock, IdGenerator, NotificationProvider, SystemClock, TaskStore, UlidGenerator};

/// AppBuilder は稼働中の `App` を組み立てる
///
/// # Example
/// ```ignore
/// let app = AppBuilder::new(ReminderConfig::load("reminder.toml")?)
///     .provider(Arc::new(SmtpProvider::new(creds)))
///     .build()
///     .await?;
/// ```
///
/// Defaults: `SystemClock`, `LogProvider`, and a `JsonFileTaskStore` at
/// `config.store_path`.
pub struct AppBuilder {
    config: ReminderConfig,
    clock: Option<Arc<dyn Clock>>,
    provider: Option<Arc<dyn NotificationProvider>>,
    store: Option<Arc<dyn TaskStore>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open task store: {0}")]
    Store(#[from] StoreError),
}

impl AppBuilder {
    pub fn new(config: ReminderConfig) -> Self {
        Self {
            config,
            clock: None,
            provider: None,
            store: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn NotificationProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use this store instead of opening `config.store_path`.
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate config, open the store and start the scheduler.
    ///
    /// Must be awaited inside a Tokio runtime (the scheduler spawns its
    /// timing loop).
    pub async fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;
        let policy = self.config.policy()?;

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

        let store: Arc<dyn TaskStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileTaskStore::open(self.config.store_path.clone(), &*ids).await?),
        };
        let provider: Arc<dyn NotificationProvider> =
            self.provider.unwrap_or_else(|| Arc::new(LogProvider));

        let scheduler = Arc::new(ReminderScheduler::spawn(
            Arc::clone(&clock),
            Arc::clone(&ids),
            Arc::new(NotificationDispatcher::new(provider)),
            self.config.poll_interval(),
        ));
        let service = Arc::new(
            ReminderService::new(Arc::clone(&store), Arc::clone(&scheduler), ids, policy)
                .with_cancel_on_remove(self.config.tasks.cancel_on_remove),
        );

        info!(
            store = %self.config.store_path.display(),
            poll_ms = self.config.scheduler.poll_interval_ms,
            cancel_on_remove = self.config.tasks.cancel_on_remove,
            "reminder app started"
        );

        Ok(App {
            config: self.config,
            service,
            scheduler,
            store,
        })
    }
}

/// A wired, running reminder app.
pub struct App {
    pub config: ReminderConfig,
    pub service: Arc<ReminderService>,
    pub scheduler: Arc<ReminderScheduler>,
    pub store: Arc<dyn TaskStore>,
}

impl App {
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
