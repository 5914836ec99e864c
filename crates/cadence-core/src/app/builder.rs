//! EngineBuilder - Engine の構築とワイヤリング（composition root）
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 省略されたポートには本番用のデフォルトを入れる

use std::sync::Arc;

use tokio::runtime::Handle;

use super::completion::CompletionStateMachine;
use super::engine::Engine;
use super::scheduler::RecurringScheduler;
use crate::config::{ConfigError, EngineConfig};
use crate::directory::Directory;
use crate::graph::{Board, Boards, TaskGraph};
use crate::impls::{ChannelDispatcher, OwnerInbox, TracingSink, policy_from_config};
use crate::ports::{
    Clock, CompletionPolicy, IdGenerator, NotificationSink, ResetDispatcher, SystemClock,
    UlidGenerator,
};

/// Name of the board every engine starts with.
pub const DEFAULT_BOARD_NAME: &str = "Tasks";

/// EngineBuilder は Engine を構築
///
/// # 使用例
/// ```ignore
/// let (mut engine, mut inbox) = EngineBuilder::new()
///     .config(EngineConfig::load(path)?)
///     .notifier(Arc::new(TracingSink))
///     .build_with_inbox()?;
/// ```
///
/// # Fail-fast 設計
/// - 設定は build() 時に検証する
/// - tokio ランタイムが見つからなければ `BuildError::NoRuntime`
/// - ResetDispatcher がなければ `BuildError::MissingDispatcher`
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    policy: Option<Arc<dyn CompletionPolicy>>,
    dispatcher: Option<Arc<dyn ResetDispatcher>>,
    runtime: Option<Handle>,
}

/// BuildError は Engine 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no tokio runtime: call build() inside a runtime or pass runtime(handle)")]
    NoRuntime,

    #[error("no reset dispatcher: the owning thread must supply one")]
    MissingDispatcher,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            clock: None,
            ids: None,
            notifier: None,
            policy: None,
            dispatcher: None,
            runtime: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 設定の `completion` より優先される
    pub fn policy(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn ResetDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// タイマーと sweep を動かすランタイム（省略時は現在のランタイム）
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Engine を構築する
    pub fn build(self) -> Result<Engine, BuildError> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };
        let dispatcher = self.dispatcher.ok_or(BuildError::MissingDispatcher)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingSink));
        let policy = self
            .policy
            .unwrap_or_else(|| policy_from_config(&self.config.completion));

        let scheduler = RecurringScheduler::start(
            Arc::clone(&clock),
            Arc::clone(&notifier),
            dispatcher,
            runtime,
            self.config.scheduler.sweep_interval(),
        );
        let mut completion =
            CompletionStateMachine::new(policy, Arc::clone(&notifier), Arc::clone(&clock));
        completion.add_listener(Arc::new(scheduler.clone()));

        let default_board = Board::new(ids.generate_board_id(), DEFAULT_BOARD_NAME);

        Ok(Engine {
            graph: TaskGraph::new(Arc::clone(&ids)),
            boards: Boards::new(default_board),
            directory: Directory::new(Arc::clone(&ids)),
            completion,
            scheduler,
            notifier,
            clock,
            ids,
        })
    }

    /// `ChannelDispatcher` をつないで構築し、所有側の受信口も返す
    pub fn build_with_inbox(self) -> Result<(Engine, OwnerInbox), BuildError> {
        let (dispatcher, inbox) = ChannelDispatcher::new();
        let engine = self.dispatcher(Arc::new(dispatcher)).build()?;
        Ok((engine, inbox))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::CollectingSink;

    #[tokio::test]
    async fn test_build_success() {
        let engine = EngineBuilder::new().build_with_inbox();
        assert!(engine.is_ok());
    }

    #[tokio::test]
    async fn test_build_starts_with_default_board() {
        let (engine, _inbox) = EngineBuilder::new().build_with_inbox().unwrap();
        let board = engine.boards().get(engine.boards().default_id()).unwrap();
        assert_eq!(board.name, DEFAULT_BOARD_NAME);
        assert!(engine.graph().is_empty());
    }

    #[tokio::test]
    async fn test_build_missing_dispatcher() {
        let result = EngineBuilder::new()
            .notifier(Arc::new(CollectingSink::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingDispatcher)));
    }

    #[test]
    fn test_build_outside_runtime() {
        let result = EngineBuilder::new().build_with_inbox();
        assert!(matches!(result, Err(BuildError::NoRuntime)));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let result = EngineBuilder::new()
            .runtime(runtime.handle().clone())
            .build_with_inbox();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_build_invalid_config() {
        let mut config = EngineConfig::default();
        config.scheduler.sweep_interval_secs = 0;
        let result = EngineBuilder::new().config(config).build_with_inbox();
        assert!(matches!(result, Err(BuildError::Config(ConfigError::Invalid(_)))));
    }
}
