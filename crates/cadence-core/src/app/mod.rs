//! App layer - アプリケーションロジック
//!
//! - **completion**: 依存関係でゲートされた完了遷移
//! - **timers**: リセットタイマーのハンドルとアリーナ
//! - **scheduler**: 繰り返し設定・sweep・リセット依頼
//! - **engine**: 所有スレッドのオブジェクトとリセット処理
//! - **builder**: 構築と起動時検証

pub mod builder;
pub mod completion;
pub mod engine;
pub mod scheduler;
pub mod timers;

pub use builder::{BuildError, DEFAULT_BOARD_NAME, EngineBuilder};
pub use completion::{CompletionListener, CompletionStateMachine};
pub use engine::Engine;
pub use scheduler::{RecurringScheduler, SweepReport};
pub use timers::{ResetTimer, TimerArena};
