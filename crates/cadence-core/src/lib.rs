//! cadence-core
//!
//! Task dependency and recurrence engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, state, relation, recurrence, events, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, NotificationSink, CompletionPolicy, ResetDispatcher, SnapshotStore）
//! - **graph**: タスクグラフ（TaskGraph, DependencyGraph, Boards）
//! - **directory**: resources / actors / roles のレジストリ
//! - **app**: アプリケーションロジック（completion, scheduler, engine, builder）
//! - **persistence**: スナップショットと import/export
//! - **impls**: ポートの実装（ChannelDispatcher, sinks, policies, JsonFileStore）

pub mod app;
pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod graph;
pub mod impls;
pub mod persistence;
pub mod ports;

pub use app::{BuildError, Engine, EngineBuilder};
pub use config::EngineConfig;
pub use error::CadenceError;
