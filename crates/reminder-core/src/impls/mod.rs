//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonFileTaskStore**: 永続タスクストア（JSON ファイル 1 つ）
//! - **InMemoryTaskStore**: テスト・ドライラン用のタスクストア
//! - **LogProvider**: ログに書き出すだけの通知プロバイダ
//!
//! 実際のメール / SMS 送信は、組み込み側のアプリケーションが
//! `ports::NotificationProvider` を通じて提供します。

pub mod json_store;
pub mod log_provider;
pub mod memory_store;

pub use self::json_store::JsonFileTaskStore;
pub use self::log_provider::LogProvider;
pub use self::memory_store::InMemoryTaskStore;
