//! Ports - 抽象化レイヤー
//!
//! 各 trait はリマインダーコアの外部との境界（時刻、ID 生成、永続化、
//! 通知の送信）を表します。
//! 実装は `impls`（または組み込み側のアプリケーション）に置きます。

pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{NotificationProvider, ProviderError};
pub use self::task_store::TaskStore;
