//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてリマインダーの流れを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング（起動時検証）
//! - **ReminderService**: タスク API（add / list / remove / clear）
//! - **ReminderScheduler**: タイミングループと一回限りのジョブ
//! - **NotificationDispatcher**: ペイロード → プロバイダ呼び出し
//! - **SchedulerStatus**: 状態問い合わせ用のカウンタ

pub mod builder;
pub mod dispatcher;
pub mod scheduler;
pub mod service;
pub mod status;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::dispatcher::{Dispatch, NotificationDispatcher};
pub use self::scheduler::ReminderScheduler;
pub use self::service::{AddedTask, ReminderService};
pub use self::status::SchedulerStatus;
