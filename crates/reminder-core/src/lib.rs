//! reminder-core
//!
//! Deadline reminders: a durable task list plus an in-process scheduler
//! that fires one notification per task shortly before its deadline.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, job, outcome, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, TaskStore, NotificationProvider）
//! - **impls**: 実装（JSON ファイルストア、インメモリストア、ログ出力プロバイダ）
//! - **app**: アプリケーションロジック（builder, service, scheduler, dispatcher, status）
//! - **config**: `reminder.toml` の読み込みと検証

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{App, AppBuilder, ReminderScheduler, ReminderService, SchedulerStatus};
pub use config::{ConfigError, ReminderConfig};
pub use domain::{ReminderError, Result};
