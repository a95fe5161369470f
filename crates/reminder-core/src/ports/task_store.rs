//! TaskStore port - 永続化されたタスク列
//!
//! # 実装
//! - `JsonFileTaskStore`: 変更のたびに JSON ファイル全体を書き換える
//! - `InMemoryTaskStore`: テスト・ドライラン用

use async_trait::async_trait;

use crate::domain::{StoreError, Task, TaskId};

/// TaskStore は順序付きのタスク列を所有する
///
/// # 契約
/// - position は現在の列のインデックス（`0..len`）。前のタスクが削除されると
///   詰められる。安定したハンドルは `TaskId`
/// - エラーを返した変更はディスクにもメモリにも反映されていない
/// - 同時呼び出しは実装側で直列化する
/// - スケジューラからストアを呼ぶことはない
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Current sequence in position order.
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Append at the end and return the new task's position.
    async fn append(&self, task: Task) -> Result<usize, StoreError>;

    /// Remove the task at `position`; `OutOfRange` leaves the store untouched.
    async fn remove_at(&self, position: usize) -> Result<Task, StoreError>;

    /// Remove by stable id, returning the position it held.
    async fn remove(&self, id: TaskId) -> Result<(usize, Task), StoreError>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn position_of(&self, id: TaskId) -> Result<Option<usize>, StoreError>;

    /// Replace the sequence with an empty one, returning the removed tasks
    /// in position order.
    async fn clear(&self) -> Result<Vec<Task>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.list().await?.len())
    }
}
