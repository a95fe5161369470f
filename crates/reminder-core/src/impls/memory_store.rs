//! InMemoryTaskStore - non-durable TaskStore for tests and dry runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{StoreError, Task, TaskId, TaskList};
use crate::ports::TaskStore;

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<TaskList>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(TaskList::new(tasks)),
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().await.as_slice().to_vec())
    }

    async fn append(&self, task: Task) -> Result<usize, StoreError> {
        Ok(self.tasks.lock().await.append(task))
    }

    async fn remove_at(&self, position: usize) -> Result<Task, StoreError> {
        self.tasks.lock().await.remove_at(position)
    }

    async fn remove(&self, id: TaskId) -> Result<(usize, Task), StoreError> {
        self.tasks.lock().await.remove(id)
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.lock().await.get(id).cloned())
    }

    async fn position_of(&self, id: TaskId) -> Result<Option<usize>, StoreError> {
        Ok(self.tasks.lock().await.position_of(id))
    }

    async fn clear(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().await.clear())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tasks.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTask;
    use ulid::Ulid;

    fn task(project: &str) -> Task {
        NewTask::new("A", project, "2030-01-10")
            .into_task(TaskId::from_ulid(Ulid::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn append_list_remove_clear() {
        let store = InMemoryTaskStore::new();
        assert!(store.list().await.unwrap().is_empty());

        let first = task("P0");
        assert_eq!(store.append(first.clone()).await.unwrap(), 0);
        assert_eq!(store.append(task("P1")).await.unwrap(), 1);

        let removed = store.remove_at(0).await.unwrap();
        assert_eq!(removed, first);
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.list().await.unwrap()[0].project, "P1");

        let cleared = store.clear().await.unwrap();
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].project, "P1");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_is_reported() {
        let store = InMemoryTaskStore::with_tasks(vec![task("P0")]);

        let err = store.remove_at(1).await.unwrap_err();

        assert!(matches!(err, StoreError::OutOfRange { position: 1, len: 1 }));
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
