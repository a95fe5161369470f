//! JsonFileTaskStore - the task sequence as one JSON array on disk.
//!
//! # Persistence model
//! - The file is read once at `open` (created as `[]` if missing).
//! - Every mutation serializes the whole sequence and replaces the file.
//! - Replacement is atomic: write a temp file in the same directory, fsync,
//!   then rename over the target. A crash mid-write leaves the previous
//!   file intact.
//! - The in-memory copy is only updated after the rename succeeded.
//!
//! Array elements that are not valid tasks (e.g. account records sharing
//! the same file) are skipped with a warning and written back unchanged
//! after the tasks on every rewrite.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{NewTask, StoreError, Task, TaskId, TaskList};
use crate::ports::{IdGenerator, TaskStore};

/// On-disk record. Files written before tasks had ids (or by hand) may
/// omit `id` and carry nulls; those are normalized on load.
#[derive(Debug, Deserialize)]
struct StoredTask {
    #[serde(default)]
    id: Option<TaskId>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    project: Option<String>,
    deadline: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

impl StoredTask {
    /// Validate with the same rules as new input.
    fn into_task(self, ids: &dyn IdGenerator) -> Result<(Task, bool), String> {
        let backfilled = self.id.is_none();
        let id = self.id.unwrap_or_else(|| ids.generate_task_id());
        let input = NewTask {
            user: self.user.unwrap_or_default(),
            project: self.project.unwrap_or_default(),
            deadline: self.deadline,
            email: self.email,
            phone: self.phone,
        };
        input
            .into_task(id)
            .map(|task| (task, backfilled))
            .map_err(|err| err.to_string())
    }
}

pub struct JsonFileTaskStore {
    path: PathBuf,
    /// Held across the file write so mutations are applied one at a time.
    tasks: Mutex<TaskList>,
    /// Non-task elements found at open, preserved verbatim.
    foreign: Vec<Value>,
}

impl JsonFileTaskStore {
    /// Open (or create) the store at `path`.
    ///
    /// Records without an id get one from `ids`; the file is rewritten right
    /// away so the assigned ids survive a restart.
    pub async fn open(path: impl Into<PathBuf>, ids: &dyn IdGenerator) -> Result<Self, StoreError> {
        let path = path.into();
        let records = {
            let target = path.clone();
            run_blocking(&path, move || load_or_init(&target)).await?
        };

        let mut tasks = Vec::with_capacity(records.len());
        let mut foreign = Vec::new();
        let mut backfilled = 0usize;
        for (index, record) in records.into_iter().enumerate() {
            let decoded = StoredTask::deserialize(&record)
                .map_err(|err| err.to_string())
                .and_then(|stored| stored.into_task(ids));
            match decoded {
                Ok((task, assigned)) => {
                    if assigned {
                        backfilled += 1;
                    }
                    tasks.push(task);
                }
                Err(reason) => {
                    warn!(path = %path.display(), index, %reason, "skipping record that is not a task");
                    foreign.push(record);
                }
            }
        }

        let store = Self {
            path,
            tasks: Mutex::new(TaskList::new(tasks)),
            foreign,
        };

        if backfilled > 0 {
            let tasks = store.tasks.lock().await;
            write_snapshot(&store.path, tasks.as_slice(), &store.foreign).await?;
            info!(path = %store.path.display(), backfilled, "assigned ids to stored tasks");
        }

        let len = store.tasks.lock().await.len();
        debug!(
            path = %store.path.display(),
            len,
            skipped = store.foreign.len(),
            "task store opened"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next`, then make it the current sequence.
    async fn commit(&self, current: &mut TaskList, next: TaskList) -> Result<(), StoreError> {
        write_snapshot(&self.path, next.as_slice(), &self.foreign).await?;
        *current = next;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().await.as_slice().to_vec())
    }

    async fn append(&self, task: Task) -> Result<usize, StoreError> {
        let mut current = self.tasks.lock().await;
        let mut next = current.clone();
        let position = next.append(task);
        self.commit(&mut current, next).await?;
        Ok(position)
    }

    async fn remove_at(&self, position: usize) -> Result<Task, StoreError> {
        let mut current = self.tasks.lock().await;
        let mut next = current.clone();
        let removed = next.remove_at(position)?;
        self.commit(&mut current, next).await?;
        Ok(removed)
    }

    async fn remove(&self, id: TaskId) -> Result<(usize, Task), StoreError> {
        let mut current = self.tasks.lock().await;
        let mut next = current.clone();
        let removed = next.remove(id)?;
        self.commit(&mut current, next).await?;
        Ok(removed)
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.lock().await.get(id).cloned())
    }

    async fn position_of(&self, id: TaskId) -> Result<Option<usize>, StoreError> {
        Ok(self.tasks.lock().await.position_of(id))
    }

    async fn clear(&self) -> Result<Vec<Task>, StoreError> {
        let mut current = self.tasks.lock().await;
        let removed = current.as_slice().to_vec();
        self.commit(&mut current, TaskList::default()).await?;
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tasks.lock().await.len())
    }
}

async fn write_snapshot(path: &Path, tasks: &[Task], foreign: &[Value]) -> Result<(), StoreError> {
    let serialize = |err: serde_json::Error| StoreError::persistence(path, format!("serialize: {err}"));

    let mut records = Vec::with_capacity(tasks.len() + foreign.len());
    for task in tasks {
        records.push(serde_json::to_value(task).map_err(serialize)?);
    }
    records.extend_from_slice(foreign);
    let bytes = serde_json::to_vec_pretty(&records).map_err(serialize)?;

    let target = path.to_path_buf();
    run_blocking(path, move || write_atomic(&target, &bytes)).await
}

/// Run blocking file I/O off the async workers.
async fn run_blocking<T, F>(path: &Path, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| StoreError::persistence(path, format!("blocking task failed: {err}")))?
}

fn load_or_init(path: &Path) -> Result<Vec<Value>, StoreError> {
    if !path.exists() {
        if let Some(parent) = parent_dir(path) {
            std::fs::create_dir_all(parent)
                .map_err(|err| StoreError::persistence(path, format!("create directory: {err}")))?;
        }
        write_atomic(path, b"[]")?;
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(path)
        .map_err(|err| StoreError::persistence(path, format!("read: {err}")))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text)
        .map_err(|err| StoreError::persistence(path, format!("malformed task file: {err}")))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|err| StoreError::persistence(path, format!("create temporary file: {err}")))?;
    tmp.write_all(bytes)
        .map_err(|err| StoreError::persistence(path, format!("write temporary file: {err}")))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| StoreError::persistence(path, format!("sync temporary file: {err}")))?;
    tmp.persist(path)
        .map_err(|err| StoreError::persistence(path, format!("rename: {}", err.error)))?;
    Ok(())
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
