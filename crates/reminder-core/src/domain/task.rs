//! Task records and the ordered task sequence.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::errors::{StoreError, TaskError};
use super::ids::TaskId;

pub const DEADLINE_FORMAT: &str = "%Y-%m-%d";

/// A registered deadline reminder.
///
/// Field names match the on-disk JSON layout (`email` / `phone`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user: String,
    pub project: String,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Task {
    pub fn has_contact(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

/// Unvalidated task input, as it arrives from a form or command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub user: String,
    pub project: String,
    pub deadline: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewTask {
    pub fn new(
        user: impl Into<String>,
        project: impl Into<String>,
        deadline: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            project: project.into(),
            deadline: deadline.into(),
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Validate and assign the stable id.
    ///
    /// Blank contact fields are treated as absent. A task without any
    /// contact is accepted; its reminder will fail at dispatch time.
    pub fn into_task(self, id: TaskId) -> Result<Task, TaskError> {
        let user = required(self.user, "user")?;
        let project = required(self.project, "project")?;
        let deadline = parse_deadline(&self.deadline)?;

        Ok(Task {
            id,
            user,
            project,
            deadline,
            email: non_blank(self.email),
            phone: non_blank(self.phone),
        })
    }
}

/// Parse a `YYYY-MM-DD` deadline.
///
/// Only four-digit years `0001..=9999` are accepted; chrono alone would also
/// take signed and longer years.
pub fn parse_deadline(input: &str) -> Result<NaiveDate, TaskError> {
    let invalid = || TaskError::InvalidDeadline {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let well_formed = trimmed.len() == 10
        && trimmed.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }

    let date = NaiveDate::parse_from_str(trimmed, DEADLINE_FORMAT).map_err(|_| invalid())?;
    if date.year() < 1 {
        return Err(invalid());
    }
    Ok(date)
}

fn required(value: String, field: &'static str) -> Result<String, TaskError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ordered task sequence; a task's position is its index.
///
/// Both store implementations apply mutations through this type so that
/// position semantics (append at the end, shift down on removal) live in
/// one place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_vec(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Append and return the new position (`len - 1`).
    pub fn append(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    pub fn remove_at(&mut self, position: usize) -> Result<Task, StoreError> {
        if position >= self.tasks.len() {
            return Err(StoreError::OutOfRange {
                position,
                len: self.tasks.len(),
            });
        }
        Ok(self.tasks.remove(position))
    }

    pub fn position_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Remove by stable id, returning the position it held.
    pub fn remove(&mut self, id: TaskId) -> Result<(usize, Task), StoreError> {
        let position = self.position_of(id).ok_or(StoreError::NotFound(id))?;
        Ok((position, self.tasks.remove(position)))
    }

    /// Empty the sequence, returning what it held.
    pub fn clear(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }
}
