//! Line commands accepted by `reminder-cli run`.

use anyhow::{Context, Result, bail};
use reminder_core::domain::{JobId, NewTask, TaskId};

pub const HELP: &str = "\
commands:
  add <user> <project> <YYYY-MM-DD> [email=<addr>] [phone=<number>]
  list
  remove <position>
  remove-id <task-id>
  cancel <job-id>
  clear
  status
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(NewTask),
    List,
    Remove(usize),
    RemoveId(TaskId),
    Cancel(JobId),
    Clear,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        ["add", user, project, deadline, contacts @ ..] => {
            let mut task = NewTask::new(*user, *project, *deadline);
            for contact in contacts {
                match contact.split_once('=') {
                    Some(("email", addr)) => task.email = Some(addr.to_string()),
                    Some(("phone", number)) => task.phone = Some(number.to_string()),
                    _ => bail!("unexpected argument {contact:?}; use email=<addr> or phone=<number>"),
                }
            }
            Command::Add(task)
        }
        ["list"] => Command::List,
        ["remove", position] => Command::Remove(
            position
                .parse()
                .with_context(|| format!("invalid position {position:?}"))?,
        ),
        ["remove-id", id] => Command::RemoveId(id.parse()?),
        ["cancel", id] => Command::Cancel(id.parse()?),
        ["clear"] => Command::Clear,
        ["status"] => Command::Status,
        ["help"] => Command::Help,
        ["quit" | "exit"] => Command::Quit,
        _ => bail!("unrecognized command {line:?}; type `help`"),
    };
    Ok(Some(command))
}
