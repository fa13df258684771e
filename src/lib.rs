//! TooDoo: to-do tasks with recurring due dates.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use models::{RepeatKind, RepeatRule, RepeatUnit, Task, TaskState, TodoList};
pub use recurrence::{next_occurrence, renew_on_completion, RenewalResult, Step};
