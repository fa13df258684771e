use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use toodoo::recurrence::{self, RenewalResult};
use toodoo::{Config, Database, RepeatKind, RepeatRule, RepeatUnit, Task, TodoList};

#[derive(Parser)]
#[command(name = "toodoo")]
#[command(about = "To-do manager with recurring tasks", long_about = None)]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// Config file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task goal
        goal: String,
        /// Due time (RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD")
        #[arg(long)]
        due: Option<String>,
        /// Due today at the configured default time
        #[arg(long, conflicts_with = "due")]
        today: bool,
        /// Reminder time
        #[arg(long)]
        remind: Option<String>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
        /// List ID to put the task in
        #[arg(long)]
        list: Option<i64>,
    },

    /// List tasks
    List {
        /// Show the trash instead
        #[arg(long, conflicts_with = "list")]
        trash: bool,
        /// Only show tasks in this list
        #[arg(long)]
        list: Option<i64>,
    },

    /// Create a new list
    ListAdd {
        /// List name
        name: String,
        /// Hex color, e.g. "#FF8800"
        #[arg(long)]
        color: Option<String>,
    },

    /// Show all lists
    Lists,

    /// Change the goal of a task
    Rename { id: i64, goal: String },

    /// Mark a task as completed (repeating tasks roll over to their next date)
    Complete { id: i64 },

    /// Mark a task as not completed
    Uncomplete { id: i64 },

    /// Set how a task repeats
    Repeat {
        id: i64,
        /// none, daily, weekday, weekly, monthly, annually, regularly, after-completion
        kind: RepeatKind,
        /// Frequency for regularly / after-completion
        #[arg(long, default_value_t = 1)]
        every: u32,
        /// Unit for regularly / after-completion (minute, hour, day, weekday, week, month, year)
        #[arg(long, default_value = "day")]
        unit: RepeatUnit,
        /// Stop repeating after this time
        #[arg(long)]
        until: Option<String>,
    },

    /// Set or clear the reminder
    Remind { id: i64, time: Option<String> },

    /// Set or clear the due time
    Due { id: i64, time: Option<String> },

    /// Show the upcoming occurrences of a repeating task
    Preview {
        id: i64,
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },

    /// Move a task to the trash
    Trash { id: i64 },

    /// Restore a task from the trash
    Restore { id: i64 },

    /// Permanently delete a task
    Delete { id: i64 },

    /// Permanently delete everything in the trash
    EmptyTrash,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    // 设置日志
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let db_path = match cli.db_path {
        Some(path) => path,
        None => config.database_path()?,
    };
    tracing::debug!("Using database: {:?}", db_path);

    let db = Database::open(&db_path).context("Failed to open database")?;
    let due_time = config.due_time()?;

    match cli.command {
        Commands::Add {
            goal,
            due,
            today,
            remind,
            notes,
            list,
        } => {
            let mut task = Task::new(goal)?;
            task.notes = notes;
            if let Some(list_id) = list {
                db.get_list(list_id)?;
                task.list_id = Some(list_id);
            }
            if today {
                task.set_default_due_date(&Local::now(), due_time);
            } else if let Some(due) = due {
                task.due_at = Some(parse_time(&due, due_time)?);
            }
            if let Some(remind) = remind {
                task.remind_at = Some(parse_time(&remind, due_time)?);
            }
            let id = db.create_task(&task)?;
            println!("✅ Task created with ID: {}", id);
        }
        Commands::List { trash, list } => {
            let tasks = match (trash, list) {
                (true, _) => db.get_trashed_tasks()?,
                (false, Some(list_id)) => {
                    let list = db.get_list(list_id)?;
                    println!("📋 {}", list.name);
                    db.get_tasks_in_list(list_id)?
                }
                (false, None) => db.get_all_tasks()?,
            };

            if tasks.is_empty() {
                println!("No tasks found.");
            }
            let now = Utc::now();
            for task in tasks {
                print_task(&task, now);
            }
        }
        Commands::ListAdd { name, color } => {
            let mut list = TodoList::new(name)?;
            if let Some(color) = color {
                list.set_color(&color)?;
            }
            let id = db.create_list(&list)?;
            println!("📋 List created with ID: {}", id);
        }
        Commands::Lists => {
            let lists = db.get_all_lists()?;
            if lists.is_empty() {
                println!("No lists found.");
            }
            for list in lists {
                let count = match list.id {
                    Some(id) => db.get_tasks_in_list(id)?.len(),
                    None => 0,
                };
                println!(
                    "[{}] #{} {} ({} task(s))",
                    list.id.unwrap_or_default(),
                    list.color,
                    list.name,
                    count
                );
            }
        }
        Commands::Rename { id, goal } => {
            let mut task = db.get_task(id)?;
            task.rename(goal)?;
            db.update_task(&task)?;
            println!("✏️ Task {} renamed", id);
        }
        Commands::Complete { id } => {
            let mut task = db.get_task(id)?;
            let result = task.complete(&Local::now());
            db.update_task(&task)?;

            match result {
                RenewalResult::Renewed { due_at, .. } => {
                    println!("🔁 Task {} completed, next due {}", id, format_time(due_at));
                }
                RenewalResult::NotRepeating => println!("✅ Task {} marked as completed", id),
                RenewalResult::Expired => {
                    println!("✅ Task {} marked as completed, repeat has ended", id)
                }
                RenewalResult::AlreadyCompleted => println!("Task {} is already completed", id),
            }
        }
        Commands::Uncomplete { id } => {
            let mut task = db.get_task(id)?;
            task.uncomplete();
            db.update_task(&task)?;
            println!("⭕ Task {} marked as not completed", id);
        }
        Commands::Repeat {
            id,
            kind,
            every,
            unit,
            until,
        } => {
            if !kind.is_custom() && every != 1 {
                tracing::warn!("--every only applies to regularly / after-completion, ignored");
            }

            let mut task = db.get_task(id)?;
            let mut rule = RepeatRule {
                kind,
                frequency: every.max(1),
                unit,
                end_date: None,
            };
            if let Some(until) = until {
                rule = rule.until(parse_time(&until, due_time)?);
            }
            task.set_repeat(rule);
            db.update_task(&task)?;
            println!("🔁 Task {} repeats: {}", id, rule);
        }
        Commands::Remind { id, time } => {
            let mut task = db.get_task(id)?;
            let remind_at = time.map(|t| parse_time(&t, due_time)).transpose()?;
            task.set_reminder(remind_at);
            db.update_task(&task)?;
            match remind_at {
                Some(at) => println!("⏰ Task {} reminds at {}", id, format_time(at)),
                None => println!("Reminder of task {} cleared", id),
            }
        }
        Commands::Due { id, time } => {
            let mut task = db.get_task(id)?;
            let due_at = time.map(|t| parse_time(&t, due_time)).transpose()?;
            task.set_due(due_at);
            db.update_task(&task)?;
            match due_at {
                Some(at) => println!("📅 Task {} due at {}", id, format_time(at)),
                None => println!("Due time of task {} cleared", id),
            }
        }
        Commands::Preview { id, count } => {
            let task = db.get_task(id)?;
            if !task.repeat.is_repeating() {
                println!("Task {} does not repeat.", id);
                return Ok(());
            }

            let start = task
                .due_at
                .map(|d| d.with_timezone(&Local))
                .unwrap_or_else(Local::now);
            println!("{} ({})", task.goal, task.repeat);
            for date in recurrence::occurrences(task.repeat, start).take(count) {
                println!("  {}", format_time(date.with_timezone(&Utc)));
            }
        }
        Commands::Trash { id } => {
            let mut task = db.get_task(id)?;
            task.move_to_trash(Utc::now());
            db.update_task(&task)?;
            println!("🗑️ Task {} moved to trash", id);
        }
        Commands::Restore { id } => {
            let mut task = db.get_task(id)?;
            task.restore();
            db.update_task(&task)?;
            println!("♻️ Task {} restored", id);
        }
        Commands::Delete { id } => {
            db.delete_task(id)?;
            println!("🗑️ Task {} permanently deleted", id);
        }
        Commands::EmptyTrash => {
            let removed = db.empty_trash()?;
            println!("🗑️ {} task(s) permanently deleted", removed);
        }
    }

    Ok(())
}

fn print_task(task: &Task, now: DateTime<Utc>) {
    let status_icon = if task.is_completed() {
        "✅"
    } else if task.is_overdue(now) {
        "❗"
    } else {
        "⭕"
    };
    let repeat_icon = if task.repeat.is_repeating() { " 🔁" } else { "" };
    let due = task
        .due_at
        .map(|d| format!(" (due {})", format_time(d)))
        .unwrap_or_default();

    println!(
        "[{}] {} {}{}{}",
        task.id.unwrap_or_default(),
        status_icon,
        task.goal,
        due,
        repeat_icon
    );
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// 解析命令行中的时间（本地时区）
fn parse_time(input: &str, due_time: NaiveTime) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = match NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .with_context(|| format!("Unrecognized time '{}'", input))?
            .and_time(due_time),
    };

    recurrence::resolve_local(&Local, naive)
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("'{}' does not exist in the local time zone", input))
}
