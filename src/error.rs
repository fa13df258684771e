use thiserror::Error;

/// 错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Invalid repeat rule: {0}")]
    InvalidRepeat(String),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("List not found: {0}")]
    ListNotFound(i64),

    #[error("Invalid list: {0}")]
    InvalidList(String),

    #[error("Task has not been saved yet: {0}")]
    NotSaved(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
