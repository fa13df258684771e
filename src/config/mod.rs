use chrono::NaiveTime;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "toodoo.db";

/// 配置文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 数据库路径，未设置时使用用户数据目录
    pub database_path: Option<PathBuf>,
    /// 新任务的默认截止时刻（HH:MM，本地时间）
    pub default_due_time: String,
    /// 日志级别，RUST_LOG 优先
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            default_due_time: "23:59".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// 读取配置
    ///
    /// 显式指定的文件必须存在；默认位置没有文件时使用默认值。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
            })?;
            return Self::parse(&content);
        }

        let Some(dirs) = project_dirs() else {
            return Ok(Self::default());
        };
        let path = dirs.config_dir().join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.due_time()?;
        Ok(config)
    }

    pub fn due_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.default_due_time, "%H:%M").map_err(|e| {
            Error::InvalidConfig(format!(
                "default_due_time '{}': {}",
                self.default_due_time, e
            ))
        })
    }

    /// 确定数据库路径，必要时创建数据目录
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = project_dirs().ok_or_else(|| {
            Error::InvalidConfig("could not determine the user data directory".to_string())
        })?;
        let data_dir = dirs.data_dir();
        fs::create_dir_all(data_dir)?;
        Ok(data_dir.join(DATABASE_FILE))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "toodoo", "toodoo")
}
