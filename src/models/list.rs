use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 新清单的默认颜色
pub const DEFAULT_LIST_COLOR: &str = "4A4A4A";

/// 任务清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: Option<i64>,
    pub name: String,
    /// 十六进制 RGB，不带 '#'
    pub color: String,
    /// 显示顺序，保存时未设置则排在最后
    pub order: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TodoList {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidList("list name must not be empty".to_string()));
        }

        Ok(Self {
            id: None,
            name,
            color: DEFAULT_LIST_COLOR.to_string(),
            order: None,
            created_at: Utc::now(),
        })
    }

    /// 设置颜色，接受 "RRGGBB" 或 "#RRGGBB"
    pub fn set_color(&mut self, color: &str) -> Result<()> {
        let hex = color.strip_prefix('#').unwrap_or(color);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidList(format!("'{}' is not a hex color", color)));
        }
        self.color = hex.to_ascii_uppercase();
        Ok(())
    }
}
