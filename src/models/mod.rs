use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::recurrence::{self, RenewalResult};

mod list;
mod repeat;

pub use list::{TodoList, DEFAULT_LIST_COLOR};
pub use repeat::{RepeatKind, RepeatRule, RepeatUnit};

/// 目标文字的最大长度
pub const GOAL_MAX_LIMIT: usize = 150;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Completed,
}

/// 任务数据模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub goal: String,
    pub notes: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub moved_to_trash_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub repeat: RepeatRule,
    /// 所属清单
    pub list_id: Option<i64>,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Result<Self> {
        let goal = goal.into();
        validate_goal(&goal)?;

        let now = Utc::now();
        Ok(Self {
            id: None,
            goal,
            notes: None,
            due_at: None,
            remind_at: None,
            completed_at: None,
            moved_to_trash_at: None,
            created_at: now,
            updated_at: now,
            repeat: RepeatRule::default(),
            list_id: None,
        })
    }

    pub fn state(&self) -> TaskState {
        if self.completed_at.is_some() {
            TaskState::Completed
        } else {
            TaskState::Pending
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// 标记为完成
    ///
    /// 重复任务会在同一步中续期并回到未完成状态。
    pub fn complete<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> RenewalResult {
        if self.is_completed() {
            return RenewalResult::AlreadyCompleted;
        }

        let now_utc = now.with_timezone(&Utc);
        self.completed_at = Some(now_utc);
        self.updated_at = now_utc;

        recurrence::renew_on_completion(self, now)
    }

    /// 取消完成，日期保持不变
    pub fn uncomplete(&mut self) {
        if self.completed_at.take().is_some() {
            self.updated_at = Utc::now();
        }
    }

    pub fn rename(&mut self, goal: impl Into<String>) -> Result<()> {
        let goal = goal.into();
        validate_goal(&goal)?;
        self.goal = goal;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 设置或清除提醒时间
    pub fn set_reminder(&mut self, remind_at: Option<DateTime<Utc>>) {
        self.remind_at = remind_at;
        self.updated_at = Utc::now();
    }

    pub fn set_due(&mut self, due_at: Option<DateTime<Utc>>) {
        self.due_at = due_at;
        self.updated_at = Utc::now();
    }

    /// 整体替换重复规则
    pub fn set_repeat(&mut self, rule: RepeatRule) {
        self.repeat = rule;
        self.updated_at = Utc::now();
    }

    /// 默认截止时间：当天的指定时刻（本地日历）
    pub fn set_default_due_date<Tz: TimeZone>(&mut self, now: &DateTime<Tz>, time: NaiveTime) {
        let local = now.date_naive().and_time(time);
        if let Some(due) = recurrence::resolve_local(&now.timezone(), local) {
            self.due_at = Some(due.with_timezone(&Utc));
            self.updated_at = now.with_timezone(&Utc);
        }
    }

    pub fn move_to_trash(&mut self, now: DateTime<Utc>) {
        self.moved_to_trash_at = Some(now);
        self.updated_at = now;
    }

    pub fn restore(&mut self) {
        self.moved_to_trash_at = None;
        self.updated_at = Utc::now();
    }

    pub fn is_moved_to_trash(&self) -> bool {
        self.moved_to_trash_at.is_some()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_at {
            Some(due) => due < now && !self.is_completed(),
            None => false,
        }
    }
}

fn validate_goal(goal: &str) -> Result<()> {
    if goal.trim().is_empty() {
        return Err(Error::InvalidGoal("goal must not be empty".to_string()));
    }
    if goal.chars().count() > GOAL_MAX_LIMIT {
        return Err(Error::InvalidGoal(format!(
            "goal is longer than {} characters",
            GOAL_MAX_LIMIT
        )));
    }
    Ok(())
}
