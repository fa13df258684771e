use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{RepeatRule, Task, TodoList};

const TASK_COLUMNS: &str = "id, goal, notes, due_at, remind_at, completed_at, moved_to_trash_at,
                            created_at, updated_at, repeat_info, list_id";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// 打开或创建数据库
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// 初始化数据库schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS lists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                sort_order INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                goal TEXT NOT NULL,
                notes TEXT,
                due_at TEXT,
                remind_at TEXT,
                completed_at TEXT,
                moved_to_trash_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                repeat_info TEXT,
                list_id INTEGER REFERENCES lists(id) ON DELETE SET NULL
            );
            "#,
        )?;

        // 旧数据库没有 list_id 列
        let has_list_id: bool = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('todos') WHERE name = 'list_id'",
            [],
            |row| row.get::<_, i64>(0).map(|n| n > 0),
        )?;
        if !has_list_id {
            tracing::info!("Adding list_id column to todos");
            self.conn.execute(
                "ALTER TABLE todos ADD COLUMN list_id INTEGER REFERENCES lists(id) ON DELETE SET NULL",
                [],
            )?;
        }

        self.conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_todos_due_at ON todos(due_at);
            CREATE INDEX IF NOT EXISTS idx_todos_trash ON todos(moved_to_trash_at);
            CREATE INDEX IF NOT EXISTS idx_todos_list_id ON todos(list_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== List CRUD ====================

    /// 创建清单，未指定顺序时排在最后
    pub fn create_list(&self, list: &TodoList) -> Result<i64> {
        let order = match list.order {
            Some(order) => order,
            None => self.conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM lists",
                [],
                |row| row.get(0),
            )?,
        };

        self.conn.execute(
            "INSERT INTO lists (name, color, sort_order, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![list.name, list.color, order, list.created_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_list(&self, id: i64) -> Result<TodoList> {
        self.conn
            .query_row(
                "SELECT id, name, color, sort_order, created_at FROM lists WHERE id = ?1",
                params![id],
                list_from_row,
            )
            .optional()?
            .ok_or(Error::ListNotFound(id))
    }

    /// 按显示顺序获取所有清单
    pub fn get_all_lists(&self) -> Result<Vec<TodoList>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, sort_order, created_at FROM lists ORDER BY sort_order, id",
        )?;
        let lists = stmt
            .query_map([], list_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lists)
    }

    // ==================== Task CRUD ====================

    /// 创建任务
    pub fn create_task(&self, task: &Task) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO todos (goal, notes, due_at, remind_at, completed_at, moved_to_trash_at,
                                created_at, updated_at, repeat_info, list_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.goal,
                task.notes,
                task.due_at.map(|d| d.to_rfc3339()),
                task.remind_at.map(|d| d.to_rfc3339()),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.moved_to_trash_at.map(|d| d.to_rfc3339()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
                task.repeat.encode()?,
                task.list_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 按 ID 获取任务
    pub fn get_task(&self, id: i64) -> Result<Task> {
        let sql = format!("SELECT {} FROM todos WHERE id = ?1", TASK_COLUMNS);
        self.conn
            .query_row(&sql, params![id], task_from_row)
            .optional()?
            .ok_or(Error::TaskNotFound(id))
    }

    /// 获取所有未删除的任务
    pub fn get_all_tasks(&self) -> Result<Vec<Task>> {
        self.query_tasks(
            "WHERE moved_to_trash_at IS NULL
             ORDER BY completed_at IS NOT NULL, due_at IS NULL, due_at ASC, id ASC",
        )
    }

    /// 获取某个清单中未删除的任务
    pub fn get_tasks_in_list(&self, list_id: i64) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM todos WHERE list_id = ?1 AND moved_to_trash_at IS NULL
             ORDER BY completed_at IS NOT NULL, due_at IS NULL, due_at ASC, id ASC",
            TASK_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![list_id], task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// 获取回收站中的任务
    pub fn get_trashed_tasks(&self) -> Result<Vec<Task>> {
        self.query_tasks("WHERE moved_to_trash_at IS NOT NULL ORDER BY moved_to_trash_at DESC")
    }

    fn query_tasks(&self, clause: &str) -> Result<Vec<Task>> {
        let sql = format!("SELECT {} FROM todos {}", TASK_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// 更新任务
    pub fn update_task(&self, task: &Task) -> Result<()> {
        let id = task.id.ok_or_else(|| Error::NotSaved(task.goal.clone()))?;

        let changed = self.conn.execute(
            "UPDATE todos SET goal = ?1, notes = ?2, due_at = ?3, remind_at = ?4,
                              completed_at = ?5, moved_to_trash_at = ?6, updated_at = ?7,
                              repeat_info = ?8, list_id = ?9
             WHERE id = ?10",
            params![
                task.goal,
                task.notes,
                task.due_at.map(|d| d.to_rfc3339()),
                task.remind_at.map(|d| d.to_rfc3339()),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.moved_to_trash_at.map(|d| d.to_rfc3339()),
                task.updated_at.to_rfc3339(),
                task.repeat.encode()?,
                task.list_id,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(Error::TaskNotFound(id));
        }
        Ok(())
    }

    /// 删除任务
    pub fn delete_task(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::TaskNotFound(id));
        }
        Ok(())
    }

    /// 清空回收站，返回删除的数量
    pub fn empty_trash(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM todos WHERE moved_to_trash_at IS NOT NULL", [])?;
        tracing::debug!("Emptied trash, {} task(s) removed", removed);
        Ok(removed)
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: Some(row.get(0)?),
        goal: row.get(1)?,
        notes: row.get(2)?,
        due_at: optional_time(row, 3)?,
        remind_at: optional_time(row, 4)?,
        completed_at: optional_time(row, 5)?,
        moved_to_trash_at: optional_time(row, 6)?,
        created_at: required_time(row, 7)?,
        updated_at: required_time(row, 8)?,
        repeat: RepeatRule::decode_or_default(row.get::<_, Option<String>>(9)?.as_deref()),
        list_id: row.get(10)?,
    })
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<TodoList> {
    Ok(TodoList {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        color: row.get(2)?,
        order: Some(row.get(3)?),
        created_at: required_time(row, 4)?,
    })
}

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn required_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    parse_time(idx, &row.get::<_, String>(idx)?)
}

fn optional_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| parse_time(idx, &s))
        .transpose()
}
