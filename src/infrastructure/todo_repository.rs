use crate::domain::models::Todo;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::parse_stored_datetime;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub trait TodoRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Todo>, InfraError>;
    fn upsert(&self, todo: &Todo) -> Result<(), InfraError>;
    fn remove(&self, todo_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTodoRepository {
    db_path: PathBuf,
}

impl SqliteTodoRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl TodoRepository for SqliteTodoRepository {
    fn list(&self) -> Result<Vec<Todo>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, title, is_completed, created_at, completed_at, sort_date
             FROM todos",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut todos = Vec::new();
        for row in rows {
            let (id, title, is_completed, created_at_raw, completed_at_raw, sort_date_raw) = row?;
            let completed_at = completed_at_raw
                .map(|raw| parse_stored_datetime(&raw, "todos.completed_at"))
                .transpose()?;
            todos.push(Todo {
                id,
                title,
                is_completed,
                created_at: parse_stored_datetime(&created_at_raw, "todos.created_at")?,
                completed_at,
                sort_date: parse_stored_datetime(&sort_date_raw, "todos.sort_date")?,
            });
        }
        Ok(todos)
    }

    fn upsert(&self, todo: &Todo) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO todos (id, title, is_completed, created_at, completed_at, sort_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
               title = excluded.title,
               is_completed = excluded.is_completed,
               completed_at = excluded.completed_at,
               sort_date = excluded.sort_date",
            params![
                todo.id,
                todo.title,
                todo.is_completed,
                todo.created_at.to_rfc3339(),
                todo.completed_at.map(|value| value.to_rfc3339()),
                todo.sort_date.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, todo_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute("DELETE FROM todos WHERE id = ?1", params![todo_id])?;
        Ok(removed > 0)
    }
}
