use crate::domain::models::{Habit, HabitCompletion};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::{parse_stored_date, parse_stored_datetime};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub trait HabitRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Habit>, InfraError>;
    fn insert(&self, habit: &Habit) -> Result<(), InfraError>;
    fn remove(&self, habit_id: &str) -> Result<bool, InfraError>;
    fn add_completion(
        &self,
        habit_id: &str,
        completion: &HabitCompletion,
    ) -> Result<(), InfraError>;
    fn remove_completion(&self, completion_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteHabitRepository {
    db_path: PathBuf,
}

impl SqliteHabitRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        let connection = Connection::open(&self.db_path)?;
        connection.pragma_update(None, "foreign_keys", true)?;
        Ok(connection)
    }

    fn load_completions(
        connection: &Connection,
        habit_id: &str,
    ) -> Result<Vec<HabitCompletion>, InfraError> {
        let mut statement = connection.prepare(
            "SELECT id, completed_at FROM habit_completions
             WHERE habit_id = ?1
             ORDER BY completed_at",
        )?;
        let rows = statement.query_map(params![habit_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut completions = Vec::new();
        for row in rows {
            let (id, completed_at_raw) = row?;
            completions.push(HabitCompletion {
                id,
                date: parse_stored_datetime(&completed_at_raw, "habit_completions.completed_at")?,
            });
        }
        Ok(completions)
    }
}

impl HabitRepository for SqliteHabitRepository {
    fn list(&self) -> Result<Vec<Habit>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, name, created_at, start_date FROM habits ORDER BY created_at",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut habits = Vec::new();
        for row in rows {
            let (id, name, created_at_raw, start_date_raw) = row?;
            let completions = Self::load_completions(&connection, &id)?;
            habits.push(Habit {
                id,
                name,
                created_at: parse_stored_datetime(&created_at_raw, "habits.created_at")?,
                start_date: parse_stored_date(&start_date_raw, "habits.start_date")?,
                completions,
            });
        }
        Ok(habits)
    }

    fn insert(&self, habit: &Habit) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO habits (id, name, created_at, start_date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               start_date = excluded.start_date",
            params![
                habit.id,
                habit.name,
                habit.created_at.to_rfc3339(),
                habit.start_date.to_string(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, habit_id: &str) -> Result<bool, InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            "DELETE FROM habit_completions WHERE habit_id = ?1",
            params![habit_id],
        )?;
        let removed = transaction.execute("DELETE FROM habits WHERE id = ?1", params![habit_id])?;
        transaction.commit()?;
        Ok(removed > 0)
    }

    fn add_completion(
        &self,
        habit_id: &str,
        completion: &HabitCompletion,
    ) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO habit_completions (id, habit_id, completed_at)
             VALUES (?1, ?2, ?3)",
            params![completion.id, habit_id, completion.date.to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_completion(&self, completion_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute(
            "DELETE FROM habit_completions WHERE id = ?1",
            params![completion_id],
        )?;
        Ok(removed > 0)
    }
}
