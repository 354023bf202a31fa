use crate::domain::models::FocusSchedule;
use crate::infrastructure::error::InfraError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// The schedule is a singleton row; saving always overwrites row 1.
pub trait FocusScheduleRepository: Send + Sync {
    fn load(&self) -> Result<Option<FocusSchedule>, InfraError>;
    fn save(&self, schedule: &FocusSchedule) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteFocusScheduleRepository {
    db_path: PathBuf,
}

impl SqliteFocusScheduleRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl FocusScheduleRepository for SqliteFocusScheduleRepository {
    fn load(&self) -> Result<Option<FocusSchedule>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String, bool)> = connection
            .query_row(
                "SELECT start_time, end_time, is_enabled FROM focus_schedules WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        Ok(row.map(|(start, end, enabled)| FocusSchedule {
            start,
            end,
            enabled,
        }))
    }

    fn save(&self, schedule: &FocusSchedule) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO focus_schedules (id, start_time, end_time, is_enabled)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
               start_time = excluded.start_time,
               end_time = excluded.end_time,
               is_enabled = excluded.is_enabled",
            params![schedule.start, schedule.end, schedule.enabled],
        )?;
        Ok(())
    }
}
