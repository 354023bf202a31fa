use crate::application::bootstrap::bootstrap_workspace;
use crate::application::widget_sync::{TodoChangeListener, WidgetSyncService};
use crate::domain::models::{
    sort_in_list_order, FocusSchedule, Habit, HabitCompletion, Todo, WidgetTodo,
};
use crate::infrastructure::config::{
    read_timezone, read_widget_reload_marker_file, read_widget_snapshot_file,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::focus_repository::{
    FocusScheduleRepository, SqliteFocusScheduleRepository,
};
use crate::infrastructure::habit_repository::{HabitRepository, SqliteHabitRepository};
use crate::infrastructure::todo_repository::{SqliteTodoRepository, TodoRepository};
use crate::infrastructure::widget_store::{JsonFileWidgetStore, MarkerFileWidgetRefresher};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    todo_repository: Arc<SqliteTodoRepository>,
    habit_repository: Arc<SqliteHabitRepository>,
    focus_repository: Arc<SqliteFocusScheduleRepository>,
    widget_sync: Arc<WidgetSyncService<JsonFileWidgetStore>>,
    todo_listeners: Vec<Arc<dyn TodoChangeListener>>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        let todo_repository = Arc::new(SqliteTodoRepository::new(&bootstrap.database_path));
        let habit_repository = Arc::new(SqliteHabitRepository::new(&bootstrap.database_path));
        let focus_repository = Arc::new(SqliteFocusScheduleRepository::new(
            &bootstrap.database_path,
        ));

        let snapshot_path = bootstrap
            .shared_dir
            .join(read_widget_snapshot_file(&config_dir));
        let marker_path = bootstrap
            .shared_dir
            .join(read_widget_reload_marker_file(&config_dir));
        let widget_sync = Arc::new(WidgetSyncService::new(
            Arc::new(JsonFileWidgetStore::new(snapshot_path)),
            Arc::new(MarkerFileWidgetRefresher::new(marker_path)),
        ));

        let runtime = RuntimeState {
            todos: todo_repository
                .list()?
                .into_iter()
                .map(|todo| (todo.id.clone(), todo))
                .collect(),
            habits: habit_repository
                .list()?
                .into_iter()
                .map(|habit| (habit.id.clone(), habit))
                .collect(),
            focus_schedule: focus_repository.load()?,
        };

        let state = Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            todo_repository,
            habit_repository,
            focus_repository,
            todo_listeners: vec![Arc::clone(&widget_sync) as Arc<dyn TodoChangeListener>],
            widget_sync,
            runtime: Mutex::new(runtime),
            log_guard: Mutex::new(()),
        };

        // pick up edits the widget surface made while no app process was alive
        sync_widget_todos_impl(&state)?;
        Ok(state)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    todos: HashMap<String, Todo>,
    habits: HashMap<String, Habit>,
    focus_schedule: Option<FocusSchedule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekDayResponse {
    pub date: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitStatsResponse {
    pub habit_id: String,
    pub name: String,
    pub current_streak: u32,
    pub best_streak: u32,
    pub completion_percent: u32,
    pub completed_days: u32,
    pub total_days: u32,
    pub week: Vec<WeekDayResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FocusStateResponse {
    pub active: bool,
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

pub fn list_todos_impl(state: &AppState) -> Result<Vec<Todo>, InfraError> {
    let runtime = lock_runtime(state)?;
    let mut todos = runtime.todos.values().cloned().collect::<Vec<_>>();
    sort_in_list_order(&mut todos);
    Ok(todos)
}

pub fn create_todo_impl(state: &AppState, title: String) -> Result<Todo, InfraError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InfraError::InvalidInput(
            "title must not be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let todo = Todo {
        id: next_id("todo"),
        title: title.to_string(),
        is_completed: false,
        created_at: now,
        completed_at: None,
        sort_date: now,
    };

    {
        let mut runtime = lock_runtime(state)?;
        runtime.todos.insert(todo.id.clone(), todo.clone());
    }
    persist_todo(state, &todo);
    notify_todos_changed(state)?;

    state.log_info("create_todo", &format!("created todo_id={}", todo.id));
    Ok(todo)
}

pub fn toggle_todo_impl(state: &AppState, todo_id: String) -> Result<Todo, InfraError> {
    let todo_id = todo_id.trim();
    if todo_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "todo_id must not be empty".to_string(),
        ));
    }

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let Some(todo) = runtime.todos.get_mut(todo_id) else {
            return Err(InfraError::InvalidInput(format!(
                "todo not found: {todo_id}"
            )));
        };
        todo.toggle_completion(Utc::now());
        todo.clone()
    };

    persist_todo(state, &updated);
    notify_todos_changed(state)?;

    state.log_info(
        "toggle_todo",
        &format!(
            "todo_id={todo_id} is_completed={}",
            updated.is_completed
        ),
    );
    Ok(updated)
}

pub fn delete_todo_impl(state: &AppState, todo_id: String) -> Result<bool, InfraError> {
    let todo_id = todo_id.trim();
    if todo_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "todo_id must not be empty".to_string(),
        ));
    }

    let removed = {
        let mut runtime = lock_runtime(state)?;
        runtime.todos.remove(todo_id).is_some()
    };
    if !removed {
        return Ok(false);
    }

    forget_todo(state, todo_id);
    notify_todos_changed(state)?;

    state.log_info("delete_todo", &format!("deleted todo_id={todo_id}"));
    Ok(true)
}

/// Reconciliation pass: applies completion toggles the widget surface wrote
/// into the shared snapshot, persists the result, and re-publishes so the
/// snapshot's ordering metadata settles. Run whenever the app regains focus
/// or re-observes its list.
pub fn sync_widget_todos_impl(state: &AppState) -> Result<Vec<Todo>, InfraError> {
    let todos = {
        let runtime = lock_runtime(state)?;
        runtime.todos.values().cloned().collect::<Vec<_>>()
    };

    let merged = state.widget_sync.merge(todos);
    let mut changed = Vec::new();
    {
        let mut runtime = lock_runtime(state)?;
        for todo in merged {
            match runtime.todos.get(&todo.id) {
                Some(existing) if *existing == todo => {}
                _ => changed.push(todo.clone()),
            }
            runtime.todos.insert(todo.id.clone(), todo);
        }
    }

    for todo in &changed {
        persist_todo(state, todo);
    }
    notify_todos_changed(state)?;

    if !changed.is_empty() {
        state.log_info(
            "sync_widget_todos",
            &format!("applied {} widget edits", changed.len()),
        );
    }
    list_todos_impl(state)
}

/// Entry point for the widget surface's own interaction handling. Touches the
/// shared snapshot only; the canonical store catches up on the next
/// reconciliation. Unknown or malformed ids drop silently — the widget cannot
/// do anything useful with an error.
pub fn toggle_widget_todo_impl(state: &AppState, todo_id: String) -> Result<(), InfraError> {
    let todo_id = todo_id.trim();
    if todo_id.is_empty() {
        return Ok(());
    }

    state.widget_sync.toggle(todo_id);
    state.log_info(
        "toggle_widget_todo",
        &format!("widget toggled todo_id={todo_id}"),
    );
    Ok(())
}

pub fn list_widget_todos_impl(state: &AppState) -> Result<Vec<WidgetTodo>, InfraError> {
    Ok(state.widget_sync.pull())
}

pub fn create_habit_impl(state: &AppState, name: String) -> Result<Habit, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::InvalidInput(
            "name must not be empty".to_string(),
        ));
    }

    let timezone = load_timezone(state.config_dir());
    let habit = Habit {
        id: next_id("hbt"),
        name: name.to_string(),
        created_at: Utc::now(),
        start_date: today_in(&timezone),
        completions: Vec::new(),
    };

    {
        let mut runtime = lock_runtime(state)?;
        runtime.habits.insert(habit.id.clone(), habit.clone());
    }
    persist_habit(state, &habit);

    state.log_info("create_habit", &format!("created habit_id={}", habit.id));
    Ok(habit)
}

pub fn list_habits_impl(state: &AppState) -> Result<Vec<Habit>, InfraError> {
    let runtime = lock_runtime(state)?;
    let mut habits = runtime.habits.values().cloned().collect::<Vec<_>>();
    habits.sort_by(|left, right| left.created_at.cmp(&right.created_at));
    Ok(habits)
}

pub fn delete_habit_impl(state: &AppState, habit_id: String) -> Result<bool, InfraError> {
    let habit_id = habit_id.trim();
    if habit_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "habit_id must not be empty".to_string(),
        ));
    }

    let removed = {
        let mut runtime = lock_runtime(state)?;
        runtime.habits.remove(habit_id).is_some()
    };
    if !removed {
        return Ok(false);
    }

    forget_habit(state, habit_id);
    state.log_info("delete_habit", &format!("deleted habit_id={habit_id}"));
    Ok(true)
}

/// Flips the completion mark for one calendar day: a day with a completion
/// loses it, a day without one gains it. Keeps at most one completion per day.
pub fn toggle_habit_completion_impl(
    state: &AppState,
    habit_id: String,
    date: String,
) -> Result<Habit, InfraError> {
    let habit_id = habit_id.trim();
    if habit_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "habit_id must not be empty".to_string(),
        ));
    }
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidInput(format!("date must be YYYY-MM-DD: {error}"))
    })?;
    let timezone = load_timezone(state.config_dir());

    let (updated, added, removed_id) = {
        let mut runtime = lock_runtime(state)?;
        let Some(habit) = runtime.habits.get_mut(habit_id) else {
            return Err(InfraError::InvalidInput(format!(
                "habit not found: {habit_id}"
            )));
        };

        let existing = habit
            .completions
            .iter()
            .position(|completion| completion.date.with_timezone(&timezone).date_naive() == day);
        match existing {
            Some(index) => {
                let removed = habit.completions.remove(index);
                (habit.clone(), None, Some(removed.id))
            }
            None => {
                let completion = HabitCompletion {
                    id: next_id("hc"),
                    date: day_start_in(&timezone, day),
                };
                habit.completions.push(completion.clone());
                (habit.clone(), Some(completion), None)
            }
        }
    };

    if let Some(completion) = added {
        persist_completion(state, habit_id, &completion);
        state.log_info(
            "toggle_habit_completion",
            &format!("habit_id={habit_id} completed day={day}"),
        );
    }
    if let Some(completion_id) = removed_id {
        forget_completion(state, &completion_id);
        state.log_info(
            "toggle_habit_completion",
            &format!("habit_id={habit_id} cleared day={day}"),
        );
    }

    Ok(updated)
}

pub fn get_habit_stats_impl(
    state: &AppState,
    habit_id: String,
    reference_date: Option<String>,
) -> Result<HabitStatsResponse, InfraError> {
    let habit_id = habit_id.trim();
    if habit_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "habit_id must not be empty".to_string(),
        ));
    }

    let timezone = load_timezone(state.config_dir());
    let reference_day = match reference_date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|error| {
            InfraError::InvalidInput(format!("reference_date must be YYYY-MM-DD: {error}"))
        })?,
        None => today_in(&timezone),
    };

    let habit = {
        let runtime = lock_runtime(state)?;
        runtime.habits.get(habit_id).cloned().ok_or_else(|| {
            InfraError::InvalidInput(format!("habit not found: {habit_id}"))
        })?
    };

    let stats = habit.completion_stats(&timezone, reference_day);
    Ok(HabitStatsResponse {
        habit_id: habit.id.clone(),
        name: habit.name.clone(),
        current_streak: habit.current_streak(&timezone, reference_day),
        best_streak: habit.best_streak(&timezone),
        completion_percent: stats.percent,
        completed_days: stats.count,
        total_days: stats.total,
        week: habit
            .last_seven_days(&timezone, reference_day)
            .into_iter()
            .map(|(day, completed)| WeekDayResponse {
                date: day.to_string(),
                completed,
            })
            .collect(),
    })
}

pub fn get_focus_schedule_impl(state: &AppState) -> Result<FocusSchedule, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.focus_schedule.clone().unwrap_or_default())
}

pub fn set_focus_schedule_impl(
    state: &AppState,
    start: String,
    end: String,
    enabled: bool,
) -> Result<FocusSchedule, InfraError> {
    let schedule = FocusSchedule {
        start: start.trim().to_string(),
        end: end.trim().to_string(),
        enabled,
    };
    schedule.validate().map_err(InfraError::InvalidInput)?;

    {
        let mut runtime = lock_runtime(state)?;
        runtime.focus_schedule = Some(schedule.clone());
    }
    persist_focus_schedule(state, &schedule);

    state.log_info(
        "set_focus_schedule",
        &format!(
            "start={} end={} enabled={}",
            schedule.start, schedule.end, schedule.enabled
        ),
    );
    Ok(schedule)
}

pub fn get_focus_state_impl(state: &AppState) -> Result<FocusStateResponse, InfraError> {
    let timezone = load_timezone(state.config_dir());
    let schedule = {
        let runtime = lock_runtime(state)?;
        runtime.focus_schedule.clone().unwrap_or_default()
    };

    let active = schedule.is_active_at(local_time_in(&timezone));
    Ok(FocusStateResponse {
        active,
        enabled: schedule.enabled,
        start: schedule.start,
        end: schedule.end,
    })
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state.runtime.lock().map_err(|error| {
        InfraError::InvalidConfig(format!("runtime lock poisoned: {error}"))
    })
}

fn notify_todos_changed(state: &AppState) -> Result<(), InfraError> {
    let todos = {
        let runtime = lock_runtime(state)?;
        runtime.todos.values().cloned().collect::<Vec<_>>()
    };
    for listener in &state.todo_listeners {
        listener.todos_changed(&todos);
    }
    Ok(())
}

// Canonical mutations stand in memory even when the database write fails;
// the failure is logged and the snapshot keeps flowing (accepted durability
// risk, no retry).
fn persist_todo(state: &AppState, todo: &Todo) {
    if let Err(error) = state.todo_repository.upsert(todo) {
        state.log_error(
            "persist_todo",
            &format!("todo_id={} not persisted: {error}", todo.id),
        );
    }
}

fn forget_todo(state: &AppState, todo_id: &str) {
    if let Err(error) = state.todo_repository.remove(todo_id) {
        state.log_error(
            "forget_todo",
            &format!("todo_id={todo_id} not removed: {error}"),
        );
    }
}

fn persist_habit(state: &AppState, habit: &Habit) {
    if let Err(error) = state.habit_repository.insert(habit) {
        state.log_error(
            "persist_habit",
            &format!("habit_id={} not persisted: {error}", habit.id),
        );
    }
}

fn forget_habit(state: &AppState, habit_id: &str) {
    if let Err(error) = state.habit_repository.remove(habit_id) {
        state.log_error(
            "forget_habit",
            &format!("habit_id={habit_id} not removed: {error}"),
        );
    }
}

fn persist_completion(state: &AppState, habit_id: &str, completion: &HabitCompletion) {
    if let Err(error) = state.habit_repository.add_completion(habit_id, completion) {
        state.log_error(
            "persist_completion",
            &format!("completion_id={} not persisted: {error}", completion.id),
        );
    }
}

fn forget_completion(state: &AppState, completion_id: &str) {
    if let Err(error) = state.habit_repository.remove_completion(completion_id) {
        state.log_error(
            "forget_completion",
            &format!("completion_id={completion_id} not removed: {error}"),
        );
    }
}

fn persist_focus_schedule(state: &AppState, schedule: &FocusSchedule) {
    if let Err(error) = state.focus_repository.save(schedule) {
        state.log_error(
            "persist_focus_schedule",
            &format!("schedule not persisted: {error}"),
        );
    }
}

fn load_timezone(config_dir: &Path) -> Tz {
    read_timezone(config_dir)
        .ok()
        .flatten()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

fn today_in(timezone: &Tz) -> NaiveDate {
    Utc::now().with_timezone(timezone).date_naive()
}

fn local_time_in(timezone: &Tz) -> NaiveTime {
    Utc::now().with_timezone(timezone).time()
}

/// Local midnight for the given day, falling back to UTC midnight for the
/// rare days whose local midnight does not exist.
fn day_start_in(timezone: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    match timezone.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&midnight),
    }
}
